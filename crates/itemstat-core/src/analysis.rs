//! Whole-assessment analysis: everything the engine derives from one
//! response matrix, and its flattening into stored records.

use serde::{Deserialize, Serialize};

use crate::descriptive::{describe, DescriptiveStats};
use crate::dif::{self, DifPolicy};
use crate::item_analysis::{analyze_items, ItemAnalysis};
use crate::matrix::ResponseMatrix;
use crate::model::{AssessmentId, DifRecord, StatType, StatisticRecord, StatisticSet};
use crate::performance::{classify, PerformanceSummary};
use crate::reliability::Reliability;

/// Test-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStatistics {
    pub student_count: usize,
    pub item_count: usize,
    pub max_score: f64,
    pub is_weighted: bool,
    pub descriptive: Option<DescriptiveStats>,
    pub reliability: Reliability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentAnalysis {
    pub assessment_id: AssessmentId,
    pub test: TestStatistics,
    pub items: Vec<ItemAnalysis>,
    pub performance: Option<PerformanceSummary>,
    /// Gender and percentile comparisons.
    pub dif: Vec<DifRecord>,
}

/// Run every statistic over the matrix.
pub fn analyze(matrix: &ResponseMatrix, policy: &DifPolicy) -> AssessmentAnalysis {
    let totals = matrix.totals();
    let rows = matrix.points_rows();
    let max_score = matrix.max_score();

    let test = TestStatistics {
        student_count: matrix.student_count(),
        item_count: matrix.item_count(),
        max_score,
        is_weighted: matrix.is_weighted(),
        descriptive: describe(&totals),
        reliability: Reliability::compute(&rows, &totals),
    };

    let mut dif_records = dif::gender_dif(matrix, policy);
    dif_records.extend(dif::percentile_dif(matrix, policy));

    tracing::debug!(
        "analyzed {} students x {} items, {} DIF records",
        test.student_count,
        test.item_count,
        dif_records.len()
    );

    AssessmentAnalysis {
        assessment_id: matrix.assessment_id,
        test,
        items: analyze_items(matrix),
        performance: classify(&totals, max_score),
        dif: dif_records,
    }
}

impl AssessmentAnalysis {
    /// Item analysis by item code.
    pub fn item(&self, code: &str) -> Option<&ItemAnalysis> {
        self.items.iter().find(|i| i.item_code == code)
    }

    /// Flatten into stored records. Statistics without a value are left out.
    pub fn statistic_set(&self) -> StatisticSet {
        let id = self.assessment_id;
        let test_stat = |stat_type, value: Option<f64>| {
            value.map(|value| StatisticRecord {
                assessment_id: id,
                item_id: None,
                stat_type,
                value,
            })
        };

        let mut statistics: Vec<StatisticRecord> = Vec::new();
        if let Some(d) = &self.test.descriptive {
            statistics.extend(
                [
                    (StatType::N, Some(d.n as f64)),
                    (StatType::Min, Some(d.min)),
                    (StatType::Max, Some(d.max)),
                    (StatType::Mean, Some(d.mean)),
                    (StatType::Median, Some(d.median)),
                    (StatType::Mode, Some(d.mode)),
                    (StatType::Stdev, d.stdev),
                    (StatType::Variance, d.variance),
                    (StatType::Skewness, d.skewness),
                    (StatType::Kurtosis, d.kurtosis),
                ]
                .into_iter()
                .filter_map(|(t, v)| test_stat(t, v)),
            );
        }

        let r = &self.test.reliability;
        statistics.extend(
            [
                (StatType::CronbachAlpha, r.cronbach_alpha),
                (StatType::SplitHalfReliability, r.split_half),
                (StatType::Sem, r.sem),
            ]
            .into_iter()
            .filter_map(|(t, v)| test_stat(t, v)),
        );

        if let Some(p) = &self.performance {
            statistics.extend(test_stat(StatType::SdgMplPercentage, Some(p.sdg_mpl_percentage)));
            statistics.extend(
                p.levels
                    .iter()
                    .filter_map(|l| test_stat(l.level.stat_type(), Some(l.percentage))),
            );
        }

        for item in &self.items {
            statistics.extend(
                [
                    (StatType::Difficulty, item.difficulty),
                    (StatType::Discrimination, item.discrimination),
                    (StatType::PointBiserial, item.point_biserial),
                ]
                .into_iter()
                .filter_map(|(stat_type, value)| {
                    value.map(|value| StatisticRecord {
                        assessment_id: id,
                        item_id: Some(item.item_id),
                        stat_type,
                        value,
                    })
                }),
            );
        }

        StatisticSet {
            statistics,
            dif: self.dif.clone(),
        }
    }
}
