//! Cohort breakdowns used by reports: student ranks, the score histogram
//! with a normal overlay, and per-gender, per-domain and per-country views.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::descriptive::{
    describe, interpret_kurtosis, interpret_skewness, sample_stdev, DescriptiveStats,
    KurtosisShape, SkewnessShape,
};
use crate::matrix::ResponseMatrix;
use crate::performance::MPL_THRESHOLD;

/// Width of a histogram bin, in percent of the maximum score.
pub const BIN_WIDTH_PERCENT: f64 = 5.0;
/// 0%, 5%, ..., 95%, and a final bin for a perfect score.
pub const BIN_COUNT: usize = 21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRank {
    pub student_id: u64,
    pub code: String,
    pub gender: Option<String>,
    pub total_score: f64,
    /// 1-based position by descending score.
    pub rank: usize,
    /// Share of students scoring at or below this student, one decimal.
    pub percentile: f64,
}

/// Rank students by total score, highest first. Ties keep row order.
pub fn student_ranks(matrix: &ResponseMatrix) -> Vec<StudentRank> {
    let mut students: Vec<_> = matrix.students.iter().collect();
    students.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));

    let n = students.len();
    students
        .iter()
        .enumerate()
        .map(|(i, s)| {
            // students above this score form a prefix of the sorted list
            let above = students.partition_point(|o| o.total_score > s.total_score);
            let at_or_below = (n - above) as f64;
            StudentRank {
                student_id: s.id,
                code: s.code.clone(),
                gender: s.demographics.gender.clone(),
                total_score: s.total_score,
                rank: i + 1,
                percentile: round1(at_or_below / n as f64 * 100.0),
            }
        })
        .collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBin {
    /// Lower edge of the bin in percent (0, 5, ..., 100).
    pub bin_percent: f64,
    pub actual: usize,
    /// Count a normal distribution with the cohort's mean and stdev would
    /// put in this bin.
    pub expected: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub max_score: f64,
    pub bins: Vec<DistributionBin>,
    /// Statistics of the percentage scores.
    pub statistics: Option<DescriptiveStats>,
    pub skewness_shape: Option<SkewnessShape>,
    pub kurtosis_shape: Option<KurtosisShape>,
}

/// Histogram of percentage scores in 5% bins.
///
/// Bin k holds scores in [5k%, 5k+5%); the last bin holds perfect scores
/// only, so every student lands in exactly one bin.
pub fn score_distribution(matrix: &ResponseMatrix) -> ScoreDistribution {
    let max_score = matrix.max_score();
    let percents: Vec<f64> = if max_score > 0.0 {
        matrix
            .students
            .iter()
            .map(|s| s.total_score / max_score * 100.0)
            .collect()
    } else {
        Vec::new()
    };

    let mut counts = [0usize; BIN_COUNT];
    for p in &percents {
        // small epsilon so 15.0 lands in the 15% bin despite rounding
        let bin = ((p / BIN_WIDTH_PERCENT) + 1e-9).floor().max(0.0) as usize;
        counts[bin.min(BIN_COUNT - 1)] += 1;
    }

    let statistics = describe(&percents);
    let n = percents.len() as f64;
    let normal = statistics
        .as_ref()
        .and_then(|s| s.stdev.filter(|&sd| sd > 0.0).map(|sd| (s.mean, sd)));

    let bins = counts
        .iter()
        .enumerate()
        .map(|(k, &actual)| {
            let bin_percent = k as f64 * BIN_WIDTH_PERCENT;
            let expected = normal.map_or(0.0, |(mean, sd)| {
                normal_pdf(bin_percent, mean, sd) * n * BIN_WIDTH_PERCENT
            });
            DistributionBin {
                bin_percent,
                actual,
                expected,
            }
        })
        .collect();

    ScoreDistribution {
        max_score,
        bins,
        skewness_shape: statistics
            .as_ref()
            .and_then(|s| s.skewness)
            .map(interpret_skewness),
        kurtosis_shape: statistics
            .as_ref()
            .and_then(|s| s.kurtosis)
            .map(interpret_kurtosis),
        statistics,
    }
}

fn normal_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    let z = (x - mean) / sd;
    (-0.5 * z * z).exp() / (sd * (2.0 * PI).sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenderBreakdown {
    pub gender: String,
    pub count: usize,
    pub mean_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// Sample standard deviation, 0 for a single student.
    pub std_dev: f64,
    /// Students at or above the minimum proficiency level.
    pub above_mpl: usize,
    pub mpl_percentage: f64,
}

/// Score summary per recorded gender, sorted by gender code.
pub fn gender_breakdown(matrix: &ResponseMatrix) -> Vec<GenderBreakdown> {
    let max_score = matrix.max_score();
    let mut by_gender: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for s in &matrix.students {
        if let Some(g) = s.gender() {
            by_gender.entry(g).or_default().push(s.total_score);
        }
    }

    by_gender
        .into_iter()
        .map(|(gender, scores)| {
            let count = scores.len();
            let above_mpl = if max_score > 0.0 {
                scores
                    .iter()
                    .filter(|&&s| s / max_score >= MPL_THRESHOLD)
                    .count()
            } else {
                0
            };
            GenderBreakdown {
                gender: gender.to_string(),
                count,
                mean_score: scores.iter().sum::<f64>() / count as f64,
                min_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
                max_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                std_dev: sample_stdev(&scores).unwrap_or(0.0),
                above_mpl,
                mpl_percentage: round1(above_mpl as f64 / count as f64 * 100.0),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainBreakdown {
    pub domain: String,
    pub item_count: usize,
    /// Percent of this domain's responses that are correct.
    pub average_performance: f64,
    /// Students with at least one non-blank response in the domain.
    pub student_count: usize,
}

/// Performance per content domain, sorted by domain. Items without a
/// domain are left out.
pub fn domain_breakdown(matrix: &ResponseMatrix) -> Vec<DomainBreakdown> {
    let mut columns: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (col, item) in matrix.items.iter().enumerate() {
        if let Some(domain) = item.content_domain.as_deref() {
            columns.entry(domain).or_default().push(col);
        }
    }

    columns
        .into_iter()
        .map(|(domain, cols)| {
            let mut correct = 0usize;
            let mut responses = 0usize;
            let mut student_count = 0usize;
            for s in &matrix.students {
                let mut answered = false;
                for &col in &cols {
                    let cell = &s.cells[col];
                    responses += 1;
                    if cell.is_correct {
                        correct += 1;
                    }
                    answered |= !cell.raw_value.is_empty();
                }
                if answered {
                    student_count += 1;
                }
            }
            DomainBreakdown {
                domain: domain.to_string(),
                item_count: cols.len(),
                average_performance: if responses == 0 {
                    0.0
                } else {
                    correct as f64 / responses as f64 * 100.0
                },
                student_count,
            }
        })
        .collect()
}

/// Distinct recorded countries, sorted.
pub fn countries(matrix: &ResponseMatrix) -> Vec<String> {
    matrix
        .students
        .iter()
        .filter_map(|s| s.country())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
