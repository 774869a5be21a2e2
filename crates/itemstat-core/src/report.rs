//! Analysis reports with JSON persistence and year-over-year comparison.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AssessmentAnalysis;
use crate::breakdown::{
    countries, domain_breakdown, gender_breakdown, score_distribution, student_ranks,
    DomainBreakdown, GenderBreakdown, ScoreDistribution, StudentRank,
};
use crate::matrix::ResponseMatrix;
use crate::model::{AssessmentId, AssessmentMeta};

/// A complete analysis report, the input of every renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// What was analyzed.
    pub assessment: ReportSubject,
    pub analysis: AssessmentAnalysis,
    pub distribution: ScoreDistribution,
    pub genders: Vec<GenderBreakdown>,
    pub domains: Vec<DomainBreakdown>,
    pub countries: Vec<String>,
    /// Students by descending total score.
    #[serde(default)]
    pub ranks: Vec<StudentRank>,
}

/// Summary of the analyzed assessment (without its responses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSubject {
    pub assessment_id: AssessmentId,
    pub name: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub country: Option<String>,
    pub student_count: usize,
    pub item_count: usize,
}

impl AnalysisReport {
    pub fn new(meta: &AssessmentMeta, matrix: &ResponseMatrix, analysis: AssessmentAnalysis) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            assessment: ReportSubject {
                assessment_id: matrix.assessment_id,
                name: meta.name.clone(),
                year: meta.year,
                country: meta.country.clone(),
                student_count: matrix.student_count(),
                item_count: matrix.item_count(),
            },
            analysis,
            distribution: score_distribution(matrix),
            genders: gender_breakdown(matrix),
            domains: domain_breakdown(matrix),
            countries: countries(matrix),
            ranks: student_ranks(matrix),
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AnalysisReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    fn mean_percent(&self) -> Option<f64> {
        let mean = self.analysis.test.descriptive.as_ref()?.mean;
        let max = self.analysis.test.max_score;
        (max > 0.0).then(|| mean / max * 100.0)
    }

    /// Compare this report against a baseline (e.g. the previous year).
    ///
    /// Items are matched by code. An item whose difficulty moved by more
    /// than `threshold` counts as harder or easier.
    pub fn compare(&self, baseline: &AnalysisReport, threshold: f64) -> ComparisonReport {
        let difficulty_map = |report: &AnalysisReport| -> HashMap<String, Option<f64>> {
            report
                .analysis
                .items
                .iter()
                .map(|i| (i.item_code.clone(), i.difficulty))
                .collect()
        };

        let baseline_items = difficulty_map(baseline);
        let current_items = difficulty_map(self);

        let mut harder = Vec::new();
        let mut easier = Vec::new();
        let mut unchanged = 0usize;
        let mut new_items = Vec::new();

        for item in &self.analysis.items {
            let Some(previous) = baseline_items.get(&item.item_code) else {
                new_items.push(item.item_code.clone());
                continue;
            };
            let (Some(before), Some(after)) = (*previous, item.difficulty) else {
                unchanged += 1;
                continue;
            };
            let shift = ItemShift {
                item_code: item.item_code.clone(),
                baseline_difficulty: before,
                current_difficulty: after,
                delta: after - before,
            };
            if shift.delta < -threshold {
                harder.push(shift);
            } else if shift.delta > threshold {
                easier.push(shift);
            } else {
                unchanged += 1;
            }
        }

        let mut removed_items: Vec<String> = baseline_items
            .keys()
            .filter(|k| !current_items.contains_key(*k))
            .cloned()
            .collect();
        removed_items.sort();

        let mean_change = match (baseline.mean_percent(), self.mean_percent()) {
            (Some(before), Some(after)) => Some(after - before),
            _ => None,
        };
        let mean_change_percent = match (baseline.mean_percent(), mean_change) {
            (Some(before), Some(change)) if before != 0.0 => Some(change / before * 100.0),
            _ => None,
        };
        let delta = |a: Option<f64>, b: Option<f64>| a.zip(b).map(|(a, b)| b - a);

        ComparisonReport {
            baseline_name: baseline.assessment.name.clone(),
            current_name: self.assessment.name.clone(),
            harder,
            easier,
            unchanged,
            new_items,
            removed_items,
            trend: TestTrend {
                baseline_mean_percent: baseline.mean_percent(),
                current_mean_percent: self.mean_percent(),
                mean_change,
                mean_change_percent,
                alpha_change: delta(
                    baseline.analysis.test.reliability.cronbach_alpha,
                    self.analysis.test.reliability.cronbach_alpha,
                ),
                sdg_change: delta(
                    baseline.analysis.performance.as_ref().map(|p| p.sdg_mpl_percentage),
                    self.analysis.performance.as_ref().map(|p| p.sdg_mpl_percentage),
                ),
            },
        }
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline_name: String,
    pub current_name: String,
    /// Items whose difficulty dropped by more than the threshold.
    pub harder: Vec<ItemShift>,
    /// Items whose difficulty rose by more than the threshold.
    pub easier: Vec<ItemShift>,
    pub unchanged: usize,
    /// Item codes in current but not baseline.
    pub new_items: Vec<String>,
    /// Item codes in baseline but not current.
    pub removed_items: Vec<String>,
    pub trend: TestTrend,
}

/// A difficulty change of one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemShift {
    pub item_code: String,
    pub baseline_difficulty: f64,
    pub current_difficulty: f64,
    pub delta: f64,
}

/// Test-level movement. Means are in percent of the maximum score so tests
/// of different length compare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestTrend {
    pub baseline_mean_percent: Option<f64>,
    pub current_mean_percent: Option<f64>,
    pub mean_change: Option<f64>,
    pub mean_change_percent: Option<f64>,
    pub alpha_change: Option<f64>,
    pub sdg_change: Option<f64>,
}

fn signed(value: Option<f64>, digits: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:+.digits$}"))
}

impl ComparisonReport {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "## {} vs {}\n\n",
            self.current_name, self.baseline_name
        ));
        md.push_str(&format!(
            "**Summary:** {} harder, {} easier, {} unchanged, {} new, {} removed\n\n",
            self.harder.len(),
            self.easier.len(),
            self.unchanged,
            self.new_items.len(),
            self.removed_items.len()
        ));

        md.push_str("| Measure | Change |\n");
        md.push_str("|---------|--------|\n");
        md.push_str(&format!(
            "| Mean score (% of max) | {} |\n",
            signed(self.trend.mean_change, 1)
        ));
        md.push_str(&format!(
            "| Cronbach's alpha | {} |\n",
            signed(self.trend.alpha_change, 3)
        ));
        md.push_str(&format!(
            "| SDG MPL % | {} |\n\n",
            signed(self.trend.sdg_change, 1)
        ));

        for (title, shifts) in [("Harder items", &self.harder), ("Easier items", &self.easier)] {
            if shifts.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Item | Baseline p | Current p | Delta |\n");
            md.push_str("|------|------------|-----------|-------|\n");
            for s in shifts {
                md.push_str(&format!(
                    "| {} | {:.2} | {:.2} | {:+.2} |\n",
                    s.item_code, s.baseline_difficulty, s.current_difficulty, s.delta
                ));
            }
            md.push('\n');
        }

        md
    }

    /// Returns true if any item moved beyond the threshold.
    pub fn has_shifts(&self) -> bool {
        !self.harder.is_empty() || !self.easier.is_empty()
    }
}
