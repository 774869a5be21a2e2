//! Proficiency bands and the SDG minimum-proficiency indicator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::StatType;

/// Lower bound of the minimum band, as a fraction of the maximum score.
pub const MPL_THRESHOLD: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    BelowMinimum,
    Minimum,
    Moderate,
    High,
    Advanced,
}

impl PerformanceLevel {
    pub const ALL: [PerformanceLevel; 5] = [
        PerformanceLevel::BelowMinimum,
        PerformanceLevel::Minimum,
        PerformanceLevel::Moderate,
        PerformanceLevel::High,
        PerformanceLevel::Advanced,
    ];

    /// Band of a score fraction; bands are closed on the left.
    pub fn from_fraction(fraction: f64) -> Self {
        match fraction {
            f if f < MPL_THRESHOLD => PerformanceLevel::BelowMinimum,
            f if f < 0.50 => PerformanceLevel::Minimum,
            f if f < 0.75 => PerformanceLevel::Moderate,
            f if f < 0.90 => PerformanceLevel::High,
            _ => PerformanceLevel::Advanced,
        }
    }

    pub fn stat_type(self) -> StatType {
        match self {
            PerformanceLevel::BelowMinimum => StatType::PerfBelowMinimum,
            PerformanceLevel::Minimum => StatType::PerfMinimum,
            PerformanceLevel::Moderate => StatType::PerfModerate,
            PerformanceLevel::High => StatType::PerfHigh,
            PerformanceLevel::Advanced => StatType::PerfAdvanced,
        }
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PerformanceLevel::BelowMinimum => "Below Minimum",
            PerformanceLevel::Minimum => "Minimum",
            PerformanceLevel::Moderate => "Moderate",
            PerformanceLevel::High => "High",
            PerformanceLevel::Advanced => "Advanced",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCount {
    pub level: PerformanceLevel,
    pub count: usize,
    /// Share of students, 0–100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub max_score: f64,
    /// One entry per level, lowest first.
    pub levels: Vec<LevelCount>,
    /// Share of students at or above the minimum band, 0–100.
    pub sdg_mpl_percentage: f64,
}

impl PerformanceSummary {
    pub fn level(&self, level: PerformanceLevel) -> Option<&LevelCount> {
        self.levels.iter().find(|l| l.level == level)
    }
}

/// Classify every score. `None` for an empty cohort or a non-positive
/// maximum score.
pub fn classify(scores: &[f64], max_score: f64) -> Option<PerformanceSummary> {
    if scores.is_empty() || max_score <= 0.0 {
        return None;
    }

    let mut counts = [0usize; 5];
    for score in scores {
        let level = PerformanceLevel::from_fraction(score / max_score);
        counts[level as usize] += 1;
    }

    let n = scores.len() as f64;
    let levels: Vec<LevelCount> = PerformanceLevel::ALL
        .iter()
        .zip(counts)
        .map(|(&level, count)| LevelCount {
            level,
            count,
            percentage: count as f64 / n * 100.0,
        })
        .collect();

    let below = counts[PerformanceLevel::BelowMinimum as usize];
    Some(PerformanceSummary {
        max_score,
        levels,
        sdg_mpl_percentage: (scores.len() - below) as f64 / n * 100.0,
    })
}
