//! Internal-consistency reliability: Cronbach's alpha, split-half with the
//! Spearman-Brown correction, and the standard error of measurement.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptive::{pearson, sample_stdev, sample_variance};

/// Cronbach's alpha over a students × items points matrix.
///
/// `None` with fewer than two items or two students, or when total scores
/// do not vary.
pub fn cronbach_alpha(rows: &[Vec<f64>]) -> Option<f64> {
    let k = rows.first().map_or(0, Vec::len);
    if k < 2 || rows.len() < 2 {
        return None;
    }

    let item_variance_sum: f64 = (0..k)
        .map(|col| {
            let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            sample_variance(&column).unwrap_or(0.0)
        })
        .sum();

    let totals: Vec<f64> = rows.iter().map(|r| r.iter().sum()).collect();
    let total_variance = sample_variance(&totals)?;
    if total_variance == 0.0 {
        return None;
    }

    let k = k as f64;
    Some(k / (k - 1.0) * (1.0 - item_variance_sum / total_variance))
}

/// Odd-even split-half reliability, corrected with Spearman-Brown.
///
/// Items at even indices form one half, odd indices the other. `None` with
/// fewer than four items, when the halves do not correlate, or when r = −1.
pub fn split_half(rows: &[Vec<f64>]) -> Option<f64> {
    let k = rows.first().map_or(0, Vec::len);
    if k < 4 {
        return None;
    }

    let (even, odd): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .map(|r| {
            r.iter().enumerate().fold((0.0, 0.0), |(e, o), (i, v)| {
                if i % 2 == 0 {
                    (e + v, o)
                } else {
                    (e, o + v)
                }
            })
        })
        .unzip();

    let r = pearson(&even, &odd)?;
    // 1 + r vanishes at perfect negative correlation
    if 1.0 + r < 1e-12 {
        return None;
    }
    Some(spearman_brown(r))
}

/// Step a half-test correlation up to full-test length.
pub fn spearman_brown(r: f64) -> f64 {
    2.0 * r / (1.0 + r)
}

/// Standard error of measurement: stdev(totals) × √(1 − α).
pub fn sem(totals: &[f64], alpha: Option<f64>) -> Option<f64> {
    let alpha = alpha?;
    let stdev = sample_stdev(totals)?;
    Some(stdev * (1.0 - alpha).max(0.0).sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityBand {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl ReliabilityBand {
    pub fn of(coefficient: f64) -> Self {
        match coefficient {
            c if c >= 0.90 => ReliabilityBand::Excellent,
            c if c >= 0.80 => ReliabilityBand::Good,
            c if c >= 0.70 => ReliabilityBand::Acceptable,
            _ => ReliabilityBand::Poor,
        }
    }
}

impl fmt::Display for ReliabilityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReliabilityBand::Excellent => "excellent",
            ReliabilityBand::Good => "good",
            ReliabilityBand::Acceptable => "acceptable",
            ReliabilityBand::Poor => "poor",
        })
    }
}

/// Reliability coefficients of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reliability {
    pub cronbach_alpha: Option<f64>,
    pub split_half: Option<f64>,
    pub sem: Option<f64>,
    pub alpha_band: Option<ReliabilityBand>,
    pub split_half_band: Option<ReliabilityBand>,
}

impl Reliability {
    pub fn compute(rows: &[Vec<f64>], totals: &[f64]) -> Self {
        let cronbach_alpha = cronbach_alpha(rows);
        let split_half = split_half(rows);
        Self {
            cronbach_alpha,
            split_half,
            sem: sem(totals, cronbach_alpha),
            alpha_band: cronbach_alpha.map(ReliabilityBand::of),
            split_half_band: split_half.map(ReliabilityBand::of),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn totals(rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| r.iter().sum()).collect()
    }

    #[test]
    fn perfectly_correlated_items_have_alpha_one() {
        // every item equals the student's ability level
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![if i % 2 == 0 { 1.0 } else { 0.0 }; 8])
            .collect();
        let alpha = cronbach_alpha(&rows).unwrap();
        assert!(approx(alpha, 1.0), "alpha = {alpha}");
        assert!(approx(split_half(&rows).unwrap(), 1.0));
        assert!(sem(&totals(&rows), Some(alpha)).unwrap() < 1e-6);
    }

    #[test]
    fn random_items_have_alpha_near_zero() {
        // ten independent coin-flip items, a thousand students
        let mut rng = StdRng::seed_from_u64(1);
        let rows: Vec<Vec<f64>> = (0..1000)
            .map(|_| (0..10).map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }).collect())
            .collect();
        let alpha = cronbach_alpha(&rows).unwrap();
        assert!(alpha.abs() < 0.15, "alpha = {alpha}");
        let half = split_half(&rows).unwrap();
        assert!(half.abs() < 0.25, "split-half = {half}");
    }

    #[test]
    fn spearman_brown_steps_up_half_test_correlation() {
        assert!(approx(spearman_brown(0.6), 0.75));
        assert!(approx(spearman_brown(0.0), 0.0));
        assert!(approx(spearman_brown(1.0), 1.0));
    }

    #[test]
    fn alpha_requires_two_items_and_variance() {
        assert!(cronbach_alpha(&[vec![1.0], vec![0.0]]).is_none());
        assert!(cronbach_alpha(&[vec![1.0, 0.0]]).is_none());
        assert!(cronbach_alpha(&[vec![1.0, 0.0], vec![0.0, 1.0]]).is_none());
        assert!(cronbach_alpha(&[]).is_none());
    }

    #[test]
    fn split_half_applies_spearman_brown() {
        let rows = vec![
            vec![1.0, 1.0, 1.0, 0.0],
            vec![1.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![1.0, 1.0, 1.0, 1.0],
        ];
        let even: Vec<f64> = rows.iter().map(|r| r[0] + r[2]).collect();
        let odd: Vec<f64> = rows.iter().map(|r| r[1] + r[3]).collect();
        let r = pearson(&even, &odd).unwrap();
        assert!(approx(split_half(&rows).unwrap(), 2.0 * r / (1.0 + r)));
    }

    #[test]
    fn split_half_needs_four_items() {
        let rows = vec![vec![1.0, 0.0, 1.0], vec![0.0, 1.0, 1.0]];
        assert!(split_half(&rows).is_none());
    }

    #[test]
    fn split_half_rejects_perfect_negative_correlation() {
        let rows = vec![
            vec![1.0, 0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0, 0.0],
        ];
        assert!(split_half(&rows).is_none());
    }

    #[test]
    fn sem_without_alpha_is_none() {
        assert!(sem(&[1.0, 2.0, 3.0], None).is_none());
        let s = sem(&[1.0, 2.0, 3.0], Some(0.75)).unwrap();
        assert!(approx(s, 0.5));
    }

    #[test]
    fn reliability_bands() {
        assert_eq!(ReliabilityBand::of(0.95), ReliabilityBand::Excellent);
        assert_eq!(ReliabilityBand::of(0.80), ReliabilityBand::Good);
        assert_eq!(ReliabilityBand::of(0.70), ReliabilityBand::Acceptable);
        assert_eq!(ReliabilityBand::of(0.10).to_string(), "poor");
    }
}
