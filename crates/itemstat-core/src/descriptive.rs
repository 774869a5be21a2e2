//! Descriptive statistics over a sample of scores.
//!
//! All dispersion and shape measures use the sample (n − 1) forms.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Summary of a non-empty sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    /// `None` when n < 2.
    pub variance: Option<f64>,
    /// `None` when n < 2.
    pub stdev: Option<f64>,
    /// Adjusted Fisher-Pearson coefficient. `None` when n < 3 or stdev = 0.
    pub skewness: Option<f64>,
    /// Sample excess kurtosis (G2). `None` when n < 4 or variance = 0.
    pub kurtosis: Option<f64>,
}

/// Compute descriptive statistics. Returns `None` for an empty sample.
pub fn describe(sample: &[f64]) -> Option<DescriptiveStats> {
    if sample.is_empty() {
        return None;
    }

    let n = sample.len();
    let nf = n as f64;
    let mut sorted = sample.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min = sorted[0];
    let max = sorted[n - 1];
    let mean = sample.iter().sum::<f64>() / nf;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let variance = sample_variance(sample);
    let stdev = variance.map(f64::sqrt);

    let skewness = match stdev {
        Some(s) if n >= 3 && s > 0.0 => {
            let cubes: f64 = sample.iter().map(|x| (x - mean).powi(3)).sum();
            Some(nf * cubes / ((nf - 1.0) * (nf - 2.0) * s.powi(3)))
        }
        _ => None,
    };

    let kurtosis = match variance {
        Some(v) if n >= 4 && v > 0.0 => {
            let squares: f64 = sample.iter().map(|x| (x - mean).powi(2)).sum();
            let fourths: f64 = sample.iter().map(|x| (x - mean).powi(4)).sum();
            let lead = (nf + 1.0) * nf * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0));
            let tail = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
            Some(lead * fourths / squares.powi(2) - tail)
        }
        _ => None,
    };

    Some(DescriptiveStats {
        n,
        min,
        max,
        mean,
        median,
        mode: mode(&sorted),
        variance,
        stdev,
        skewness,
        kurtosis,
    })
}

/// Sample variance, `None` when fewer than two values.
pub fn sample_variance(sample: &[f64]) -> Option<f64> {
    if sample.len() < 2 {
        return None;
    }
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    Some(sample.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0))
}

/// Sample standard deviation, `None` when fewer than two values.
pub fn sample_stdev(sample: &[f64]) -> Option<f64> {
    sample_variance(sample).map(f64::sqrt)
}

/// Pearson correlation of two equal-length samples.
///
/// `None` on length mismatch, fewer than two pairs, or zero variance in
/// either sample.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

// Most frequent value of a sorted sample; the first (smallest) wins ties.
fn mode(sorted: &[f64]) -> f64 {
    let mut best = sorted[0];
    let mut best_run = 0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > best_run {
            best_run = j - i;
            best = sorted[i];
        }
        i = j;
    }
    best
}

/// Shape of a distribution's tails relative to its centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewnessShape {
    HighlyLeftSkewed,
    ModeratelyLeftSkewed,
    FairlySymmetric,
    ModeratelyRightSkewed,
    HighlyRightSkewed,
}

impl fmt::Display for SkewnessShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkewnessShape::HighlyLeftSkewed => "highly left-skewed",
            SkewnessShape::ModeratelyLeftSkewed => "moderately left-skewed",
            SkewnessShape::FairlySymmetric => "fairly symmetric",
            SkewnessShape::ModeratelyRightSkewed => "moderately right-skewed",
            SkewnessShape::HighlyRightSkewed => "highly right-skewed",
        };
        f.write_str(label)
    }
}

pub fn interpret_skewness(skewness: f64) -> SkewnessShape {
    match skewness {
        s if s < -1.0 => SkewnessShape::HighlyLeftSkewed,
        s if s < -0.5 => SkewnessShape::ModeratelyLeftSkewed,
        s if s <= 0.5 => SkewnessShape::FairlySymmetric,
        s if s <= 1.0 => SkewnessShape::ModeratelyRightSkewed,
        _ => SkewnessShape::HighlyRightSkewed,
    }
}

/// Peakedness relative to a normal distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KurtosisShape {
    Platykurtic,
    SlightlyPlatykurtic,
    Mesokurtic,
    SlightlyLeptokurtic,
    Leptokurtic,
}

impl fmt::Display for KurtosisShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KurtosisShape::Platykurtic => "platykurtic (flat)",
            KurtosisShape::SlightlyPlatykurtic => "slightly platykurtic",
            KurtosisShape::Mesokurtic => "mesokurtic (normal)",
            KurtosisShape::SlightlyLeptokurtic => "slightly leptokurtic",
            KurtosisShape::Leptokurtic => "leptokurtic (peaked)",
        };
        f.write_str(label)
    }
}

pub fn interpret_kurtosis(kurtosis: f64) -> KurtosisShape {
    match kurtosis {
        k if k < -1.0 => KurtosisShape::Platykurtic,
        k if k < -0.5 => KurtosisShape::SlightlyPlatykurtic,
        k if k <= 0.5 => KurtosisShape::Mesokurtic,
        k if k <= 1.0 => KurtosisShape::SlightlyLeptokurtic,
        _ => KurtosisShape::Leptokurtic,
    }
}
