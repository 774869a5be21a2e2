//! Classical item analysis with the 27% extreme-group method.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptive::pearson;
use crate::matrix::ResponseMatrix;
use crate::model::ItemType;

/// Fewest students for which extreme groups are formed.
pub const MIN_STUDENTS: usize = 10;
/// Share of students in each extreme group.
pub const EXTREME_GROUP_FRACTION: f64 = 0.27;

/// Upper and lower 27% of students by total score, as row indices.
///
/// With n ≥ 10 the group size ⌊0.27n⌋ is always below n/2, so the two
/// groups never share a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtremeGroups {
    pub upper: Vec<usize>,
    pub lower: Vec<usize>,
}

impl ExtremeGroups {
    /// Form groups over all rows. `None` when fewer than ten students.
    pub fn new(totals: &[f64]) -> Option<Self> {
        let rows: Vec<usize> = (0..totals.len()).collect();
        Self::within(&rows, totals)
    }

    /// Form groups among the given rows only.
    pub fn within(rows: &[usize], totals: &[f64]) -> Option<Self> {
        if rows.len() < MIN_STUDENTS {
            return None;
        }
        let mut sorted = rows.to_vec();
        // stable: equal totals keep their row order
        sorted.sort_by(|&a, &b| totals[b].total_cmp(&totals[a]));

        let size = (sorted.len() as f64 * EXTREME_GROUP_FRACTION).floor() as usize;
        Some(Self {
            upper: sorted[..size].to_vec(),
            lower: sorted[sorted.len() - size..].to_vec(),
        })
    }

    pub fn size(&self) -> usize {
        self.upper.len()
    }

    fn count(rows: &[usize], pred: impl Fn(usize) -> bool) -> usize {
        rows.iter().filter(|&&r| pred(r)).count()
    }

    /// (upper, lower) counts of rows satisfying `pred`.
    pub fn counts(&self, pred: impl Fn(usize) -> bool) -> (usize, usize) {
        (
            Self::count(&self.upper, &pred),
            Self::count(&self.lower, &pred),
        )
    }
}

/// p = (U + L) / 2g over correct-response counts.
pub fn difficulty(correct: &[bool], groups: &ExtremeGroups) -> f64 {
    let (u, l) = groups.counts(|r| correct[r]);
    (u + l) as f64 / (2 * groups.size()) as f64
}

/// d = (U − L) / g over correct-response counts.
pub fn discrimination(correct: &[bool], groups: &ExtremeGroups) -> f64 {
    let (u, l) = groups.counts(|r| correct[r]);
    (u as f64 - l as f64) / groups.size() as f64
}

/// Correlation between item points and total scores.
pub fn point_biserial(points: &[f64], totals: &[f64]) -> Option<f64> {
    if points.len() < 3 {
        return None;
    }
    let first = points[0];
    if points.iter().all(|&p| p == first) {
        return None;
    }
    pearson(points, totals)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyBand {
    Difficult,
    Moderate,
    Easy,
    VeryEasy,
}

impl DifficultyBand {
    pub fn of(p: f64) -> Self {
        match p {
            p if p < 0.30 => DifficultyBand::Difficult,
            p if p < 0.70 => DifficultyBand::Moderate,
            p if p < 0.95 => DifficultyBand::Easy,
            _ => DifficultyBand::VeryEasy,
        }
    }
}

impl fmt::Display for DifficultyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DifficultyBand::Difficult => "difficult",
            DifficultyBand::Moderate => "moderate",
            DifficultyBand::Easy => "easy",
            DifficultyBand::VeryEasy => "very easy",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscriminationBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl DiscriminationBand {
    pub fn of(d: f64) -> Self {
        match d {
            d if d >= 0.40 => DiscriminationBand::Excellent,
            d if d >= 0.30 => DiscriminationBand::Good,
            d if d >= 0.20 => DiscriminationBand::Fair,
            _ => DiscriminationBand::Poor,
        }
    }
}

impl fmt::Display for DiscriminationBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiscriminationBand::Excellent => "excellent",
            DiscriminationBand::Good => "good",
            DiscriminationBand::Fair => "fair",
            DiscriminationBand::Poor => "poor",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointBiserialBand {
    Good,
    Acceptable,
    Poor,
    InsufficientData,
}

impl PointBiserialBand {
    pub fn of(r: Option<f64>) -> Self {
        match r {
            None => PointBiserialBand::InsufficientData,
            Some(r) if r >= 0.30 => PointBiserialBand::Good,
            Some(r) if r >= 0.20 => PointBiserialBand::Acceptable,
            Some(_) => PointBiserialBand::Poor,
        }
    }
}

impl fmt::Display for PointBiserialBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PointBiserialBand::Good => "good",
            PointBiserialBand::Acceptable => "acceptable",
            PointBiserialBand::Poor => "poor",
            PointBiserialBand::InsufficientData => "insufficient data",
        })
    }
}

/// Composite verdict on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Good,
    Review,
    Poor,
    InsufficientData,
}

impl ItemStatus {
    pub fn of(
        difficulty: Option<f64>,
        discrimination: Option<f64>,
        point_biserial: Option<f64>,
    ) -> Self {
        let (Some(_), Some(d)) = (difficulty, discrimination) else {
            return ItemStatus::InsufficientData;
        };
        if d < 0.20 {
            ItemStatus::Poor
        } else if d < 0.30 || point_biserial.is_some_and(|r| r < 0.20) {
            ItemStatus::Review
        } else {
            ItemStatus::Good
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemStatus::Good => "good",
            ItemStatus::Review => "review",
            ItemStatus::Poor => "poor",
            ItemStatus::InsufficientData => "insufficient data",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistractorStatus {
    Functioning,
    PoorDiscrimination,
    NonFunctioning,
}

impl fmt::Display for DistractorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DistractorStatus::Functioning => "functioning",
            DistractorStatus::PoorDiscrimination => "poor discrimination",
            DistractorStatus::NonFunctioning => "non-functioning",
        })
    }
}

/// How one response option behaves in the extreme groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistractorOption {
    pub option: String,
    pub is_key: bool,
    pub upper_count: usize,
    pub lower_count: usize,
    /// Students choosing this option across the whole cohort.
    pub total_count: usize,
    pub discrimination: f64,
    pub status: DistractorStatus,
}

/// Option table for a multiple-choice item. Options are every single-letter
/// response observed plus the key, in alphabetical order.
pub fn distractors(
    responses: &[&str],
    key: &str,
    groups: &ExtremeGroups,
) -> Vec<DistractorOption> {
    let mut options: BTreeSet<&str> = responses
        .iter()
        .copied()
        .filter(|r| r.len() == 1 && r.chars().all(|c| c.is_ascii_alphabetic()))
        .collect();
    options.insert(key);

    let g = groups.size() as f64;
    options
        .into_iter()
        .map(|option| {
            let (upper_count, lower_count) = groups.counts(|r| responses[r] == option);
            let discrimination = (upper_count as f64 - lower_count as f64) / g;
            let is_key = option == key;
            let status = match (is_key, discrimination) {
                (true, d) if d > 0.0 => DistractorStatus::Functioning,
                (true, _) => DistractorStatus::PoorDiscrimination,
                (false, d) if d < 0.0 => DistractorStatus::Functioning,
                (false, _) => DistractorStatus::NonFunctioning,
            };
            DistractorOption {
                option: option.to_string(),
                is_key,
                upper_count,
                lower_count,
                total_count: responses.iter().filter(|&&r| r == option).count(),
                discrimination,
                status,
            }
        })
        .collect()
}

/// Full analysis of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAnalysis {
    pub item_id: u64,
    pub item_code: String,
    pub item_type: ItemType,
    pub max_points: f64,
    pub difficulty: Option<f64>,
    pub discrimination: Option<f64>,
    pub point_biserial: Option<f64>,
    pub difficulty_band: Option<DifficultyBand>,
    pub discrimination_band: Option<DiscriminationBand>,
    pub point_biserial_band: PointBiserialBand,
    pub status: ItemStatus,
    /// Multiple-choice items with enough students only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distractors: Vec<DistractorOption>,
}

/// Analyze every item of the matrix, in item order.
pub fn analyze_items(matrix: &ResponseMatrix) -> Vec<ItemAnalysis> {
    let totals = matrix.totals();
    let groups = ExtremeGroups::new(&totals);
    if groups.is_none() {
        tracing::warn!(
            "{} students is below the {MIN_STUDENTS} needed for extreme-group statistics",
            matrix.student_count()
        );
    }

    matrix
        .items
        .iter()
        .enumerate()
        .map(|(col, item)| {
            let correct: Vec<bool> = matrix
                .students
                .iter()
                .map(|s| s.cells[col].is_correct)
                .collect();
            let points = matrix.item_points(col);

            let difficulty = groups.as_ref().map(|g| difficulty(&correct, g));
            let discrimination = groups.as_ref().map(|g| discrimination(&correct, g));
            let point_biserial = point_biserial(&points, &totals);

            let distractors = match (&groups, item.metadata.correct_answer.as_deref()) {
                (Some(g), Some(key)) => {
                    let raw: Vec<&str> = matrix
                        .students
                        .iter()
                        .map(|s| s.cells[col].raw_value.as_str())
                        .collect();
                    distractors(&raw, key, g)
                }
                _ => Vec::new(),
            };

            ItemAnalysis {
                item_id: item.id,
                item_code: item.code.clone(),
                item_type: item.metadata.item_type,
                max_points: item.max_points(),
                difficulty,
                discrimination,
                point_biserial,
                difficulty_band: difficulty.map(DifficultyBand::of),
                discrimination_band: discrimination.map(DiscriminationBand::of),
                point_biserial_band: PointBiserialBand::of(point_biserial),
                status: ItemStatus::of(difficulty, discrimination, point_biserial),
                distractors,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descending(n: usize) -> Vec<f64> {
        (0..n).rev().map(|v| v as f64).collect()
    }

    #[test]
    fn fewer_than_ten_students_has_no_groups() {
        assert!(ExtremeGroups::new(&descending(9)).is_none());
        let g = ExtremeGroups::new(&descending(10)).unwrap();
        assert_eq!(g.size(), 2);
    }

    #[test]
    fn groups_follow_total_score_order() {
        let totals = [5.0, 9.0, 1.0, 7.0, 3.0, 8.0, 2.0, 6.0, 4.0, 0.0, 10.0];
        let g = ExtremeGroups::new(&totals).unwrap();
        assert_eq!(g.size(), 2);
        assert_eq!(g.upper, vec![10, 1]);
        assert_eq!(g.lower, vec![2, 9]);
    }

    #[test]
    fn groups_never_overlap() {
        for n in 10..200 {
            let g = ExtremeGroups::new(&descending(n)).unwrap();
            assert!(g.upper.iter().all(|r| !g.lower.contains(r)), "overlap at n={n}");
        }
    }

    #[test]
    fn perfectly_discriminating_item() {
        // 100 students, top 27 all correct, bottom 27 all wrong
        let totals = descending(100);
        let correct: Vec<bool> = (0..100).map(|i| i < 50).collect();
        let g = ExtremeGroups::new(&totals).unwrap();
        assert_eq!(g.size(), 27);
        assert_eq!(difficulty(&correct, &g), 0.5);
        assert_eq!(discrimination(&correct, &g), 1.0);
    }

    #[test]
    fn point_biserial_needs_variation() {
        assert!(point_biserial(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(point_biserial(&[0.0, 1.0], &[1.0, 2.0]).is_none());
        let r = point_biserial(&[0.0, 0.0, 1.0, 1.0], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(r > 0.8);
    }

    #[test]
    fn bands_and_status() {
        assert_eq!(DifficultyBand::of(0.29), DifficultyBand::Difficult);
        assert_eq!(DifficultyBand::of(0.30), DifficultyBand::Moderate);
        assert_eq!(DifficultyBand::of(0.95), DifficultyBand::VeryEasy);
        assert_eq!(DiscriminationBand::of(0.40), DiscriminationBand::Excellent);
        assert_eq!(DiscriminationBand::of(0.19), DiscriminationBand::Poor);
        assert_eq!(PointBiserialBand::of(None), PointBiserialBand::InsufficientData);

        assert_eq!(ItemStatus::of(None, Some(0.5), None), ItemStatus::InsufficientData);
        assert_eq!(ItemStatus::of(Some(0.5), Some(0.1), Some(0.5)), ItemStatus::Poor);
        assert_eq!(ItemStatus::of(Some(0.5), Some(0.25), Some(0.5)), ItemStatus::Review);
        assert_eq!(ItemStatus::of(Some(0.5), Some(0.45), Some(0.1)), ItemStatus::Review);
        assert_eq!(ItemStatus::of(Some(0.5), Some(0.45), None), ItemStatus::Good);
    }

    #[test]
    fn distractor_table() {
        // rows 0..10 by descending score; upper = {0, 1}, lower = {8, 9}
        let totals = descending(10);
        let g = ExtremeGroups::new(&totals).unwrap();
        let responses = ["B", "B", "A", "C", "B", "", "A C", "B", "A", "A"];
        let table = distractors(&responses, "B", &g);

        let options: Vec<&str> = table.iter().map(|o| o.option.as_str()).collect();
        assert_eq!(options, vec!["A", "B", "C"]);

        let key = &table[1];
        assert!(key.is_key);
        assert_eq!((key.upper_count, key.lower_count), (2, 0));
        assert_eq!(key.discrimination, 1.0);
        assert_eq!(key.status, DistractorStatus::Functioning);
        assert_eq!(key.total_count, 4);

        let a = &table[0];
        assert_eq!(a.discrimination, -1.0);
        assert_eq!(a.status, DistractorStatus::Functioning);

        let c = &table[2];
        assert_eq!(c.discrimination, 0.0);
        assert_eq!(c.status, DistractorStatus::NonFunctioning);
    }

    #[test]
    fn unchosen_key_still_listed() {
        let g = ExtremeGroups::new(&descending(10)).unwrap();
        let responses = ["A"; 10];
        let table = distractors(&responses, "D", &g);
        let key = table.iter().find(|o| o.is_key).unwrap();
        assert_eq!(key.option, "D");
        assert_eq!(key.status, DistractorStatus::PoorDiscrimination);
    }
}
