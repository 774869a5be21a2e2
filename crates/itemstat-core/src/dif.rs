//! Differential item functioning between sub-groups.
//!
//! Group difficulty uses the extreme-group method inside each group: the
//! mean of the upper and lower 27% groups' average points, divided by the
//! item's maximum points. A comparison only produces a record when both
//! groups are large enough; otherwise the item is silently skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::item_analysis::ExtremeGroups;
use crate::matrix::ResponseMatrix;
use crate::model::{DifClassification, DifRecord, DifType};

fn default_min_group_size() -> usize {
    10
}

fn default_percentile_group_fraction() -> f64 {
    0.20
}

fn default_negligible_below() -> f64 {
    0.05
}

fn default_moderate_below() -> f64 {
    0.10
}

fn default_country_min_group_size() -> usize {
    10
}

fn default_country_gender_min_group_size() -> usize {
    5
}

fn default_male_code() -> String {
    "M".to_string()
}

fn default_female_code() -> String {
    "F".to_string()
}

fn default_reference_group() -> String {
    "ALL".to_string()
}

/// Sample-size floors and classification thresholds for DIF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifPolicy {
    /// Smallest group for gender and percentile comparisons.
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,
    /// Share of the cohort in each of the top and bottom ability groups.
    #[serde(default = "default_percentile_group_fraction")]
    pub percentile_group_fraction: f64,
    /// |difScore| below this is negligible.
    #[serde(default = "default_negligible_below")]
    pub negligible_below: f64,
    /// |difScore| below this (and not negligible) is slight to moderate.
    #[serde(default = "default_moderate_below")]
    pub moderate_below: f64,
    #[serde(default = "default_country_min_group_size")]
    pub country_min_group_size: usize,
    #[serde(default = "default_country_gender_min_group_size")]
    pub country_gender_min_group_size: usize,
    #[serde(default = "default_male_code")]
    pub male_code: String,
    #[serde(default = "default_female_code")]
    pub female_code: String,
    /// Label of the whole cohort in country comparisons.
    #[serde(default = "default_reference_group")]
    pub reference_group: String,
}

impl Default for DifPolicy {
    fn default() -> Self {
        Self {
            min_group_size: default_min_group_size(),
            percentile_group_fraction: default_percentile_group_fraction(),
            negligible_below: default_negligible_below(),
            moderate_below: default_moderate_below(),
            country_min_group_size: default_country_min_group_size(),
            country_gender_min_group_size: default_country_gender_min_group_size(),
            male_code: default_male_code(),
            female_code: default_female_code(),
            reference_group: default_reference_group(),
        }
    }
}

impl DifPolicy {
    pub fn classify(&self, dif_score: f64) -> DifClassification {
        let magnitude = dif_score.abs();
        if magnitude < self.negligible_below {
            DifClassification::Negligible
        } else if magnitude < self.moderate_below {
            DifClassification::SlightToModerate
        } else {
            DifClassification::ModerateToLarge
        }
    }
}

/// Difficulty of one item within a group of student rows.
///
/// `None` when the group is too small for extreme groups.
pub fn group_difficulty(matrix: &ResponseMatrix, rows: &[usize], col: usize) -> Option<f64> {
    let totals = matrix.totals();
    let groups = ExtremeGroups::within(rows, &totals)?;
    let g = groups.size() as f64;
    let average = |group: &[usize]| -> f64 {
        group
            .iter()
            .map(|&r| matrix.students[r].cells[col].points)
            .sum::<f64>()
            / g
    };
    let mean_points = (average(&groups.upper) + average(&groups.lower)) / 2.0;
    Some(mean_points / matrix.items[col].max_points())
}

/// One side of a comparison.
struct Group<'a> {
    label: &'a str,
    rows: &'a [usize],
}

fn compare(
    matrix: &ResponseMatrix,
    policy: &DifPolicy,
    dif_type: DifType,
    country: Option<&str>,
    a: Group<'_>,
    b: Group<'_>,
) -> Vec<DifRecord> {
    matrix
        .items
        .iter()
        .enumerate()
        .filter_map(|(col, item)| {
            let difficulty_a = group_difficulty(matrix, a.rows, col)?;
            let difficulty_b = group_difficulty(matrix, b.rows, col)?;
            let dif_score = difficulty_a - difficulty_b;
            Some(DifRecord {
                assessment_id: matrix.assessment_id,
                item_id: item.id,
                item_code: item.code.clone(),
                dif_type,
                country: country.map(str::to_string),
                group_a: a.label.to_string(),
                group_b: b.label.to_string(),
                difficulty_a,
                difficulty_b,
                dif_score,
                classification: policy.classify(dif_score),
                sample_size_a: a.rows.len(),
                sample_size_b: b.rows.len(),
            })
        })
        .collect()
}

fn rows_with_gender(matrix: &ResponseMatrix, rows: &[usize], code: &str) -> Vec<usize> {
    rows.iter()
        .copied()
        .filter(|&r| matrix.students[r].gender() == Some(code))
        .collect()
}

/// Male versus female, per item.
pub fn gender_dif(matrix: &ResponseMatrix, policy: &DifPolicy) -> Vec<DifRecord> {
    let all: Vec<usize> = (0..matrix.student_count()).collect();
    let male = rows_with_gender(matrix, &all, &policy.male_code);
    let female = rows_with_gender(matrix, &all, &policy.female_code);

    if male.len() < policy.min_group_size || female.len() < policy.min_group_size {
        tracing::warn!(
            "insufficient sample size for gender DIF: {}={}, {}={}",
            policy.male_code,
            male.len(),
            policy.female_code,
            female.len()
        );
        return Vec::new();
    }

    let records = compare(
        matrix,
        policy,
        DifType::Gender,
        None,
        Group {
            label: &policy.male_code,
            rows: &male,
        },
        Group {
            label: &policy.female_code,
            rows: &female,
        },
    );
    tracing::debug!("gender DIF computed for {} items", records.len());
    records
}

/// Top versus bottom ability groups, per item.
pub fn percentile_dif(matrix: &ResponseMatrix, policy: &DifPolicy) -> Vec<DifRecord> {
    let n = matrix.student_count();
    let size = (n as f64 * policy.percentile_group_fraction).floor() as usize;
    if size < policy.min_group_size || size * 2 > n {
        tracing::warn!(
            "insufficient sample size for percentile DIF: {n} students, groups of {size}"
        );
        return Vec::new();
    }

    let totals = matrix.totals();
    let mut sorted: Vec<usize> = (0..n).collect();
    sorted.sort_by(|&a, &b| totals[b].total_cmp(&totals[a]));
    let top = &sorted[..size];
    let bottom = &sorted[n - size..];

    compare(
        matrix,
        policy,
        DifType::Percentile,
        None,
        Group {
            label: "TOP",
            rows: top,
        },
        Group {
            label: "BOTTOM",
            rows: bottom,
        },
    )
}

// Rows per known country, sorted by country code.
fn rows_by_country(matrix: &ResponseMatrix) -> BTreeMap<&str, Vec<usize>> {
    let mut by_country: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (row, student) in matrix.students.iter().enumerate() {
        if let Some(country) = student.country() {
            by_country.entry(country).or_default().push(row);
        }
    }
    by_country
}

/// Each sufficiently large country versus the whole cohort, per item.
pub fn country_dif(matrix: &ResponseMatrix, policy: &DifPolicy) -> Vec<DifRecord> {
    let by_country = rows_by_country(matrix);
    if by_country.len() < 2 {
        tracing::warn!("country DIF requires at least 2 countries, found {}", by_country.len());
        return Vec::new();
    }

    let all: Vec<usize> = (0..matrix.student_count()).collect();
    let mut records = Vec::new();
    for (country, rows) in &by_country {
        if rows.len() < policy.country_min_group_size {
            tracing::debug!("skipping country {country}: {} students", rows.len());
            continue;
        }
        records.extend(compare(
            matrix,
            policy,
            DifType::Country,
            None,
            Group {
                label: *country,
                rows,
            },
            Group {
                label: &policy.reference_group,
                rows: &all,
            },
        ));
    }
    records
}

/// Male versus female within each country, per item.
pub fn country_gender_dif(matrix: &ResponseMatrix, policy: &DifPolicy) -> Vec<DifRecord> {
    let mut records = Vec::new();
    for (country, rows) in &rows_by_country(matrix) {
        let male = rows_with_gender(matrix, rows, &policy.male_code);
        let female = rows_with_gender(matrix, rows, &policy.female_code);
        let floor = policy.country_gender_min_group_size;
        if male.len() < floor || female.len() < floor {
            tracing::debug!(
                "skipping country {country} for gender DIF: {}={}, {}={}",
                policy.male_code,
                male.len(),
                policy.female_code,
                female.len()
            );
            continue;
        }
        records.extend(compare(
            matrix,
            policy,
            DifType::CountryGender,
            Some(*country),
            Group {
                label: &policy.male_code,
                rows: &male,
            },
            Group {
                label: &policy.female_code,
                rows: &female,
            },
        ));
    }
    records
}

/// Run one kind of comparison.
pub fn compute(matrix: &ResponseMatrix, policy: &DifPolicy, dif_type: DifType) -> Vec<DifRecord> {
    match dif_type {
        DifType::Gender => gender_dif(matrix, policy),
        DifType::Percentile => percentile_dif(matrix, policy),
        DifType::Country => country_dif(matrix, policy),
        DifType::CountryGender => country_gender_dif(matrix, policy),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::matrix::{Cell, StudentRow};
    use crate::model::{Demographics, Item, ItemMetadata};
    use uuid::Uuid;

    /// A one-item matrix: each student is (gender, country, correct).
    pub(crate) fn one_item_matrix(students: &[(&str, &str, bool)]) -> ResponseMatrix {
        let n = students.len();
        ResponseMatrix {
            assessment_id: Uuid::nil(),
            items: vec![Item {
                id: 1,
                code: "Q1".into(),
                metadata: ItemMetadata::multiple_choice("A"),
                content_domain: None,
            }],
            students: students
                .iter()
                .enumerate()
                .map(|(i, &(gender, country, correct))| StudentRow {
                    id: i as u64 + 1,
                    code: format!("S{i}"),
                    demographics: Demographics {
                        gender: Some(gender.to_string()),
                        country: Some(country.to_string()),
                        ..Demographics::default()
                    },
                    // distinct descending totals
                    total_score: (n - i) as f64,
                    cells: vec![Cell {
                        raw_value: if correct { "A" } else { "B" }.into(),
                        is_correct: correct,
                        points: if correct { 1.0 } else { 0.0 },
                    }],
                })
                .collect(),
        }
    }

    #[test]
    fn classification_thresholds() {
        let policy = DifPolicy::default();
        assert_eq!(policy.classify(0.049), DifClassification::Negligible);
        assert_eq!(policy.classify(-0.05), DifClassification::SlightToModerate);
        assert_eq!(policy.classify(0.099), DifClassification::SlightToModerate);
        assert_eq!(policy.classify(-0.10), DifClassification::ModerateToLarge);
    }

    #[test]
    fn policy_fills_missing_fields_with_defaults() {
        let policy: DifPolicy = serde_json::from_str(r#"{"negligible_below": 0.02}"#).unwrap();
        assert_eq!(policy.negligible_below, 0.02);
        assert_eq!(policy.min_group_size, 10);
        assert_eq!(policy.male_code, "M");
    }

    #[test]
    fn gender_dif_compares_male_and_female() {
        // males all correct, females correct only in their top half
        let mut students = Vec::new();
        for i in 0..20 {
            students.push(("M", "GRD", true));
            students.push(("F", "GRD", i < 10));
        }
        let matrix = one_item_matrix(&students);
        let records = gender_dif(&matrix, &DifPolicy::default());

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.dif_type, DifType::Gender);
        assert_eq!((r.group_a.as_str(), r.group_b.as_str()), ("M", "F"));
        assert_eq!(r.difficulty_a, 1.0);
        assert_eq!(r.difficulty_b, 0.5);
        assert_eq!(r.dif_score, 0.5);
        assert_eq!(r.classification, DifClassification::ModerateToLarge);
        assert_eq!((r.sample_size_a, r.sample_size_b), (20, 20));
    }

    #[test]
    fn small_gender_group_yields_no_record() {
        let mut students = vec![("M", "GRD", true); 30];
        students.extend(vec![("F", "GRD", true); 9]);
        let matrix = one_item_matrix(&students);
        assert!(gender_dif(&matrix, &DifPolicy::default()).is_empty());
    }

    #[test]
    fn percentile_dif_needs_fifty_students() {
        let students = vec![("M", "GRD", true); 49];
        assert!(percentile_dif(&one_item_matrix(&students), &DifPolicy::default()).is_empty());

        let students: Vec<_> = (0..50).map(|i| ("M", "GRD", i < 25)).collect();
        let records = percentile_dif(&one_item_matrix(&students), &DifPolicy::default());
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!((r.group_a.as_str(), r.group_b.as_str()), ("TOP", "BOTTOM"));
        assert_eq!((r.sample_size_a, r.sample_size_b), (10, 10));
        assert_eq!(r.dif_score, 1.0);
    }

    #[test]
    fn country_dif_against_whole_cohort() {
        let mut students: Vec<_> = (0..12).map(|_| ("M", "GRD", true)).collect();
        students.extend((0..12).map(|_| ("F", "LCA", false)));
        students.extend((0..3).map(|_| ("F", "DMA", true)));
        let matrix = one_item_matrix(&students);
        let records = country_dif(&matrix, &DifPolicy::default());

        // DMA is below the size floor
        let countries: Vec<&str> = records.iter().map(|r| r.group_a.as_str()).collect();
        assert_eq!(countries, vec!["GRD", "LCA"]);
        assert!(records.iter().all(|r| r.group_b == "ALL" && r.sample_size_b == 27));
        assert_eq!(records[0].difficulty_a, 1.0);
        assert_eq!(records[1].difficulty_a, 0.0);
    }

    #[test]
    fn country_dif_needs_two_countries() {
        let students = vec![("M", "GRD", true); 30];
        assert!(country_dif(&one_item_matrix(&students), &DifPolicy::default()).is_empty());
    }

    #[test]
    fn country_gender_records_carry_country() {
        let mut students = Vec::new();
        for i in 0..10 {
            students.push(("M", "GRD", true));
            students.push(("F", "GRD", i % 2 == 0));
        }
        students.extend(vec![("M", "LCA", true); 10]);
        let matrix = one_item_matrix(&students);
        let records = country_gender_dif(&matrix, &DifPolicy::default());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country.as_deref(), Some("GRD"));
        assert_eq!(records[0].dif_type, DifType::CountryGender);
    }
}
