//! The (student × item) response matrix the statistics engine reads.
//!
//! Rows are students, columns are items in item order. Every row has one
//! cell per item; a response the store does not have reads as blank,
//! incorrect and worth zero points.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AssessmentData, AssessmentId, Demographics, Item, ItemType, ScoredStudent};
use crate::parser::ParsedFile;

/// One scored response inside the matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub raw_value: String,
    pub is_correct: bool,
    pub points: f64,
}

/// A student row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRow {
    pub id: u64,
    pub code: String,
    pub demographics: Demographics,
    pub total_score: f64,
    /// Aligned with `ResponseMatrix::items`.
    pub cells: Vec<Cell>,
}

impl StudentRow {
    pub fn gender(&self) -> Option<&str> {
        self.demographics.gender.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.demographics.country.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMatrix {
    pub assessment_id: AssessmentId,
    pub items: Vec<Item>,
    pub students: Vec<StudentRow>,
}

impl ResponseMatrix {
    /// Rebuild the matrix from stored data.
    pub fn from_assessment(data: &AssessmentData) -> Self {
        let column: HashMap<u64, usize> = data
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id, i))
            .collect();

        let students = data
            .students
            .iter()
            .map(|student| {
                let mut cells = vec![Cell::default(); data.items.len()];
                for response in &student.responses {
                    if let Some(&col) = column.get(&response.item_id) {
                        cells[col] = Cell {
                            raw_value: response.raw_value.clone(),
                            is_correct: response.is_correct,
                            points: response.points_earned,
                        };
                    }
                }
                StudentRow {
                    id: student.id,
                    code: student.code.clone(),
                    demographics: student.demographics.clone(),
                    total_score: student.total_score,
                    cells,
                }
            })
            .collect();

        Self {
            assessment_id: data.id,
            items: data.items.clone(),
            students,
        }
    }

    /// Build the matrix for a parsed file from its scored students, without
    /// a store. Items and students get sequential ids starting at 1.
    pub fn from_scored(parsed: &ParsedFile, scored: &[ScoredStudent]) -> Self {
        let items: Vec<Item> = parsed
            .new_items()
            .into_iter()
            .zip(1u64..)
            .map(|(item, id)| Item {
                id,
                code: item.code,
                metadata: item.metadata,
                content_domain: item.content_domain,
            })
            .collect();
        let column: HashMap<&str, usize> = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.code.as_str(), i))
            .collect();

        let students = scored
            .iter()
            .zip(1u64..)
            .map(|(student, id)| {
                let mut cells = vec![Cell::default(); items.len()];
                for response in &student.responses {
                    if let Some(&col) = column.get(response.item_code.as_str()) {
                        cells[col] = Cell {
                            raw_value: response.raw_value.clone(),
                            is_correct: response.is_correct,
                            points: response.points_earned,
                        };
                    }
                }
                StudentRow {
                    id,
                    code: student.code.clone(),
                    demographics: student.demographics.clone(),
                    total_score: student.total_score,
                    cells,
                }
            })
            .collect();

        Self {
            assessment_id: Uuid::nil(),
            items,
            students,
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    /// Sum of every item's maximum points.
    pub fn max_score(&self) -> f64 {
        self.items.iter().map(Item::max_points).sum()
    }

    pub fn is_weighted(&self) -> bool {
        self.items
            .iter()
            .any(|i| i.metadata.item_type == ItemType::ConstructedResponse)
    }

    /// Total score of every student, in row order.
    pub fn totals(&self) -> Vec<f64> {
        self.students.iter().map(|s| s.total_score).collect()
    }

    /// Points column of one item.
    pub fn item_points(&self, col: usize) -> Vec<f64> {
        self.students.iter().map(|s| s.cells[col].points).collect()
    }

    /// Points of every student on every item (rows = students).
    pub fn points_rows(&self) -> Vec<Vec<f64>> {
        self.students
            .iter()
            .map(|s| s.cells.iter().map(|c| c.points).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssessmentMeta, ItemMetadata, Response, Student};

    fn item(id: u64, code: &str, meta: ItemMetadata) -> Item {
        Item {
            id,
            code: code.into(),
            metadata: meta,
            content_domain: None,
        }
    }

    #[test]
    fn missing_responses_read_as_blank() {
        let data = AssessmentData {
            id: Uuid::new_v4(),
            meta: AssessmentMeta::new("Grade 6"),
            items: vec![
                item(10, "Q1", ItemMetadata::multiple_choice("A")),
                item(11, "Q2", ItemMetadata::constructed_response(3.0)),
            ],
            students: vec![Student {
                id: 1,
                code: "S1".into(),
                demographics: Demographics::default(),
                total_score: 2.0,
                responses: vec![Response {
                    item_id: 11,
                    raw_value: "2".into(),
                    is_correct: false,
                    points_earned: 2.0,
                }],
            }],
        };

        let matrix = ResponseMatrix::from_assessment(&data);
        assert_eq!(matrix.assessment_id, data.id);
        assert_eq!(matrix.max_score(), 4.0);
        assert!(matrix.is_weighted());
        let row = &matrix.students[0];
        assert_eq!(row.cells.len(), 2);
        assert_eq!(row.cells[0], Cell::default());
        assert_eq!(row.cells[1].points, 2.0);
        assert_eq!(matrix.points_rows(), vec![vec![0.0, 2.0]]);
    }

    #[test]
    fn scores_parsed_file() {
        let grid = crate::grid::Grid::from_rows([
            vec!["KEY", "", "A", "2"],
            vec!["ID", "Sex", "Q1", "Q2"],
            vec!["S1", "F", "A", "2"],
            vec!["S2", "M", "B", "1"],
            vec!["S3", "M", "A B", "x"],
        ]);
        let parsed = crate::parser::parse_grid(&grid).unwrap();
        let (scored, summary) = crate::engine::score_parsed(&parsed);
        let matrix = ResponseMatrix::from_scored(&parsed, &scored);

        assert_eq!(matrix.totals(), vec![3.0, 1.0, 0.0]);
        assert_eq!(matrix.item_points(0), vec![1.0, 0.0, 0.0]);
        assert_eq!(summary.responses_scored, 6);
        assert_eq!(summary.multiple_responses, 1);
        assert_eq!(summary.unparsable_responses, 1);
        assert_eq!(matrix.students[1].code, "S2");
        assert_eq!(matrix.students[2].cells[0].raw_value, "A B");
        assert_eq!(
            matrix.items.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
