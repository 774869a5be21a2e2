//! The per-assessment document shared by the memory and JSON backends.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use itemstat_core::error::StoreError;
use itemstat_core::model::{
    AssessmentData, AssessmentId, AssessmentMeta, AssessmentSummary, Item, NewItem, Response,
    ScoredStudent, StatisticSet, Student,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AssessmentRecord {
    pub id: AssessmentId,
    pub meta: AssessmentMeta,
    pub items: Vec<Item>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub statistics: StatisticSet,
}

impl AssessmentRecord {
    /// Item ids are assigned from 1 in input order.
    pub fn new(id: AssessmentId, meta: &AssessmentMeta, items: &[NewItem]) -> Result<Self, StoreError> {
        let mut seen = HashSet::new();
        for item in items {
            if !seen.insert(item.code.as_str()) {
                return Err(StoreError::Conflict(format!(
                    "duplicate item code {} in assessment {}",
                    item.code, meta.name
                )));
            }
        }

        let items = items
            .iter()
            .enumerate()
            .map(|(i, item)| Item {
                id: i as u64 + 1,
                code: item.code.clone(),
                metadata: item.metadata.clone(),
                content_domain: item.content_domain.clone(),
            })
            .collect();

        Ok(Self {
            id,
            meta: meta.clone(),
            items,
            students: Vec::new(),
            statistics: StatisticSet::default(),
        })
    }

    /// Append students, skipping any whose (code, country) is already
    /// present. Validates the whole chunk before changing anything.
    pub fn insert_students(&mut self, students: &[ScoredStudent]) -> Result<usize, StoreError> {
        let item_ids: HashMap<&str, u64> =
            self.items.iter().map(|i| (i.code.as_str(), i.id)).collect();

        let mut known: HashSet<(String, Option<String>)> = self
            .students
            .iter()
            .map(|s| (s.code.clone(), s.demographics.country.clone()))
            .collect();

        let mut next_id = self.students.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let mut accepted = Vec::new();
        for student in students {
            let key = (student.code.clone(), student.demographics.country.clone());
            if !known.insert(key) {
                continue;
            }

            let responses = student
                .responses
                .iter()
                .map(|r| match item_ids.get(r.item_code.as_str()) {
                    Some(&item_id) => Ok(Response {
                        item_id,
                        raw_value: r.raw_value.clone(),
                        is_correct: r.is_correct,
                        points_earned: r.points_earned,
                    }),
                    None => Err(StoreError::Conflict(format!(
                        "student {} answers unknown item {}",
                        student.code, r.item_code
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;

            accepted.push(Student {
                id: next_id,
                code: student.code.clone(),
                demographics: student.demographics.clone(),
                total_score: student.total_score,
                responses,
            });
            next_id += 1;
        }

        let inserted = accepted.len();
        self.students.extend(accepted);
        Ok(inserted)
    }

    pub fn data(&self) -> AssessmentData {
        AssessmentData {
            id: self.id,
            meta: self.meta.clone(),
            items: self.items.clone(),
            students: self.students.clone(),
        }
    }

    pub fn summary(&self) -> AssessmentSummary {
        AssessmentSummary {
            id: self.id,
            meta: self.meta.clone(),
            student_count: self.students.len(),
            item_count: self.items.len(),
        }
    }
}

/// Most recently uploaded first.
pub(crate) fn sort_summaries(summaries: &mut [AssessmentSummary]) {
    summaries.sort_by(|a, b| b.meta.uploaded_at.cmp(&a.meta.uploaded_at));
}
