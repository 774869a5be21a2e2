//! Core trait definitions for assessment persistence.
//!
//! The trait is implemented by the `itemstat-store` crate. Every method is
//! scoped to one assessment; the ingestion pipeline serializes writers per
//! assessment, so implementations only need each call to be atomic.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    AssessmentData, AssessmentId, AssessmentMeta, AssessmentSummary, Item, NewItem, ScoredStudent,
    StatisticSet,
};

// ---------------------------------------------------------------------------
// Assessment store trait
// ---------------------------------------------------------------------------

/// Trait for backends that persist assessments, responses and statistics.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Human-readable backend name (e.g. "json").
    fn name(&self) -> &str;

    /// Create an assessment with its items. Item ids are assigned by the
    /// store and returned in input order.
    async fn create_assessment(
        &self,
        meta: &AssessmentMeta,
        items: &[NewItem],
    ) -> Result<(AssessmentId, Vec<Item>), StoreError>;

    /// Append a chunk of scored students. Responses name their item by code.
    /// A student whose (code, country) already exists is skipped.
    ///
    /// Returns the number of students inserted.
    async fn insert_students(
        &self,
        id: AssessmentId,
        students: &[ScoredStudent],
    ) -> Result<usize, StoreError>;

    /// Load items, students and responses.
    async fn load_assessment(&self, id: AssessmentId) -> Result<AssessmentData, StoreError>;

    /// Replace all statistics and DIF records of an assessment in one step.
    /// Readers see either the previous set or the new one, never a mix.
    async fn replace_statistics(
        &self,
        id: AssessmentId,
        statistics: &StatisticSet,
    ) -> Result<(), StoreError>;

    /// Load the current statistics; empty if never computed.
    async fn load_statistics(&self, id: AssessmentId) -> Result<StatisticSet, StoreError>;

    /// All assessments, most recently uploaded first.
    async fn list_assessments(&self) -> Result<Vec<AssessmentSummary>, StoreError>;

    /// Delete an assessment and everything it owns.
    async fn delete_assessment(&self, id: AssessmentId) -> Result<(), StoreError>;
}
