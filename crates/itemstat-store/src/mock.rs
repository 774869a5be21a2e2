//! Fault-injecting store for testing retries and cleanup.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use itemstat_core::error::StoreError;
use itemstat_core::model::{
    AssessmentData, AssessmentId, AssessmentMeta, AssessmentSummary, Item, NewItem, ScoredStudent,
    StatisticSet,
};
use itemstat_core::traits::AssessmentStore;

use crate::memory::MemoryStore;

/// Store operation a [`FlakyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateAssessment,
    InsertStudents,
    LoadAssessment,
    ReplaceStatistics,
}

/// How an injected failure looks to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// `StoreError::Unavailable`, retried by the pipeline.
    Transient,
    /// `StoreError::Conflict`, never retried.
    Permanent,
}

/// A [`MemoryStore`] whose chosen operation fails a fixed number of times
/// before it starts succeeding.
pub struct FlakyStore {
    inner: MemoryStore,
    operation: Operation,
    failure: Failure,
    failures_left: AtomicU32,
    call_count: AtomicU32,
}

impl FlakyStore {
    pub fn new(operation: Operation, failure: Failure, failures: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            operation,
            failure,
            failures_left: AtomicU32::new(failures),
            call_count: AtomicU32::new(0),
        }
    }

    /// Calls made to the failing operation, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The wrapped store, for inspecting what was persisted.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, operation: Operation) -> Result<(), StoreError> {
        if operation != self.operation {
            return Ok(());
        }
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let failed = self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if !failed {
            return Ok(());
        }
        Err(match self.failure {
            Failure::Transient => StoreError::Unavailable(format!("injected {operation:?} failure")),
            Failure::Permanent => StoreError::Conflict(format!("injected {operation:?} failure")),
        })
    }
}

#[async_trait]
impl AssessmentStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn create_assessment(
        &self,
        meta: &AssessmentMeta,
        items: &[NewItem],
    ) -> Result<(AssessmentId, Vec<Item>), StoreError> {
        self.check(Operation::CreateAssessment)?;
        self.inner.create_assessment(meta, items).await
    }

    async fn insert_students(
        &self,
        id: AssessmentId,
        students: &[ScoredStudent],
    ) -> Result<usize, StoreError> {
        self.check(Operation::InsertStudents)?;
        self.inner.insert_students(id, students).await
    }

    async fn load_assessment(&self, id: AssessmentId) -> Result<AssessmentData, StoreError> {
        self.check(Operation::LoadAssessment)?;
        self.inner.load_assessment(id).await
    }

    async fn replace_statistics(
        &self,
        id: AssessmentId,
        statistics: &StatisticSet,
    ) -> Result<(), StoreError> {
        self.check(Operation::ReplaceStatistics)?;
        self.inner.replace_statistics(id, statistics).await
    }

    async fn load_statistics(&self, id: AssessmentId) -> Result<StatisticSet, StoreError> {
        self.inner.load_statistics(id).await
    }

    async fn list_assessments(&self) -> Result<Vec<AssessmentSummary>, StoreError> {
        self.inner.list_assessments().await
    }

    async fn delete_assessment(&self, id: AssessmentId) -> Result<(), StoreError> {
        self.inner.delete_assessment(id).await
    }
}
