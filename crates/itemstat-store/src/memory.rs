//! In-process assessment store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use itemstat_core::error::StoreError;
use itemstat_core::model::{
    AssessmentData, AssessmentId, AssessmentMeta, AssessmentSummary, Item, NewItem, ScoredStudent,
    StatisticSet,
};
use itemstat_core::traits::AssessmentStore;

use crate::record::{sort_summaries, AssessmentRecord};

/// Keeps every assessment in memory. Used for one-shot analysis runs and
/// tests; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    assessments: RwLock<HashMap<AssessmentId, AssessmentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.assessments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assessments.read().await.is_empty()
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_assessment(
        &self,
        meta: &AssessmentMeta,
        items: &[NewItem],
    ) -> Result<(AssessmentId, Vec<Item>), StoreError> {
        let id = Uuid::new_v4();
        let record = AssessmentRecord::new(id, meta, items)?;
        let items = record.items.clone();
        self.assessments.write().await.insert(id, record);
        Ok((id, items))
    }

    async fn insert_students(
        &self,
        id: AssessmentId,
        students: &[ScoredStudent],
    ) -> Result<usize, StoreError> {
        let mut assessments = self.assessments.write().await;
        let record = assessments.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.insert_students(students)
    }

    async fn load_assessment(&self, id: AssessmentId) -> Result<AssessmentData, StoreError> {
        let assessments = self.assessments.read().await;
        assessments
            .get(&id)
            .map(AssessmentRecord::data)
            .ok_or(StoreError::NotFound(id))
    }

    async fn replace_statistics(
        &self,
        id: AssessmentId,
        statistics: &StatisticSet,
    ) -> Result<(), StoreError> {
        let mut assessments = self.assessments.write().await;
        let record = assessments.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.statistics = statistics.clone();
        Ok(())
    }

    async fn load_statistics(&self, id: AssessmentId) -> Result<StatisticSet, StoreError> {
        let assessments = self.assessments.read().await;
        assessments
            .get(&id)
            .map(|r| r.statistics.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_assessments(&self) -> Result<Vec<AssessmentSummary>, StoreError> {
        let mut summaries: Vec<_> = self
            .assessments
            .read()
            .await
            .values()
            .map(AssessmentRecord::summary)
            .collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn delete_assessment(&self, id: AssessmentId) -> Result<(), StoreError> {
        self.assessments
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
