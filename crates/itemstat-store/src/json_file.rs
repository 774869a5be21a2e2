//! Directory-of-JSON assessment store.
//!
//! Each assessment lives in `<dir>/<id>.json`. Every write goes to a temp
//! file in the same directory and is renamed over the old document, so a
//! reader sees either the previous version or the new one.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use uuid::Uuid;

use itemstat_core::error::StoreError;
use itemstat_core::model::{
    AssessmentData, AssessmentId, AssessmentMeta, AssessmentSummary, Item, NewItem, ScoredStudent,
    StatisticSet,
};
use itemstat_core::traits::AssessmentStore;

use crate::record::{sort_summaries, AssessmentRecord};

const EXTENSION: &str = "json";

/// File I/O runs on the blocking pool so concurrent ingestions do not stall
/// the runtime threads.
pub struct JsonFileStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles on documents.
    writes: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!("opened JSON store at {}", dir.display());
        Ok(Self {
            dir,
            writes: Mutex::new(()),
        })
    }

    fn path_of(&self, id: AssessmentId) -> PathBuf {
        document_path(&self.dir, id)
    }

    async fn read(&self, id: AssessmentId) -> Result<AssessmentRecord, StoreError> {
        let path = self.path_of(id);
        blocking(move || read_record(&path, id)).await
    }

    async fn write(&self, record: AssessmentRecord) -> Result<(), StoreError> {
        let dir = self.dir.clone();
        blocking(move || write_record(&dir, &record)).await
    }

    async fn update<T>(
        &self,
        id: AssessmentId,
        change: impl FnOnce(&mut AssessmentRecord) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.writes.lock().await;
        let mut record = self.read(id).await?;
        let result = change(&mut record)?;
        self.write(record).await?;
        Ok(result)
    }
}

fn document_path(dir: &Path, id: AssessmentId) -> PathBuf {
    dir.join(format!("{id}.{EXTENSION}"))
}

/// Run blocking file work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
}

fn read_record(path: &Path, id: AssessmentId) -> Result<AssessmentRecord, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StoreError::NotFound(id)),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Write to a temp file in `dir`, then rename it over the document.
fn write_record(dir: &Path, record: &AssessmentRecord) -> Result<(), StoreError> {
    let json = serde_json::to_vec(record)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(document_path(dir, record.id))
        .map_err(|e| e.error)?;
    Ok(())
}

fn scan_summaries(dir: &Path) -> Result<Vec<AssessmentSummary>, StoreError> {
    let mut summaries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            continue;
        };
        match read_record(&path, id) {
            Ok(record) => summaries.push(record.summary()),
            // deleted between read_dir and read
            Err(StoreError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!("skipping unreadable assessment {}: {e}", path.display());
            }
        }
    }
    sort_summaries(&mut summaries);
    Ok(summaries)
}

#[async_trait]
impl AssessmentStore for JsonFileStore {
    fn name(&self) -> &str {
        "json"
    }

    async fn create_assessment(
        &self,
        meta: &AssessmentMeta,
        items: &[NewItem],
    ) -> Result<(AssessmentId, Vec<Item>), StoreError> {
        let id = Uuid::new_v4();
        let record = AssessmentRecord::new(id, meta, items)?;
        let items = record.items.clone();
        let _guard = self.writes.lock().await;
        self.write(record).await?;
        Ok((id, items))
    }

    async fn insert_students(
        &self,
        id: AssessmentId,
        students: &[ScoredStudent],
    ) -> Result<usize, StoreError> {
        self.update(id, |record| record.insert_students(students)).await
    }

    async fn load_assessment(&self, id: AssessmentId) -> Result<AssessmentData, StoreError> {
        Ok(self.read(id).await?.data())
    }

    async fn replace_statistics(
        &self,
        id: AssessmentId,
        statistics: &StatisticSet,
    ) -> Result<(), StoreError> {
        self.update(id, |record| {
            record.statistics = statistics.clone();
            Ok(())
        })
        .await
    }

    async fn load_statistics(&self, id: AssessmentId) -> Result<StatisticSet, StoreError> {
        Ok(self.read(id).await?.statistics)
    }

    async fn list_assessments(&self) -> Result<Vec<AssessmentSummary>, StoreError> {
        let dir = self.dir.clone();
        blocking(move || scan_summaries(&dir)).await
    }

    async fn delete_assessment(&self, id: AssessmentId) -> Result<(), StoreError> {
        let _guard = self.writes.lock().await;
        let path = self.path_of(id);
        blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(e) => Err(e.into()),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use itemstat_core::model::{StatType, StatisticRecord};

    use super::*;
    use crate::record::tests::{new_items, student};

    #[tokio::test]
    async fn documents_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = JsonFileStore::open(dir.path()).unwrap();
            let (id, _) = store
                .create_assessment(&AssessmentMeta::new("Grade 6"), &new_items())
                .await
                .unwrap();
            store
                .insert_students(id, &[student("S1", "GRD", "A", 1.0)])
                .await
                .unwrap();
            id
        };

        let store = JsonFileStore::open(dir.path()).unwrap();
        let data = store.load_assessment(id).await.unwrap();
        assert_eq!(data.students.len(), 1);
        assert_eq!(data.items[1].code, "Q2");
        assert_eq!(store.list_assessments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replace_statistics_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let (id, _) = store
            .create_assessment(&AssessmentMeta::new("t"), &new_items())
            .await
            .unwrap();

        let set = StatisticSet {
            statistics: vec![StatisticRecord {
                assessment_id: id,
                item_id: Some(1),
                stat_type: StatType::Difficulty,
                value: 0.42,
            }],
            dif: vec![],
        };
        store.replace_statistics(id, &set).await.unwrap();
        assert_eq!(store.load_statistics(id).await.unwrap(), set);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn stray_files_are_ignored_in_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("not-a-uuid.json"), "{}").unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.list_assessments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let (id, _) = store
            .create_assessment(&AssessmentMeta::new("t"), &new_items())
            .await
            .unwrap();
        store.delete_assessment(id).await.unwrap();
        assert!(matches!(
            store.load_assessment(id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_assessment(id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_inserts_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::open(dir.path()).unwrap());
        let (id, _) = store
            .create_assessment(&AssessmentMeta::new("t"), &new_items())
            .await
            .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_students(id, &[student(&format!("S{i}"), "GRD", "A", 1.0)])
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }

        let data = store.load_assessment(id).await.unwrap();
        assert_eq!(data.students.len(), 8);
    }
}
