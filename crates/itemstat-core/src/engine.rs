//! Ingestion pipeline orchestrator.
//!
//! Parses and scores a response file, persists it in bounded chunks,
//! and recomputes the assessment's statistics. Independent assessments run
//! concurrently; work on one assessment is serialized through
//! [`AssessmentLocks`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};

use crate::analysis::{analyze, AssessmentAnalysis};
use crate::dif::{self, DifPolicy};
use crate::error::{IngestError, StoreError};
use crate::grid::Grid;
use crate::matrix::ResponseMatrix;
use crate::model::{AssessmentId, AssessmentMeta, DifRecord, DifType, ScoredStudent};
use crate::parser::{parse_grid, ParseSummary, ParseWarning, ParsedFile};
use crate::scoring::{score_student, ScoringSummary};
use crate::traits::AssessmentStore;

/// Upper bound on the delay between two store retries.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Configuration for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum assessments ingested at once by `ingest_many`.
    pub parallelism: usize,
    /// Upper bound on responses per `insert_students` call.
    pub response_chunk_size: usize,
    /// Retries on transient store errors (not on bad input).
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub retry_delay: Duration,
    pub dif_policy: DifPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            response_chunk_size: 10_000,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            dif_policy: DifPolicy::default(),
        }
    }
}

/// Per-assessment locks shared by every pipeline that writes to one store.
#[derive(Debug, Clone, Default)]
pub struct AssessmentLocks {
    inner: Arc<Mutex<HashMap<AssessmentId, Arc<Mutex<()>>>>>,
}

impl AssessmentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one assessment.
    pub async fn lock(&self, id: AssessmentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut registry = self.inner.lock().await;
            Arc::clone(registry.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the entry of a deleted assessment.
    pub async fn forget(&self, id: AssessmentId) {
        self.inner.lock().await.remove(&id);
    }
}

/// A response file to ingest as a new assessment.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub meta: AssessmentMeta,
    pub grid: Grid,
}

/// What an ingestion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub assessment_id: AssessmentId,
    pub name: String,
    pub summary: ParseSummary,
    pub warnings: Vec<ParseWarning>,
    pub scoring: ScoringSummary,
    pub students_inserted: usize,
    pub statistics_written: usize,
    pub dif_written: usize,
    pub analysis: AssessmentAnalysis,
    pub duration_ms: u64,
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_ingest_start(&self, name: &str);
    fn on_chunk_stored(&self, name: &str, stored: usize, total: usize);
    fn on_ingest_complete(&self, outcome: &IngestOutcome);
    fn on_ingest_error(&self, name: &str, error: &IngestError);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_ingest_start(&self, _: &str) {}
    fn on_chunk_stored(&self, _: &str, _: usize, _: usize) {}
    fn on_ingest_complete(&self, _: &IngestOutcome) {}
    fn on_ingest_error(&self, _: &str, _: &IngestError) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Students per `insert_students` call so a chunk stays within
/// `response_chunk_size` responses. Always at least one.
pub fn students_per_chunk(response_chunk_size: usize, item_count: usize) -> usize {
    (response_chunk_size / item_count.max(1)).max(1)
}

/// Score every parsed student against the file's answer key.
pub fn score_parsed(parsed: &ParsedFile) -> (Vec<ScoredStudent>, ScoringSummary) {
    let mut scoring = ScoringSummary::default();
    let students = parsed
        .students
        .iter()
        .map(|student| {
            let (responses, total_score) =
                score_student(student, parsed.ordered_items(), &mut scoring);
            ScoredStudent {
                code: student.student_id.clone(),
                demographics: student.demographics.clone(),
                total_score,
                responses,
            }
        })
        .collect();
    (students, scoring)
}

/// The ingestion pipeline.
pub struct Pipeline {
    store: Arc<dyn AssessmentStore>,
    locks: AssessmentLocks,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(store: Arc<dyn AssessmentStore>, config: PipelineConfig) -> Self {
        Self::with_locks(store, config, AssessmentLocks::new())
    }

    /// Share a lock registry with other pipelines over the same store.
    pub fn with_locks(
        store: Arc<dyn AssessmentStore>,
        config: PipelineConfig,
        locks: AssessmentLocks,
    ) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn AssessmentStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingest one response file as a new assessment.
    ///
    /// Format errors fail immediately. Store errors are retried; if the
    /// ingestion still fails after the assessment was created, the partial
    /// assessment is deleted.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestOutcome, IngestError> {
        let start = Instant::now();
        let name = request.meta.name.clone();
        progress.on_ingest_start(&name);

        let parsed = parse_grid(&request.grid)?;
        if parsed.students.is_empty() {
            return Err(IngestError::NoStudents);
        }

        let (students, scoring) = score_parsed(&parsed);
        if scoring.unparsable_responses > 0 {
            tracing::warn!(
                "{name}: {} constructed responses were not numbers and scored zero",
                scoring.unparsable_responses
            );
        }

        let items = parsed.new_items();
        let (id, _) = self
            .with_retry("create_assessment", || {
                self.store.create_assessment(&request.meta, &items)
            })
            .await?;
        tracing::info!("{name}: created assessment {id} with {} items", items.len());

        let guard = self.locks.lock(id).await;
        let stored = self
            .store_and_analyze(id, &name, &students, items.len(), progress)
            .await;

        let (students_inserted, analysis, statistics_written, dif_written) = match stored {
            Ok(done) => done,
            Err(e) => {
                tracing::error!("{name}: ingestion failed, removing assessment {id}: {e}");
                if let Err(cleanup) = self.store.delete_assessment(id).await {
                    tracing::error!("{name}: failed to remove partial assessment {id}: {cleanup}");
                }
                self.locks.forget(id).await;
                return Err(e);
            }
        };
        drop(guard);

        let outcome = IngestOutcome {
            assessment_id: id,
            name,
            summary: parsed.summary,
            warnings: parsed.warnings,
            scoring,
            students_inserted,
            statistics_written,
            dif_written,
            analysis,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "{}: ingested {} students, {} statistics, {} DIF records in {}ms",
            outcome.name,
            outcome.students_inserted,
            outcome.statistics_written,
            outcome.dif_written,
            outcome.duration_ms
        );
        progress.on_ingest_complete(&outcome);
        Ok(outcome)
    }

    async fn store_and_analyze(
        &self,
        id: AssessmentId,
        name: &str,
        students: &[ScoredStudent],
        item_count: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<(usize, AssessmentAnalysis, usize, usize), IngestError> {
        let per_chunk = students_per_chunk(self.config.response_chunk_size, item_count);
        let mut inserted = 0usize;
        let mut stored = 0usize;
        for chunk in students.chunks(per_chunk) {
            inserted += self
                .with_retry("insert_students", || self.store.insert_students(id, chunk))
                .await?;
            stored += chunk.len();
            tracing::debug!("{name}: stored {stored}/{} students", students.len());
            progress.on_chunk_stored(name, stored, students.len());
        }

        let analysis = self.recompute_locked(id).await?;
        let set = analysis.statistic_set();
        Ok((inserted, analysis, set.statistics.len(), set.dif.len()))
    }

    /// Recompute and replace the statistics of an existing assessment.
    pub async fn recompute(&self, id: AssessmentId) -> Result<AssessmentAnalysis, IngestError> {
        let _guard = self.locks.lock(id).await;
        self.recompute_locked(id).await
    }

    async fn recompute_locked(&self, id: AssessmentId) -> Result<AssessmentAnalysis, IngestError> {
        let data = self
            .with_retry("load_assessment", || self.store.load_assessment(id))
            .await?;
        let matrix = ResponseMatrix::from_assessment(&data);
        let analysis = analyze(&matrix, &self.config.dif_policy);
        let set = analysis.statistic_set();
        self.with_retry("replace_statistics", || {
            self.store.replace_statistics(id, &set)
        })
        .await?;
        Ok(analysis)
    }

    /// Load an assessment and run one DIF comparison on demand. The result
    /// is returned, not stored.
    pub async fn dif(
        &self,
        id: AssessmentId,
        dif_type: DifType,
    ) -> Result<Vec<DifRecord>, IngestError> {
        let data = self
            .with_retry("load_assessment", || self.store.load_assessment(id))
            .await?;
        let matrix = ResponseMatrix::from_assessment(&data);
        Ok(dif::compute(&matrix, &self.config.dif_policy, dif_type))
    }

    /// Ingest several files concurrently, at most `parallelism` at a time.
    /// Results are returned in request order.
    pub async fn ingest_many(
        &self,
        requests: Vec<IngestRequest>,
        progress: &dyn ProgressReporter,
    ) -> Vec<Result<IngestOutcome, IngestError>> {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let total = requests.len();

        let mut futures = FuturesUnordered::new();
        for (index, request) in requests.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let name = request.meta.name.clone();
                // the semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                (index, name, self.ingest(request, progress).await)
            });
        }

        let mut results = Vec::with_capacity(total);
        let mut completed = 0usize;
        let mut failed = 0usize;
        while let Some((index, name, result)) = futures.next().await {
            match &result {
                Ok(_) => completed += 1,
                Err(e) => {
                    tracing::error!("ingestion failed for {name}: {e}");
                    progress.on_ingest_error(&name, e);
                    failed += 1;
                }
            }
            results.push((index, result));
        }

        progress.on_batch_complete(total, completed, failed, start.elapsed());
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Run a store call, retrying transient failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, IngestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut delay = self.config.retry_delay;
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(source) if source.is_permanent() || attempt >= self.config.max_retries => {
                    return Err(IngestError::Store { operation, source });
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        "{operation} failed ({e}), retry {attempt}/{} in {delay:?}",
                        self.config.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay);
                }
            }
        }
    }
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_bounds_responses() {
        assert_eq!(students_per_chunk(10_000, 40), 250);
        assert_eq!(students_per_chunk(10_000, 0), 10_000);
        // one student per chunk even if a single row exceeds the bound
        assert_eq!(students_per_chunk(10, 40), 1);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        assert_eq!(next_delay(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(next_delay(Duration::from_secs(45)), MAX_RETRY_DELAY);
    }

    #[test]
    fn scores_every_parsed_student() {
        let grid = Grid::from_rows([
            vec!["KEY", "", "C", "2"],
            vec!["ID", "Sex", "Q1", "Q2"],
            vec!["S1", "F", "C", "2"],
            vec!["S2", "M", "A", "7"],
            vec!["S3", "M", "", "?"],
        ]);
        let parsed = parse_grid(&grid).unwrap();
        let (students, scoring) = score_parsed(&parsed);
        let totals: Vec<f64> = students.iter().map(|s| s.total_score).collect();
        assert_eq!(totals, vec![3.0, 2.0, 0.0]);
        assert_eq!(scoring.unparsable_responses, 1);
        assert!(students
            .iter()
            .all(|s| s.total_score == s.responses.iter().map(|r| r.points_earned).sum::<f64>()));
    }

    #[tokio::test]
    async fn locks_serialize_one_assessment() {
        let locks = AssessmentLocks::new();
        let id = uuid::Uuid::new_v4();
        let guard = locks.lock(id).await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock(id).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // a different assessment is not blocked
        let _free = locks.lock(uuid::Uuid::new_v4()).await;

        drop(guard);
        waiter.await.unwrap();
    }
}
