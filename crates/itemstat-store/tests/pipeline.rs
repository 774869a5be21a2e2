//! Ingestion pipeline against the real store backends.

use std::sync::Arc;
use std::time::Duration;

use itemstat_core::engine::{IngestRequest, NoopReporter, Pipeline, PipelineConfig};
use itemstat_core::error::IngestError;
use itemstat_core::grid::Grid;
use itemstat_core::model::{AssessmentMeta, DifType, StatType};
use itemstat_core::traits::AssessmentStore;
use itemstat_store::mock::{Failure, FlakyStore, Operation};
use itemstat_store::{JsonFileStore, MemoryStore};

const KEY: [&str; 5] = ["A", "B", "C", "D", "A"];

/// `n` students over five MC items and one CR item worth 3. Student `i`
/// answers the first `i % 6` MC items correctly, so totals spread out.
fn response_grid(n: usize) -> Grid {
    let mut rows: Vec<Vec<String>> = vec![
        vec!["Pipeline test".into()],
        vec!["".into(), "".into(), "KEY".into()],
        vec!["ID".into(), "Country".into(), "Sex".into()],
    ];
    for (i, key) in KEY.iter().enumerate() {
        rows[1].push((*key).into());
        rows[2].push(format!("Q{}", i + 1));
    }
    rows[1].push("3".into());
    rows[2].push("Q6".into());

    for s in 0..n {
        let country = if s % 2 == 0 { "GRD" } else { "LCA" };
        let sex = if s % 3 == 0 { "F" } else { "M" };
        let mut row = vec![format!("S{s:03}"), country.into(), sex.into()];
        let correct = s % 6;
        for (i, key) in KEY.iter().enumerate() {
            row.push(if i < correct { (*key).into() } else { "X".into() });
        }
        row.push((correct.min(3)).to_string());
        rows.push(row);
    }
    Grid::new(rows)
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        response_chunk_size: 60,
        retry_delay: Duration::from_millis(1),
        ..PipelineConfig::default()
    }
}

fn request(name: &str, grid: Grid) -> IngestRequest {
    IngestRequest {
        meta: AssessmentMeta::new(name),
        grid,
    }
}

#[tokio::test]
async fn ingest_stores_students_and_statistics() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(store.clone(), fast_config());

    let outcome = pipeline
        .ingest(request("Grade 6", response_grid(60)), &NoopReporter)
        .await
        .unwrap();

    assert_eq!(outcome.students_inserted, 60);
    assert_eq!(outcome.summary.total_items, 6);
    assert!(outcome.statistics_written > 0);

    let stats = store.load_statistics(outcome.assessment_id).await.unwrap();
    assert_eq!(stats.test_value(StatType::N), Some(60.0));
    assert!(stats.test_value(StatType::CronbachAlpha).is_some());
    assert_eq!(stats.statistics.len(), outcome.statistics_written);
    assert_eq!(stats.dif.len(), outcome.dif_written);
    // both genders have at least ten students
    assert!(stats.dif.iter().any(|d| d.dif_type == DifType::Gender));

    let listed = store.list_assessments().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].student_count, 60);
}

#[tokio::test]
async fn transient_insert_failures_are_retried() {
    let store = Arc::new(FlakyStore::new(Operation::InsertStudents, Failure::Transient, 2));
    let pipeline = Pipeline::new(store.clone(), fast_config());

    // 60 responses per chunk over 6 items: 10 students per call
    let outcome = pipeline
        .ingest(request("Flaky", response_grid(30)), &NoopReporter)
        .await
        .unwrap();

    assert_eq!(outcome.students_inserted, 30);
    assert_eq!(store.call_count(), 3 + 2);
}

#[tokio::test]
async fn exhausted_retries_remove_the_assessment() {
    let store = Arc::new(FlakyStore::new(Operation::InsertStudents, Failure::Transient, 100));
    let pipeline = Pipeline::new(store.clone(), fast_config());

    let err = pipeline
        .ingest(request("Down", response_grid(20)), &NoopReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Store { operation: "insert_students", .. }));
    assert!(err.is_retryable());
    // first attempt plus max_retries
    assert_eq!(store.call_count(), 1 + 3);
    assert!(store.inner().is_empty().await);
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    let store = Arc::new(FlakyStore::new(Operation::ReplaceStatistics, Failure::Permanent, 1));
    let pipeline = Pipeline::new(store.clone(), fast_config());

    let err = pipeline
        .ingest(request("Conflict", response_grid(20)), &NoopReporter)
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(store.call_count(), 1);
    assert!(store.inner().is_empty().await);
}

#[tokio::test]
async fn malformed_file_never_reaches_the_store() {
    let store = Arc::new(FlakyStore::new(Operation::CreateAssessment, Failure::Transient, 0));
    let pipeline = Pipeline::new(store.clone(), fast_config());

    let err = pipeline
        .ingest(request("No key", without_key(&response_grid(10))), &NoopReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Format(_)));
    assert_eq!(store.call_count(), 0);
}

/// Same grid with the KEY marker blanked out.
fn without_key(grid: &Grid) -> Grid {
    let rows: Vec<Vec<String>> = (0..grid.row_count())
        .map(|r| {
            grid.row(r)
                .unwrap_or_default()
                .iter()
                .map(|c| if c == "KEY" { String::new() } else { c.clone() })
                .collect::<Vec<String>>()
        })
        .collect();
    Grid::new(rows)
}

#[tokio::test]
async fn header_only_file_has_no_students() {
    let pipeline = Pipeline::new(Arc::new(MemoryStore::new()), fast_config());
    let header = response_grid(0);
    let mut rows: Vec<Vec<String>> = (0..3)
        .map(|r| header.row(r).unwrap_or_default().to_vec())
        .collect();
    // keep the minimum row count with ID-less rows
    rows.push(vec!["".into(), "GRD".into()]);
    rows.push(vec!["".into(), "LCA".into()]);

    let err = pipeline
        .ingest(request("Empty", Grid::new(rows)), &NoopReporter)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::NoStudents));
}

#[tokio::test]
async fn ingest_many_keeps_request_order() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(store.clone(), fast_config());

    let bad = Grid::from_rows(vec![vec!["only"], vec!["two rows"]]);
    let results = pipeline
        .ingest_many(
            vec![
                request("first", response_grid(25)),
                request("broken", bad),
                request("third", response_grid(12)),
            ],
            &NoopReporter,
        )
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().name, "first");
    assert!(matches!(results[1], Err(IngestError::Format(_))));
    assert_eq!(results[2].as_ref().unwrap().students_inserted, 12);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn json_store_roundtrip_and_recompute() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn AssessmentStore> = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let pipeline = Pipeline::new(store.clone(), fast_config());

    let outcome = pipeline
        .ingest(request("Persisted", response_grid(40)), &NoopReporter)
        .await
        .unwrap();
    let id = outcome.assessment_id;

    let reopened = JsonFileStore::open(dir.path()).unwrap();
    let before = reopened.load_statistics(id).await.unwrap();
    assert_eq!(before.test_value(StatType::N), Some(40.0));

    let analysis = pipeline.recompute(id).await.unwrap();
    assert_eq!(analysis.test.student_count, 40);
    let after = reopened.load_statistics(id).await.unwrap();
    assert_eq!(after.statistics.len(), before.statistics.len());

    let by_country = pipeline.dif(id, DifType::Country).await.unwrap();
    assert!(by_country.iter().all(|d| d.group_b == "ALL"));
    assert!(by_country.iter().any(|d| d.group_a == "GRD"));
}
