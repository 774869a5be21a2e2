//! The `itemstat ingest` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use itemstat_core::engine::{IngestOutcome, IngestRequest, ProgressReporter};
use itemstat_core::error::IngestError;
use itemstat_core::grid::Grid;
use itemstat_core::model::AssessmentMeta;

use super::{file_stem, open_pipeline};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_ingest_start(&self, name: &str) {
        eprintln!("  Starting: {name}");
    }

    fn on_chunk_stored(&self, name: &str, stored: usize, total: usize) {
        eprintln!("  {name}: stored {stored}/{total} students");
    }

    fn on_ingest_complete(&self, outcome: &IngestOutcome) {
        eprintln!(
            "  Done: {} [{}] {} students, {} statistics ({}ms)",
            outcome.name,
            outcome.assessment_id,
            outcome.students_inserted,
            outcome.statistics_written,
            outcome.duration_ms
        );
    }

    fn on_ingest_error(&self, name: &str, error: &IngestError) {
        eprintln!("  ERROR: {name}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} succeeded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    files: Vec<PathBuf>,
    name: Option<String>,
    year: Option<i32>,
    country: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        name.is_none() || files.len() == 1,
        "--name can only be used with a single --file"
    );

    let (_, pipeline) = open_pipeline(config_path.as_deref())?;

    let mut requests = Vec::with_capacity(files.len());
    for file in &files {
        let grid = Grid::from_csv_path(file)?;
        let mut meta = AssessmentMeta::new(name.clone().unwrap_or_else(|| file_stem(file)));
        meta.year = year;
        meta.country = country.clone();
        requests.push(IngestRequest { meta, grid });
    }

    eprintln!(
        "itemstat v{}: ingesting {} file(s) into the {} store",
        env!("CARGO_PKG_VERSION"),
        requests.len(),
        pipeline.store().name()
    );
    eprintln!();

    let results = pipeline.ingest_many(requests, &ConsoleReporter).await;

    let mut outcomes = Vec::new();
    let mut first_error = None;
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if first_error.is_none() => {
                first_error = Some(
                    anyhow::Error::new(e).context(format!("failed to ingest {}", file.display())),
                );
            }
            Err(_) => {}
        }
    }

    if !outcomes.is_empty() {
        print_summary(&outcomes);
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_summary(outcomes: &[IngestOutcome]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Assessment",
        "Id",
        "Students",
        "Items",
        "Alpha",
        "Mean",
        "Warnings",
    ]);

    for outcome in outcomes {
        let test = &outcome.analysis.test;
        table.add_row(vec![
            Cell::new(&outcome.name),
            Cell::new(outcome.assessment_id),
            Cell::new(outcome.students_inserted),
            Cell::new(outcome.summary.total_items),
            Cell::new(crate::render::fixed(test.reliability.cronbach_alpha, 3)),
            Cell::new(crate::render::fixed(
                test.descriptive.as_ref().map(|d| d.mean),
                2,
            )),
            Cell::new(outcome.warnings.len()),
        ]);
    }

    println!("{table}");
}
