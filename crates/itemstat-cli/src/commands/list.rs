//! The `itemstat list` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use super::open_pipeline;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (_, pipeline) = open_pipeline(config_path.as_deref())?;
    let assessments = pipeline
        .store()
        .list_assessments()
        .await
        .context("failed to list assessments")?;

    if assessments.is_empty() {
        println!("No assessments stored.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Id", "Name", "Year", "Country", "Students", "Items", "Uploaded",
    ]);
    for a in &assessments {
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(&a.meta.name),
            Cell::new(a.meta.year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(a.meta.country.as_deref().unwrap_or("")),
            Cell::new(a.student_count),
            Cell::new(a.item_count),
            Cell::new(a.meta.uploaded_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    println!("{} assessment(s)", assessments.len());

    Ok(())
}
