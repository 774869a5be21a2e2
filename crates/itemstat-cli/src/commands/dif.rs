//! The `itemstat dif` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;

use itemstat_core::model::DifType;

use super::open_pipeline;
use crate::render::print_dif;

pub async fn execute(
    assessment: Uuid,
    by: DifType,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, pipeline) = open_pipeline(config_path.as_deref())?;
    let records = pipeline
        .dif(assessment, by)
        .await
        .with_context(|| format!("failed to compute {by} DIF for assessment {assessment}"))?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        "text" => {
            if records.is_empty() {
                println!("No {by} DIF records: groups are too small or missing.");
            } else {
                print_dif(&records);
            }
        }
        other => anyhow::bail!("unknown format '{other}', expected text or json"),
    }

    Ok(())
}
