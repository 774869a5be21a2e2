//! The `itemstat analyze` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;

use itemstat_core::analysis::analyze;
use itemstat_core::engine::score_parsed;
use itemstat_core::matrix::ResponseMatrix;
use itemstat_core::model::AssessmentMeta;
use itemstat_core::parser::parse_file;
use itemstat_core::report::AnalysisReport;
use itemstat_store::config::load_config_from;

use super::{file_stem, open_pipeline};
use crate::render::print_report;

pub async fn execute(
    assessment: Option<Uuid>,
    file: Option<PathBuf>,
    format: String,
    output: Option<PathBuf>,
    save: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, report, stem) = match (assessment, file) {
        (Some(id), _) => {
            let (config, pipeline) = open_pipeline(config_path.as_deref())?;
            let data = pipeline
                .store()
                .load_assessment(id)
                .await
                .with_context(|| format!("failed to load assessment {id}"))?;
            let matrix = ResponseMatrix::from_assessment(&data);
            let analysis = analyze(&matrix, &config.dif);
            let report = AnalysisReport::new(&data.meta, &matrix, analysis);
            (config, report, id.to_string())
        }
        (None, Some(path)) => {
            let config = load_config_from(config_path.as_deref())?;
            let parsed = parse_file(&path)?;
            anyhow::ensure!(
                !parsed.students.is_empty(),
                "no student rows with an ID were found in {}",
                path.display()
            );
            for w in &parsed.warnings {
                tracing::warn!("{}: {w}", path.display());
            }
            let (scored, _) = score_parsed(&parsed);
            let matrix = ResponseMatrix::from_scored(&parsed, &scored);
            let analysis = analyze(&matrix, &config.dif);
            let stem = file_stem(&path);
            let report = AnalysisReport::new(&AssessmentMeta::new(stem.clone()), &matrix, analysis);
            (config, report, stem)
        }
        (None, None) => anyhow::bail!("either --assessment or --file is required"),
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_report(&report),
        other => anyhow::bail!("unknown format '{other}', expected text or json"),
    }

    // --save writes into the configured output directory
    let output =
        output.or_else(|| save.then(|| config.store.output_dir.join(format!("{stem}.json"))));
    if let Some(path) = output {
        report.save_json(&path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}
