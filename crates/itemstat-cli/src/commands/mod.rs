//! Subcommand implementations.

pub mod analyze;
pub mod compare;
pub mod dif;
pub mod ingest;
pub mod init;
pub mod list;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use itemstat_core::engine::Pipeline;
use itemstat_store::config::{create_store, load_config_from, ItemstatConfig};

/// Load the configuration and open the configured store behind a pipeline.
pub fn open_pipeline(config_path: Option<&Path>) -> Result<(ItemstatConfig, Pipeline)> {
    let config = load_config_from(config_path)?;
    let store = create_store(&config.store)?;
    tracing::debug!("using {} store", store.name());
    let pipeline = Pipeline::new(Arc::clone(&store), config.pipeline_config());
    Ok((config, pipeline))
}

/// File name without extension, used as a default assessment name.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
