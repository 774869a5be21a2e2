//! Store configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use itemstat_core::dif::DifPolicy;
use itemstat_core::engine::PipelineConfig;
use itemstat_core::traits::AssessmentStore;

use crate::json_file::JsonFileStore;
use crate::memory::MemoryStore;

/// Environment variable that overrides the JSON store directory.
pub const DATA_DIR_ENV: &str = "ITEMSTAT_DATA_DIR";

/// Which backend holds assessments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    #[default]
    Json,
}

/// The `[store]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(rename = "type", default)]
    pub kind: StoreKind,
    /// Directory of the JSON store.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Max retries on transient store errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Max concurrent ingestions.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Upper bound on responses per insert call.
    #[serde(default = "default_chunk_size")]
    pub response_chunk_size: usize,
    /// Where reports are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from("./itemstat-data")
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    500
}
fn default_parallelism() -> usize {
    4
}
fn default_chunk_size() -> usize {
    10_000
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./itemstat-results")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_path(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            parallelism: default_parallelism(),
            response_chunk_size: default_chunk_size(),
            output_dir: default_output_dir(),
        }
    }
}

/// Top-level itemstat configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemstatConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dif: DifPolicy,
}

impl ItemstatConfig {
    /// Pipeline settings derived from the `[store]` and `[dif]` tables.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            parallelism: self.store.parallelism.max(1),
            response_chunk_size: self.store.response_chunk_size.max(1),
            max_retries: self.store.max_retries,
            retry_delay: Duration::from_millis(self.store.retry_delay_ms),
            dif_policy: self.dif.clone(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied as-is and never rescanned.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `itemstat.toml` in the current directory
/// 2. `~/.config/itemstat/config.toml`
///
/// `ITEMSTAT_DATA_DIR` overrides the store path.
pub fn load_config_from(path: Option<&Path>) -> Result<ItemstatConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("itemstat.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<ItemstatConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => ItemstatConfig::default(),
    };

    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        config.store.path = PathBuf::from(dir);
    }
    config.store.path = resolve_path(&config.store.path);
    config.store.output_dir = resolve_path(&config.store.output_dir);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("itemstat"))
}

/// Create the configured store backend.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn AssessmentStore>> {
    match config.kind {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::Json => {
            let store = JsonFileStore::open(&config.path).with_context(|| {
                format!("failed to open JSON store at {}", config.path.display())
            })?;
            Ok(Arc::new(store))
        }
    }
}
