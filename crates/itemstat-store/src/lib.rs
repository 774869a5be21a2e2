//! itemstat-store: assessment storage backends.
//!
//! Implements the `AssessmentStore` trait in memory and as a directory of
//! JSON documents, and loads the `itemstat.toml` configuration that picks
//! a backend and tunes the ingestion pipeline.

pub mod config;
pub mod json_file;
pub mod memory;
pub mod mock;
mod record;

pub use config::{create_store, load_config_from, ItemstatConfig, StoreKind};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
