//! itemstat-core: response-file parsing, scoring, and classical item statistics.
//!
//! This crate defines the data model, the response-file parser and scorer,
//! the statistics engine (descriptive, item analysis, reliability,
//! performance levels, DIF), and the ingestion pipeline that the rest of
//! itemstat builds on.

pub mod analysis;
pub mod breakdown;
pub mod descriptive;
pub mod dif;
pub mod engine;
pub mod error;
pub mod grid;
pub mod item_analysis;
pub mod matrix;
pub mod model;
pub mod parser;
pub mod performance;
pub mod reliability;
pub mod report;
pub mod scoring;
pub mod traits;

pub use analysis::{analyze, AssessmentAnalysis};
pub use dif::DifPolicy;
pub use error::{FormatError, IngestError, StoreError};
pub use grid::Grid;
pub use matrix::ResponseMatrix;
pub use traits::AssessmentStore;
