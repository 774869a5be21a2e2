//! Error types for parsing, persistence, and ingestion.
//!
//! `StoreError` is defined here rather than in `itemstat-store` so the
//! ingestion pipeline can classify failures for retry decisions without
//! depending on a concrete backend.

use thiserror::Error;
use uuid::Uuid;

/// Structural problems that prevent a response file from becoming a
/// response matrix. Always terminal: the caller must fix the file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// The grid is too short to hold a key row, a header row and data.
    #[error("file must have at least {min} rows (key row, header row and data), found {found}")]
    TooFewRows { min: usize, found: usize },

    /// No "KEY" cell in the scanned corner of the grid.
    #[error(
        "answer key row not found: expected \"KEY\" in one of the first {cols} columns of the first {rows} rows"
    )]
    KeyRowNotFound { rows: usize, cols: usize },

    /// The key row is the last row of the grid.
    #[error("header row not found after KEY row (row {key_row})")]
    HeaderRowMissing { key_row: usize },

    /// The header row exists but lacks required columns.
    #[error("header row {row} is malformed: {}", problems.join("; "))]
    MalformedHeader { row: usize, problems: Vec<String> },
}

impl FormatError {
    /// Human-readable validation messages, one per problem.
    pub fn messages(&self) -> Vec<String> {
        match self {
            FormatError::MalformedHeader { row, problems } => problems
                .iter()
                .map(|p| format!("header row {row}: {p}"))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Errors raised by an `AssessmentStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The assessment does not exist.
    #[error("assessment not found: {0}")]
    NotFound(Uuid),

    /// The write conflicts with existing data and will not succeed on retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend is temporarily unreachable or busy.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An I/O failure in a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::Conflict(_) | StoreError::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Errors from the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file could not be turned into a response matrix.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The file parsed but contained no students with an ID.
    #[error("no student rows with an ID were found")]
    NoStudents,

    /// The store failed (after retries, if the failure was transient).
    #[error("store failure during {operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// Malformed input will not fix itself; only transient store failures
    /// are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Format(_) | IngestError::NoStudents => false,
            IngestError::Store { source, .. } => !source.is_permanent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_header_lists_every_problem() {
        let err = FormatError::MalformedHeader {
            row: 3,
            problems: vec!["missing ID column".into(), "no item columns".into()],
        };
        assert_eq!(
            err.to_string(),
            "header row 3 is malformed: missing ID column; no item columns"
        );
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn store_error_classification() {
        assert!(StoreError::NotFound(Uuid::nil()).is_permanent());
        assert!(!StoreError::Unavailable("busy".into()).is_permanent());
        assert!(!StoreError::Io(std::io::Error::other("disk")).is_permanent());
    }

    #[test]
    fn format_errors_are_terminal() {
        let err = IngestError::from(FormatError::KeyRowNotFound { rows: 10, cols: 5 });
        assert!(!err.is_retryable());

        let err = IngestError::Store {
            operation: "insert_students",
            source: StoreError::Unavailable("timeout".into()),
        };
        assert!(err.is_retryable());
    }
}
