//! Typed tabular grid produced by CSV or spreadsheet decoding.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// An ordered sequence of rows, each an ordered sequence of string cells.
///
/// Rows may have different lengths. Cells outside a row read as "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Build a grid from string slices (mostly for tests and fixtures).
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Decode CSV text. No header handling: every record becomes a row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("malformed CSV record {}", i + 1))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { rows })
    }

    /// Read and decode a CSV file.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open response file: {}", path.display()))?;
        Self::from_csv_reader(file)
            .with_context(|| format!("failed to decode CSV: {}", path.display()))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of cells in a row, 0 if the row does not exist.
    pub fn row_len(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, Vec::len)
    }

    /// The raw cell text, or "" when out of bounds.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map_or("", String::as_str)
    }

    /// The cell text with surrounding whitespace removed.
    pub fn trimmed(&self, row: usize, col: usize) -> &str {
        self.cell(row, col).trim()
    }

    pub fn row(&self, row: usize) -> Option<&[String]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// True if every cell of the row is blank (or the row is missing).
    pub fn is_blank_row(&self, row: usize) -> bool {
        self.row(row)
            .map_or(true, |cells| cells.iter().all(|c| c.trim().is_empty()))
    }
}
