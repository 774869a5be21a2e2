//! Response-file parser.
//!
//! Turns a decoded grid into items, an answer key and student records with
//! raw responses. The expected layout is a "KEY" row holding the answer key
//! above a header row (ID, Name, Sex, Q1, Q2, ...), followed by one row per
//! student.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::grid::Grid;
use crate::model::{Demographics, ItemMetadata, NewItem};

/// Rows scanned for the "KEY" marker.
pub const KEY_SCAN_ROWS: usize = 10;
/// Columns scanned for the "KEY" marker.
pub const KEY_SCAN_COLS: usize = 5;
/// Smallest grid that can hold a key row, a header row and data.
pub const MIN_ROWS: usize = 5;

/// Item columns: `Q12`, `Q3a`, in any case.
static ITEM_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Q\d+[a-z]?$").expect("valid item header regex"));
/// A valid header row needs at least one canonical item column.
static CANONICAL_ITEM_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Q\d+[a-z]?$").expect("valid canonical header regex"));
static LETTER_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[A-Z]$").expect("valid letter key regex"));
static POINTS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("valid points key regex"));

/// A student row with raw (trimmed, upper-cased) responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStudent {
    pub student_id: String,
    #[serde(flatten)]
    pub demographics: Demographics,
    /// Item code → raw response ("" when blank).
    pub responses: HashMap<String, String>,
}

/// Aggregate facts about a parsed file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseSummary {
    pub key_row: usize,
    pub header_row: usize,
    pub total_students: usize,
    pub total_items: usize,
    pub mc_count: usize,
    pub cr_count: usize,
    pub total_points: f64,
    /// True when any item is worth more than one point.
    pub is_weighted: bool,
    /// Responses containing a space, i.e. more than one selection.
    pub multiple_response_count: usize,
    /// Student rows discarded as repeats of an earlier (ID, country) pair.
    pub duplicate_students: usize,
}

/// A non-fatal issue found while parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// A header repeated an earlier item code and was renamed.
    DuplicateItemCode {
        header: String,
        column: usize,
        renamed_to: String,
    },
    /// An item column has a blank or unusable key cell and was not scored.
    MissingAnswerKey {
        header: String,
        column: usize,
        key_cell: String,
    },
    /// Later rows repeating a (student ID, country) pair were discarded.
    DuplicateStudent {
        student_id: String,
        country: Option<String>,
        discarded: usize,
    },
    /// Responses with more than one selection; they score zero.
    MultipleResponses { count: usize },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::DuplicateItemCode {
                header,
                column,
                renamed_to,
            } => write!(
                f,
                "duplicate item code \"{header}\" in column {column}, renamed to \"{renamed_to}\""
            ),
            ParseWarning::MissingAnswerKey {
                header,
                column,
                key_cell,
            } => write!(
                f,
                "item \"{header}\" in column {column} has no usable answer key (\"{key_cell}\") and was skipped"
            ),
            ParseWarning::DuplicateStudent {
                student_id,
                country,
                discarded,
            } => write!(
                f,
                "student {} ({}) appears {} more time(s); kept the first occurrence",
                student_id,
                country.as_deref().unwrap_or("no country"),
                discarded
            ),
            ParseWarning::MultipleResponses { count } => write!(
                f,
                "{count} response(s) contain multiple answers (e.g. \"A C\") and are scored incorrect"
            ),
        }
    }
}

/// The result of parsing a response file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Item codes in column order.
    pub items: Vec<String>,
    pub item_metadata: HashMap<String, ItemMetadata>,
    /// Item code → key letter, multiple-choice items only.
    pub answer_key: HashMap<String, String>,
    pub students: Vec<ParsedStudent>,
    pub summary: ParseSummary,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedFile {
    /// Items in column order with their metadata.
    pub fn ordered_items(&self) -> impl Iterator<Item = (&str, &ItemMetadata)> {
        self.items.iter().filter_map(|code| {
            self.item_metadata
                .get(code)
                .map(|meta| (code.as_str(), meta))
        })
    }

    /// Items ready to hand to a store.
    pub fn new_items(&self) -> Vec<NewItem> {
        self.ordered_items()
            .map(|(code, metadata)| NewItem {
                code: code.to_string(),
                metadata: metadata.clone(),
                content_domain: None,
            })
            .collect()
    }
}

/// Header positions resolved once per parse.
#[derive(Debug, Default)]
struct ColumnIndex {
    id: Option<usize>,
    name: Option<usize>,
    country: Option<usize>,
    sex: Option<usize>,
    school: Option<usize>,
    school_type: Option<usize>,
    district: Option<usize>,
}

impl ColumnIndex {
    fn resolve(grid: &Grid, header_row: usize) -> Self {
        let mut index = ColumnIndex::default();
        for col in 0..grid.row_len(header_row) {
            let slot = match grid.trimmed(header_row, col) {
                "ID" => &mut index.id,
                "Name" => &mut index.name,
                "Country" => &mut index.country,
                "Sex" => &mut index.sex,
                "School" => &mut index.school,
                "School_Type" | "School Type" => &mut index.school_type,
                "District" => &mut index.district,
                _ => continue,
            };
            // First matching column wins.
            slot.get_or_insert(col);
        }
        index
    }
}

/// One scoreable item column.
struct ItemColumn {
    column: usize,
    code: String,
}

/// Read and parse a CSV response file.
pub fn parse_file(path: &Path) -> Result<ParsedFile> {
    let grid = Grid::from_csv_path(path)?;
    Ok(parse_grid(&grid)?)
}

/// Parse a decoded grid.
pub fn parse_grid(grid: &Grid) -> Result<ParsedFile, FormatError> {
    if grid.row_count() < MIN_ROWS {
        return Err(FormatError::TooFewRows {
            min: MIN_ROWS,
            found: grid.row_count(),
        });
    }

    let key_row = find_key_row(grid).ok_or(FormatError::KeyRowNotFound {
        rows: KEY_SCAN_ROWS,
        cols: KEY_SCAN_COLS,
    })?;
    let header_row = key_row + 1;
    if header_row >= grid.row_count() || grid.is_blank_row(header_row) {
        return Err(FormatError::HeaderRowMissing { key_row });
    }

    let columns = ColumnIndex::resolve(grid, header_row);
    let has_item_header =
        (0..grid.row_len(header_row)).any(|c| {
            CANONICAL_ITEM_HEADER.is_match(grid.trimmed(header_row, c))
        });

    let mut problems = Vec::new();
    if columns.id.is_none() {
        problems.push("ID column not found".to_string());
    }
    if !has_item_header {
        problems.push("no item columns (Q1, Q2, ...) found".to_string());
    }
    let id_col = match columns.id {
        Some(col) if problems.is_empty() => col,
        _ => {
            return Err(FormatError::MalformedHeader {
                row: header_row,
                problems,
            })
        }
    };

    let mut warnings = Vec::new();
    let (item_columns, item_metadata) = read_items(grid, key_row, header_row, &mut warnings);

    let answer_key: HashMap<String, String> = item_metadata
        .iter()
        .filter_map(|(code, meta)| meta.correct_answer.clone().map(|k| (code.clone(), k)))
        .collect();

    let mut students = Vec::new();
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    let mut duplicate_order: Vec<(String, Option<String>)> = Vec::new();
    let mut multiple_response_count = 0usize;

    for row in (header_row + 1)..grid.row_count() {
        let student_id = grid.trimmed(row, id_col);
        if student_id.is_empty() {
            continue;
        }

        let demographics = read_demographics(grid, row, &columns);
        let dedup_key = (
            student_id.to_string(),
            demographics.country.clone().unwrap_or_default(),
        );
        if let Some(discarded) = seen.get_mut(&dedup_key) {
            if *discarded == 0 {
                duplicate_order.push((student_id.to_string(), demographics.country.clone()));
            }
            *discarded += 1;
            continue;
        }
        seen.insert(dedup_key, 0);

        let responses: HashMap<String, String> = item_columns
            .iter()
            .map(|ic| {
                let value = grid.trimmed(row, ic.column).to_uppercase();
                if value.contains(' ') {
                    multiple_response_count += 1;
                }
                (ic.code.clone(), value)
            })
            .collect();

        students.push(ParsedStudent {
            student_id: student_id.to_string(),
            demographics,
            responses,
        });
    }

    let mut duplicate_students = 0;
    for (student_id, country) in duplicate_order {
        let key = (student_id.clone(), country.clone().unwrap_or_default());
        let discarded = seen.get(&key).copied().unwrap_or_default();
        duplicate_students += discarded;
        tracing::warn!(
            "duplicate student {student_id} ({}) discarded {discarded} time(s)",
            country.as_deref().unwrap_or("no country")
        );
        warnings.push(ParseWarning::DuplicateStudent {
            student_id,
            country,
            discarded,
        });
    }

    if multiple_response_count > 0 {
        tracing::warn!("found {multiple_response_count} responses with multiple answers");
        warnings.push(ParseWarning::MultipleResponses {
            count: multiple_response_count,
        });
    }

    let items: Vec<String> = item_columns.into_iter().map(|ic| ic.code).collect();
    let mc_count = item_metadata
        .values()
        .filter(|m| m.is_multiple_choice())
        .count();
    let cr_count = item_metadata.len() - mc_count;
    let total_points = items
        .iter()
        .filter_map(|code| item_metadata.get(code))
        .map(|m| m.max_points)
        .sum();

    let summary = ParseSummary {
        key_row,
        header_row,
        total_students: students.len(),
        total_items: items.len(),
        mc_count,
        cr_count,
        total_points,
        is_weighted: cr_count > 0,
        multiple_response_count,
        duplicate_students,
    };

    tracing::info!(
        "parsed {} students, {} items ({} MC, {} CR, {} points)",
        summary.total_students,
        summary.total_items,
        summary.mc_count,
        summary.cr_count,
        summary.total_points
    );

    Ok(ParsedFile {
        items,
        item_metadata,
        answer_key,
        students,
        summary,
        warnings,
    })
}

fn find_key_row(grid: &Grid) -> Option<usize> {
    (0..grid.row_count().min(KEY_SCAN_ROWS)).find(|&row| {
        (0..grid.row_len(row).min(KEY_SCAN_COLS))
            .any(|col| grid.trimmed(row, col).to_uppercase() == "KEY")
    })
}

fn read_items(
    grid: &Grid,
    key_row: usize,
    header_row: usize,
    warnings: &mut Vec<ParseWarning>,
) -> (Vec<ItemColumn>, HashMap<String, ItemMetadata>) {
    let mut columns = Vec::new();
    let mut metadata = HashMap::new();
    let mut seen_codes: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();

    for col in 0..grid.row_len(header_row) {
        let header = grid.trimmed(header_row, col);
        if !ITEM_HEADER.is_match(header) {
            continue;
        }

        let key_cell = grid.trimmed(key_row, col);
        let Some(meta) = item_metadata_from_key(key_cell) else {
            tracing::warn!("item {header} in column {col} has no usable key: {key_cell:?}");
            warnings.push(ParseWarning::MissingAnswerKey {
                header: header.to_string(),
                column: col,
                key_cell: key_cell.to_string(),
            });
            continue;
        };

        let occurrences = seen_codes.entry(header.to_string()).or_insert(0);
        *occurrences += 1;
        let mut code = header.to_string();
        if *occurrences > 1 {
            let mut suffix = *occurrences;
            code = format!("{header}_{suffix}");
            // A literal "Q1_2" header cannot match the item pattern, but keep
            // generated codes unique regardless.
            while taken.contains(&code) {
                suffix += 1;
                code = format!("{header}_{suffix}");
            }
            tracing::warn!("duplicate item code {header} in column {col}, renamed to {code}");
            warnings.push(ParseWarning::DuplicateItemCode {
                header: header.to_string(),
                column: col,
                renamed_to: code.clone(),
            });
        }
        taken.insert(code.clone());
        metadata.insert(code.clone(), meta);
        columns.push(ItemColumn { column: col, code });
    }

    (columns, metadata)
}

/// Interpret an answer-key cell: a letter is a multiple-choice key, a
/// positive number is the maximum points of a constructed-response item.
fn item_metadata_from_key(key_cell: &str) -> Option<ItemMetadata> {
    if LETTER_KEY.is_match(key_cell) {
        return Some(ItemMetadata::multiple_choice(key_cell));
    }
    if POINTS_KEY.is_match(key_cell) {
        let max_points: f64 = key_cell.parse().ok()?;
        if max_points > 0.0 {
            return Some(ItemMetadata::constructed_response(max_points));
        }
    }
    None
}

fn read_demographics(grid: &Grid, row: usize, columns: &ColumnIndex) -> Demographics {
    let text = |col: Option<usize>| -> Option<String> {
        col.map(|c| grid.trimmed(row, c))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let name = text(columns.name);
    // Older files carried the country code in the Name column.
    let country = text(columns.country).or_else(|| name.clone());
    let gender = text(columns.sex).map(|g| g.to_uppercase());

    Demographics {
        name,
        country,
        gender,
        school: text(columns.school),
        school_type: text(columns.school_type),
        district: text(columns.district),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemType;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(rows.iter().map(|r| r.to_vec()))
    }

    fn sample() -> Grid {
        grid(&[
            &["Grade 6 Mathematics"],
            &[""],
            &["", "", "KEY", "B", "C", "2", ""],
            &["ID", "Name", "Sex", "Q1", "Q2", "Q3", "Q4"],
            &["S1", "GRD", "m", "b", "a", "2", "A"],
            &["S2", "GRD", "F", "B", "a c", "1.5", ""],
            &["", "GRD", "F", "B", "C", "2", ""],
            &["S3", "LCA", "", " c ", "C", "x", ""],
        ])
    }

    #[test]
    fn parses_items_and_students() {
        let parsed = parse_grid(&sample()).unwrap();

        assert_eq!(parsed.items, vec!["Q1", "Q2", "Q3"]);
        assert_eq!(parsed.summary.key_row, 2);
        assert_eq!(parsed.summary.header_row, 3);
        assert_eq!(parsed.summary.mc_count, 2);
        assert_eq!(parsed.summary.cr_count, 1);
        assert_eq!(parsed.summary.total_points, 4.0);
        assert!(parsed.summary.is_weighted);

        let q3 = &parsed.item_metadata["Q3"];
        assert_eq!(q3.item_type, ItemType::ConstructedResponse);
        assert_eq!(q3.max_points, 2.0);
        assert!(q3.correct_answer.is_none());
        assert_eq!(parsed.answer_key.get("Q1").map(String::as_str), Some("B"));
        assert!(!parsed.answer_key.contains_key("Q3"));

        // blank ID row is skipped
        assert_eq!(parsed.students.len(), 3);
        let s1 = &parsed.students[0];
        assert_eq!(s1.responses["Q1"], "B");
        assert_eq!(s1.demographics.gender.as_deref(), Some("M"));
        // legacy format: country comes from Name
        assert_eq!(s1.demographics.country.as_deref(), Some("GRD"));

        let s3 = &parsed.students[2];
        assert_eq!(s3.responses["Q1"], "C");
        assert!(s3.demographics.gender.is_none());
    }

    #[test]
    fn blank_key_cell_excludes_item_with_warning() {
        let parsed = parse_grid(&sample()).unwrap();
        assert!(!parsed.items.contains(&"Q4".to_string()));
        assert!(parsed
            .warnings
            .iter()
            .any(|w| matches!(w, ParseWarning::MissingAnswerKey { header, .. } if header == "Q4")));
    }

    #[test]
    fn lowercase_item_headers_alone_are_malformed() {
        let g = grid(&[
            &["KEY", "A", "B"],
            &["ID", "q1", "q2"],
            &["S1", "A", "B"],
            &["S2", "B", "B"],
            &["S3", "C", "A"],
        ]);
        assert!(matches!(
            parse_grid(&g),
            Err(FormatError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn item_columns_match_in_any_case_once_header_is_valid() {
        let g = grid(&[
            &["KEY", "A", "B", "C"],
            &["ID", "Q1", "q2", "Q3a"],
            &["S1", "A", "B", "C"],
            &["S2", "B", "B", "C"],
            &["S3", "C", "A", "C"],
        ]);
        let parsed = parse_grid(&g).unwrap();
        assert_eq!(parsed.items, vec!["Q1", "q2", "Q3a"]);
    }

    #[test]
    fn counts_multiple_responses() {
        let parsed = parse_grid(&sample()).unwrap();
        assert_eq!(parsed.summary.multiple_response_count, 1);
        assert!(parsed
            .warnings
            .contains(&ParseWarning::MultipleResponses { count: 1 }));
    }

    #[test]
    fn missing_key_row_is_format_error() {
        let g = grid(&[
            &["ID", "Q1"],
            &["S1", "A"],
            &["S2", "B"],
            &["S3", "C"],
            &["S4", "D"],
        ]);
        assert_eq!(
            parse_grid(&g).unwrap_err(),
            FormatError::KeyRowNotFound { rows: 10, cols: 5 }
        );
    }

    #[test]
    fn key_beyond_scan_window_is_not_found() {
        let mut rows: Vec<Vec<&str>> = vec![vec!["title"]; 10];
        rows.push(vec!["KEY", "A"]);
        rows.push(vec!["ID", "Q1"]);
        rows.push(vec!["S1", "A"]);
        let g = Grid::from_rows(rows);
        assert!(matches!(
            parse_grid(&g),
            Err(FormatError::KeyRowNotFound { .. })
        ));
    }

    #[test]
    fn key_in_sixth_column_is_not_found() {
        let g = grid(&[
            &["", "", "", "", "", "KEY", "A"],
            &["ID", "", "", "", "", "", "Q1"],
            &["S1", "", "", "", "", "", "A"],
            &["S2", "", "", "", "", "", "A"],
            &["S3", "", "", "", "", "", "A"],
        ]);
        assert!(matches!(
            parse_grid(&g),
            Err(FormatError::KeyRowNotFound { .. })
        ));
    }

    #[test]
    fn too_few_rows() {
        let g = grid(&[&["KEY", "A"], &["ID", "Q1"], &["S1", "A"]]);
        assert_eq!(
            parse_grid(&g).unwrap_err(),
            FormatError::TooFewRows { min: 5, found: 3 }
        );
    }

    #[test]
    fn header_problems_are_all_reported() {
        let g = grid(&[
            &["KEY", "A"],
            &["Student", "Item1"],
            &["S1", "A"],
            &["S2", "A"],
            &["S3", "A"],
        ]);
        match parse_grid(&g).unwrap_err() {
            FormatError::MalformedHeader { row, problems } => {
                assert_eq!(row, 1);
                assert_eq!(problems.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn header_row_missing_after_key() {
        let g = grid(&[&["x"], &["x"], &["x"], &["x"], &["KEY", "A"]]);
        assert_eq!(
            parse_grid(&g).unwrap_err(),
            FormatError::HeaderRowMissing { key_row: 4 }
        );
    }

    #[test]
    fn duplicate_headers_are_renamed() {
        let g = grid(&[
            &["KEY", "", "A", "B", "C"],
            &["ID", "Sex", "Q1", "Q1", "Q1a"],
            &["S1", "F", "A", "B", "C"],
            &["S2", "M", "A", "A", "C"],
            &["S3", "M", "B", "B", "D"],
        ]);
        let parsed = parse_grid(&g).unwrap();
        assert_eq!(parsed.items, vec!["Q1", "Q1_2", "Q1a"]);
        assert_eq!(parsed.answer_key["Q1_2"], "B");
        assert_eq!(parsed.students[0].responses["Q1_2"], "B");
        assert!(parsed.warnings.iter().any(|w| matches!(
            w,
            ParseWarning::DuplicateItemCode { renamed_to, column: 3, .. } if renamed_to == "Q1_2"
        )));
    }

    #[test]
    fn duplicate_students_keep_first_occurrence() {
        let g = grid(&[
            &["KEY", "", "A"],
            &["ID", "Country", "Q1"],
            &["S1", "GRD", "A"],
            &["S1", "GRD", "B"],
            &["S1", "LCA", "C"],
            &["S1", "GRD", "D"],
            &["S2", "GRD", "A"],
        ]);
        let parsed = parse_grid(&g).unwrap();
        assert_eq!(parsed.students.len(), 3);
        assert_eq!(parsed.students[0].responses["Q1"], "A");
        assert_eq!(parsed.summary.duplicate_students, 2);
        assert_eq!(
            parsed.warnings,
            vec![ParseWarning::DuplicateStudent {
                student_id: "S1".into(),
                country: Some("GRD".into()),
                discarded: 2,
            }]
        );
    }

    #[test]
    fn country_column_preferred_over_name() {
        let g = grid(&[
            &["KEY", "", "", "A"],
            &["ID", "Name", "Country", "Q1"],
            &["S1", "Jo", "DMA", "A"],
            &["S2", "Al", "", "A"],
            &["S3", "", "", "A"],
        ]);
        let parsed = parse_grid(&g).unwrap();
        assert_eq!(parsed.students[0].demographics.country.as_deref(), Some("DMA"));
        assert_eq!(parsed.students[1].demographics.country.as_deref(), Some("Al"));
        assert!(parsed.students[2].demographics.country.is_none());
    }

    #[test]
    fn zero_point_key_is_not_an_item() {
        let g = grid(&[
            &["KEY", "0", "3"],
            &["ID", "Q1", "Q2"],
            &["S1", "0", "3"],
            &["S2", "0", "1"],
            &["S3", "0", "2"],
        ]);
        let parsed = parse_grid(&g).unwrap();
        assert_eq!(parsed.items, vec!["Q2"]);
    }

    #[test]
    fn parse_file_reads_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.csv");
        std::fs::write(
            &path,
            "Title\n,KEY,A,2\nID,Sex,Q1,Q2\nS1,F,A,2\nS2,M,B,1\n",
        )
        .unwrap();
        let parsed = parse_file(&path).unwrap();
        assert_eq!(parsed.summary.total_students, 2);
        assert_eq!(parsed.new_items().len(), 2);
    }
}
