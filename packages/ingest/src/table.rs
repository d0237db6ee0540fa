//! Tab-delimited table access.
//!
//! Catalog editions name their columns differently. A `ColumnMap` maps the
//! logical fields the parsers need onto physical header names, and a
//! `FieldIndex` resolves those names against an actual header row once, so
//! records are always read through a typed accessor.

use std::collections::HashMap;

use crate::error::{IngestError, Result};

/// Logical fields of a catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Catalog-native identifier.
    Identifier,
    /// Entry title.
    Title,
    /// Family name.
    Family,
    /// Control text.
    Text,
    /// Discussion or supplemental guidance.
    Discussion,
    /// Comma-separated related identifiers.
    Related,
    /// Priority code.
    Priority,
    /// Comma-separated baseline impact levels.
    Impact,
}

impl Field {
    /// Whether every edition must provide this field.
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Identifier | Self::Title | Self::Text)
    }
}

/// Injectable mapping of logical fields to physical column names.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    columns: HashMap<Field, String>,
}

impl ColumnMap {
    /// Create an empty column map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a logical field to a physical column name.
    #[must_use]
    pub fn with(mut self, field: Field, column: impl Into<String>) -> Self {
        self.columns.insert(field, column.into());
        self
    }

    /// Get the physical column name for a field.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    /// Column names of the Revision 4 catalog table.
    #[must_use]
    pub fn rev4() -> Self {
        Self::new()
            .with(Field::Identifier, "NAME")
            .with(Field::Title, "TITLE")
            .with(Field::Family, "FAMILY")
            .with(Field::Text, "DESCRIPTION")
            .with(Field::Discussion, "SUPPLEMENTAL GUIDANCE")
            .with(Field::Related, "RELATED")
            .with(Field::Priority, "PRIORITY")
            .with(Field::Impact, "BASELINE-IMPACT")
    }

    /// Column names of the Revision 5 catalog table.
    #[must_use]
    pub fn rev5() -> Self {
        Self::new()
            .with(Field::Identifier, "Control Identifier")
            .with(Field::Title, "Control (or Control Enhancement) Name")
            .with(Field::Text, "Control (or Control Enhancement)")
            .with(Field::Discussion, "Discussion")
            .with(Field::Related, "Related Controls")
    }
}

/// Header lookup: physical column name to position.
#[derive(Debug, Clone)]
pub struct TableHeader {
    positions: HashMap<String, usize>,
}

impl TableHeader {
    /// Build from header cells.
    #[must_use]
    pub fn new<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let positions = cells
            .into_iter()
            .enumerate()
            .map(|(i, name)| (clean_cell(name).to_string(), i))
            .collect();
        Self { positions }
    }

    /// Position of a named column.
    #[must_use]
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// Resolve every mapped field of `map` against this header.
    ///
    /// Required fields missing from the header fail with `MissingColumn`;
    /// optional fields that are missing simply read as absent.
    pub fn resolve(&self, map: &ColumnMap, context: &str) -> Result<FieldIndex> {
        let mut index = HashMap::new();
        for (field, column) in &map.columns {
            match self.position(column) {
                Some(pos) => {
                    index.insert(*field, pos);
                }
                None if field.is_required() => {
                    return Err(IngestError::MissingColumn {
                        column: column.clone(),
                        context: context.to_string(),
                    });
                }
                None => {
                    tracing::debug!(column = %column, "Optional column not present");
                }
            }
        }
        Ok(FieldIndex { index })
    }
}

/// Field to column position table, built once per table.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    index: HashMap<Field, usize>,
}

impl FieldIndex {
    /// Read a field from a record.
    ///
    /// Returns `None` when the field is unmapped, absent from the row, or empty.
    #[must_use]
    pub fn get<'r>(&self, record: &[&'r str], field: Field) -> Option<&'r str> {
        let pos = *self.index.get(&field)?;
        record
            .get(pos)
            .map(|cell| clean_cell(cell))
            .filter(|cell| !cell.is_empty())
    }

    /// Read a field, yielding an empty string when absent.
    #[must_use]
    pub fn text<'r>(&self, record: &[&'r str], field: Field) -> &'r str {
        self.get(record, field).unwrap_or("")
    }

    /// Read a comma-separated list field.
    #[must_use]
    pub fn list(&self, record: &[&str], field: Field) -> Vec<String> {
        self.get(record, field)
            .map(split_list)
            .unwrap_or_default()
    }
}

/// Strip surrounding whitespace and quotation marks from a cell.
#[must_use]
pub fn clean_cell(cell: &str) -> &str {
    cell.trim().trim_matches('"').trim()
}

/// Split a comma-separated cell into trimmed, non-empty items.
///
/// # Examples
/// ```
/// use controlmap_ingest::table::split_list;
///
/// assert_eq!(split_list("AC-2, AC-3,AC-5"), vec!["AC-2", "AC-3", "AC-5"]);
/// assert!(split_list("").is_empty());
/// ```
#[must_use]
pub fn split_list(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// A tab-delimited table read fully into memory.
#[derive(Debug, Clone)]
pub struct Table {
    /// Header cells.
    pub header: Vec<String>,

    /// Data rows.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse tab-delimited text with a header row.
    ///
    /// Quoted cells may span multiple lines. Rows may have fewer cells than
    /// the header.
    pub fn parse_tsv(input: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .has_headers(true)
            .from_reader(input.as_bytes());

        let header = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self { header, rows })
    }

    /// Header lookup for this table.
    #[must_use]
    pub fn header(&self) -> TableHeader {
        TableHeader::new(self.header.iter().map(String::as_str))
    }

    /// Borrow row `i` as a slice of cells.
    #[must_use]
    pub fn row(&self, i: usize) -> Vec<&str> {
        self.rows
            .get(i)
            .map(|r| r.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_required_and_optional() {
        let header = TableHeader::new(["NAME", "TITLE", "DESCRIPTION"]);
        let index = header.resolve(&ColumnMap::rev4(), "controls").unwrap();

        let record = ["AC-1", "\"POLICY\"", ""];
        assert_eq!(index.get(&record, Field::Identifier), Some("AC-1"));
        assert_eq!(index.get(&record, Field::Title), Some("POLICY"));
        assert_eq!(index.get(&record, Field::Text), None);
        assert_eq!(index.get(&record, Field::Related), None);
    }

    #[test]
    fn test_resolve_missing_required() {
        let header = TableHeader::new(["NAME"]);
        let err = header.resolve(&ColumnMap::rev4(), "controls").unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { .. }));
    }

    #[test]
    fn test_short_record_reads_absent() {
        let header = TableHeader::new(["NAME", "TITLE", "DESCRIPTION", "RELATED"]);
        let index = header.resolve(&ColumnMap::rev4(), "controls").unwrap();
        let record = ["AC-1a."];
        assert_eq!(index.text(&record, Field::Text), "");
        assert!(index.list(&record, Field::Related).is_empty());
    }

    #[test]
    fn test_parse_tsv_multiline_quoted() {
        let input = "NAME\tDESCRIPTION\nAC-1\t\"line one\nline two\"\n\nAC-2\tplain\n";
        let table = Table::parse_tsv(input).unwrap();
        assert_eq!(table.header, vec!["NAME", "DESCRIPTION"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "line one\nline two");
        assert_eq!(table.row(1), vec!["AC-2", "plain"]);
    }

    #[test]
    fn test_clean_cell() {
        assert_eq!(clean_cell("  \"AC-1\" "), "AC-1");
        assert_eq!(clean_cell(""), "");
    }
}
