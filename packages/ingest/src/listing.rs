//! Tabular listing of mappings.

use std::collections::HashMap;
use std::path::Path;

use crate::document::{Bundle, StixObject};
use crate::error::{IngestError, Result};

/// Column headers of a listing.
pub const LISTING_COLUMNS: [&str; 5] = [
    "Control ID",
    "Control Name",
    "Mapping Type",
    "Technique ID",
    "Technique Name",
];

/// One mapping resolved to human-readable ids and names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListingRow {
    pub control_id: String,
    pub control_name: String,
    pub mapping_type: String,
    pub technique_id: String,
    pub technique_name: String,
}

impl ListingRow {
    fn cells(&self) -> [&str; 5] {
        [
            self.control_id.as_str(),
            self.control_name.as_str(),
            self.mapping_type.as_str(),
            self.technique_id.as_str(),
            self.technique_name.as_str(),
        ]
    }
}

/// Output format of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    Tsv,
    Csv,
    Markdown,
}

impl ListingFormat {
    /// Choose a format from an output file's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "tsv" => Ok(Self::Tsv),
            "csv" => Ok(Self::Csv),
            "md" => Ok(Self::Markdown),
            _ => Err(IngestError::UnsupportedFormat(extension)),
        }
    }
}

/// Resolve every mapping's source and target.
///
/// Sources are looked up in `controls`, targets in `taxonomy`. A reference
/// to an object that exists in neither is an error. Rows are sorted by
/// control id, then technique id.
pub fn mapping_rows(
    mappings: &Bundle,
    controls: &Bundle,
    taxonomy: &[StixObject],
) -> Result<Vec<ListingRow>> {
    let objects: HashMap<&str, &StixObject> = taxonomy
        .iter()
        .chain(controls.objects.iter())
        .map(|o| (o.id(), o))
        .collect();
    let find = |id: Option<&str>, place: &str| {
        let id = id.unwrap_or_default();
        objects.get(id).copied().ok_or_else(|| {
            IngestError::InvalidDocument(format!("cannot find object with ID {id} in {place}"))
        })
    };

    let mut rows = Vec::new();
    for mapping in mappings.relationships() {
        let control = find(mapping.source_ref(), "controls bundle")?;
        let technique = find(mapping.target_ref(), "taxonomy dataset")?;
        rows.push(ListingRow {
            control_id: control.external_id().unwrap_or_default().to_string(),
            control_name: control.name().unwrap_or_default().to_string(),
            mapping_type: mapping.relationship_type().unwrap_or_default().to_string(),
            technique_id: technique.external_id().unwrap_or_default().to_string(),
            technique_name: technique.name().unwrap_or_default().to_string(),
        });
    }

    rows.sort_by(|a, b| {
        (&a.control_id, &a.technique_id).cmp(&(&b.control_id, &b.technique_id))
    });
    Ok(rows)
}

/// Render rows in the given format.
pub fn render(rows: &[ListingRow], format: ListingFormat) -> Result<String> {
    match format {
        ListingFormat::Tsv => delimited(rows, b'\t'),
        ListingFormat::Csv => delimited(rows, b','),
        ListingFormat::Markdown => Ok(markdown(rows)),
    }
}

fn delimited(rows: &[ListingRow], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(LISTING_COLUMNS)?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| IngestError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| IngestError::InvalidDocument(format!("non UTF-8 output: {e}")))
}

fn markdown(rows: &[ListingRow]) -> String {
    let line = |cells: [&str; 5]| {
        let escaped: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
        format!("| {} |", escaped.join(" | "))
    };

    let mut lines = vec![line(LISTING_COLUMNS), line(["---"; 5])];
    lines.extend(rows.iter().map(|r| line(r.cells())));
    lines.push(String::new());
    lines.join("\n")
}
