//! Error types for catalog ingestion.
//!
//! Uses the dual-error pattern: `IngestError` for fatal conditions that
//! abort a run, and `Diagnostic` for non-fatal findings that are collected
//! alongside a successful result.

use std::fmt;

use thiserror::Error;

/// Main error type for the ingestion library.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A record matched no structural pattern and the classifier has no fallback.
    #[error("Unknown control name format at row {row}: '{record}'")]
    Classification { row: usize, record: String },

    /// A statement or sub-statement appeared without an entry or statement to attach to.
    #[error("Statement at row {row} has no parent to attach to: '{record}'")]
    OrphanStatement { row: usize, record: String },

    /// A mapping pattern matched nothing in its index.
    #[error("Mapping row {row}: cannot find {column} matching '{pattern}'")]
    UnresolvedLinkage {
        row: usize,
        column: String,
        pattern: String,
    },

    /// A mapping pattern is not a valid regular expression.
    #[error("Mapping row {row}: cannot compile pattern '{pattern}': {source}")]
    InvalidPattern {
        row: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An enhancement references a parent that was never resolved.
    #[error("Enhancement {entry} references unknown parent {parent}")]
    MissingParent { entry: String, parent: String },

    /// The same external identifier was assembled twice.
    #[error("Duplicate entry identifier: {0}")]
    DuplicateEntry(String),

    /// A required column is absent from the table header.
    #[error("Missing required column '{column}' in {context}")]
    MissingColumn { column: String, context: String },

    /// The identity registry was seeded after ids were already issued.
    #[error("Identity registry already issued {issued} ids; seed before resolving")]
    RegistrySealed { issued: usize },

    /// Unknown catalog edition name.
    #[error("Unknown catalog edition: '{0}'. Expected one of: r4, r5")]
    UnknownEdition(String),

    /// A document does not have the expected shape.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Unsupported listing output format.
    #[error("Unknown output extension '{0}'. Expected one of: tsv, csv, md")]
    UnsupportedFormat(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tab-delimited table could not be read.
    #[error("Table read error: {0}")]
    Table(#[from] csv::Error),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Non-fatal finding collected while deriving relationships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A related or parent reference that does not name a known entry.
    DanglingReference {
        entry: String,
        reference: String,
        kind: &'static str,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingReference {
                entry,
                reference,
                kind,
            } => write!(f, "{entry}: {kind} reference '{reference}' is not a known entry"),
        }
    }
}
