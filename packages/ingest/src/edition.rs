//! Catalog edition presets.

use std::fmt;
use std::str::FromStr;

use crate::assemble::{CatalogParser, ChunkedParser, StreamingParser};
use crate::config::{FRAMEWORK_R4, FRAMEWORK_R5};
use crate::error::IngestError;

/// Supported catalog editions.
///
/// Each edition bundles a column layout, a classifier and the parser
/// strategy that fits its record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edition {
    /// One row per control, enhancement and statement.
    Rev4,
    /// One record per control with a multi-line control-text cell.
    Rev5,
}

impl Edition {
    /// Short name used on the command line and in file names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rev4 => "r4",
            Self::Rev5 => "r5",
        }
    }

    /// Framework name written into external references.
    #[must_use]
    pub fn framework(&self) -> &'static str {
        match self {
            Self::Rev4 => FRAMEWORK_R4,
            Self::Rev5 => FRAMEWORK_R5,
        }
    }

    /// File-name friendly framework id (e.g. `nist800-53-r4`).
    #[must_use]
    pub fn framework_id(&self) -> String {
        format!("nist800-53-{}", self.as_str())
    }

    /// The parser for this edition's table layout.
    #[must_use]
    pub fn parser(&self) -> Box<dyn CatalogParser> {
        match self {
            Self::Rev4 => Box::new(StreamingParser::rev4()),
            Self::Rev5 => Box::new(ChunkedParser::rev5()),
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Edition {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r4" | "rev4" => Ok(Self::Rev4),
            "r5" | "rev5" => Ok(Self::Rev5),
            _ => Err(IngestError::UnknownEdition(s.to_string())),
        }
    }
}
