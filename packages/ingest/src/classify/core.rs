//! Record classifier mapping pattern groups to record kinds.

use regex::Regex;

use super::types::{RowKind, RowMatch};
use crate::error::{IngestError, Result};

/// Ordered registry of pattern groups.
///
/// Groups are tested in registration order and the first group with a
/// matching pattern wins. Records matching nothing classify as the fallback
/// kind, or fail when no fallback is configured.
#[derive(Debug, Clone, Default)]
pub struct RowClassifier {
    groups: Vec<(RowKind, Vec<Regex>)>,
    fallback: Option<RowKind>,
}

impl RowClassifier {
    /// Create a new empty classifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern group for a record kind.
    ///
    /// Registering the same kind twice appends to its existing group
    /// without changing its position.
    pub fn register(&mut self, kind: RowKind, patterns: impl IntoIterator<Item = Regex>) {
        if let Some((_, existing)) = self.groups.iter_mut().find(|(k, _)| *k == kind) {
            existing.extend(patterns);
        } else {
            self.groups.push((kind, patterns.into_iter().collect()));
        }
    }

    /// Set the kind returned when no pattern matches.
    pub fn fallback(&mut self, kind: RowKind) {
        self.fallback = Some(kind);
    }

    /// Whether unmatched records classify as a fallback kind.
    #[must_use]
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Kinds in evaluation order.
    #[must_use]
    pub fn kinds(&self) -> Vec<RowKind> {
        self.groups.iter().map(|(k, _)| *k).collect()
    }

    /// Find the first matching pattern group, without applying the fallback.
    #[must_use]
    pub fn find<'t>(&self, record: &'t str) -> Option<RowMatch<'t>> {
        self.groups.iter().find_map(|(kind, patterns)| {
            patterns.iter().find_map(|pattern| {
                pattern.captures(record).map(|caps| RowMatch {
                    kind: *kind,
                    groups: caps
                        .iter()
                        .skip(1)
                        .map(|g| g.map_or("", |m| m.as_str()))
                        .collect(),
                })
            })
        })
    }

    /// Classify a record, applying the fallback.
    ///
    /// # Arguments
    /// * `record` - The identifying text of the record
    /// * `row` - Row number used in error messages
    pub fn classify_match<'t>(&self, record: &'t str, row: usize) -> Result<RowMatch<'t>> {
        if let Some(m) = self.find(record) {
            return Ok(m);
        }
        self.fallback
            .map(RowMatch::bare)
            .ok_or_else(|| IngestError::Classification {
                row,
                record: record.to_string(),
            })
    }

    /// Classify a record into its kind.
    pub fn classify(&self, record: &str, row: usize) -> Result<RowKind> {
        self.classify_match(record, row).map(|m| m.kind)
    }
}
