//! Types for the record classifier.

/// Kind of a catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    /// Control (e.g., "AC-1").
    TopLevel,
    /// Control enhancement (e.g., "AC-2 (1)").
    Enhancement,
    /// Labeled clause of the current entry.
    Statement,
    /// Labeled clause of the current statement.
    Substatement,
    /// Anything else; supplemental text.
    FreeText,
}

impl RowKind {
    /// Whether this kind starts a new entry.
    #[must_use]
    pub fn starts_entry(&self) -> bool {
        matches!(self, Self::TopLevel | Self::Enhancement)
    }
}

/// A successful classification with the pattern's capture groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMatch<'t> {
    /// Record kind.
    pub kind: RowKind,

    /// Capture groups 1.. of the matching pattern (unmatched groups are empty).
    pub groups: Vec<&'t str>,
}

impl<'t> RowMatch<'t> {
    /// Create a match without capture groups.
    #[must_use]
    pub fn bare(kind: RowKind) -> Self {
        Self {
            kind,
            groups: Vec::new(),
        }
    }

    /// Capture group `n` (1-based), if present and non-empty.
    #[must_use]
    pub fn group(&self, n: usize) -> Option<&'t str> {
        n.checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .copied()
            .filter(|g| !g.is_empty())
    }
}
