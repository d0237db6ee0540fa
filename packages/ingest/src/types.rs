//! Core data types for catalog ingestion.
//!
//! These types represent one catalog (controls, enhancements and their
//! statement trees) and the typed edges derived from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::family_id;

/// Kinds of relationships produced by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    /// Enhancement to its parent control.
    SubcontrolOf,

    /// Control to a control it names as related.
    RelatedTo,

    /// Catalog entry to a taxonomy item it addresses.
    Mitigates,
}

impl RelationshipKind {
    /// Get the string value used in output documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubcontrolOf => "subcontrol-of",
            Self::RelatedTo => "related-to",
            Self::Mitigates => "mitigates",
        }
    }

    /// Parse from the `relationship_type` of a document object.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "subcontrol-of" => Some(Self::SubcontrolOf),
            "related-to" => Some(Self::RelatedTo),
            "mitigates" => Some(Self::Mitigates),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled clause of an entry's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Clause label (e.g., "a.", "(1)", "AC-1a.").
    pub label: String,

    /// Clause text.
    pub text: String,

    /// Nested clauses.
    pub substatements: Vec<Statement>,
}

impl Statement {
    /// Create a statement without children.
    #[must_use]
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            substatements: Vec::new(),
        }
    }

    /// Render this statement and its children as markdown bullet lines.
    fn render(&self, depth: usize, out: &mut Vec<String>) {
        let indent = "    ".repeat(depth);
        if self.text.is_empty() {
            out.push(format!("{indent}* **{}**", self.label));
        } else {
            out.push(format!("{indent}* **{}** {}", self.label, self.text));
        }
        for child in &self.substatements {
            child.render(depth + 1, out);
        }
    }
}

/// Edition-specific attributes of an entry that end up as custom properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryProperties {
    /// Family name (title-cased).
    pub family: Option<String>,

    /// Priority code (e.g., "P1").
    pub priority: Option<String>,

    /// Baseline impact levels (e.g., ["LOW", "MODERATE"]).
    pub impact: Vec<String>,
}

/// A catalog control or control enhancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Catalog-native identifier (e.g., "AC-1", "AC-2 (1)").
    pub external_id: String,

    /// Entry title.
    pub name: String,

    /// Whether this entry enhances another.
    pub is_enhancement: bool,

    /// External id of the enhanced entry.
    pub parent_external_id: Option<String>,

    /// External ids named as related, in source order.
    pub related_ids: Vec<String>,

    /// Lead text preceding the statements.
    pub text: String,

    /// Labeled clauses.
    pub statements: Vec<Statement>,

    /// Free text following the statements (discussion / supplemental guidance).
    pub supplemental: Vec<String>,

    /// Edition-specific properties.
    pub properties: EntryProperties,
}

impl Entry {
    /// Create a top-level entry.
    #[must_use]
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            is_enhancement: false,
            parent_external_id: None,
            related_ids: Vec::new(),
            text: String::new(),
            statements: Vec::new(),
            supplemental: Vec::new(),
            properties: EntryProperties::default(),
        }
    }

    /// Turn this entry into an enhancement of `parent`.
    #[must_use]
    pub fn enhancing(mut self, parent: impl Into<String>) -> Self {
        self.is_enhancement = true;
        self.parent_external_id = Some(parent.into());
        self
    }

    /// Set the related ids.
    #[must_use]
    pub fn with_related(mut self, related: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.related_ids = related.into_iter().map(Into::into).collect();
        self
    }

    /// Family id derived from the external identifier.
    #[must_use]
    pub fn family_id(&self) -> &str {
        family_id(&self.external_id)
    }

    /// Format the description as markdown: lead text, statements, then free text.
    #[must_use]
    pub fn format_description(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.text.is_empty() {
            parts.push(self.text.clone());
        }

        if !self.statements.is_empty() {
            let mut lines = Vec::new();
            for statement in &self.statements {
                statement.render(0, &mut lines);
            }
            parts.push(lines.join("\n"));
        }

        parts.extend(self.supplemental.iter().filter(|s| !s.is_empty()).cloned());
        parts.join("\n\n")
    }
}

/// A typed, directed edge between two internal ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Registry-issued relationship id.
    pub id: String,

    /// Internal id of the source.
    pub source_ref: String,

    /// Internal id of the target.
    pub target_ref: String,

    /// Relationship kind.
    pub kind: RelationshipKind,

    /// Optional free-text description.
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_kind_round_trip_names() {
        for kind in [
            RelationshipKind::SubcontrolOf,
            RelationshipKind::RelatedTo,
            RelationshipKind::Mitigates,
        ] {
            assert_eq!(RelationshipKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RelationshipKind::parse("uses"), None);
    }

    #[test]
    fn test_relationship_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&RelationshipKind::SubcontrolOf).unwrap(),
            "\"subcontrol-of\""
        );
    }

    #[test]
    fn test_entry_family() {
        let entry = Entry::new("AC-2 (1)", "Automated Account Management").enhancing("AC-2");
        assert_eq!(entry.family_id(), "AC");
        assert!(entry.is_enhancement);
        assert_eq!(entry.parent_external_id.as_deref(), Some("AC-2"));
    }

    #[test]
    fn test_format_description_with_statements() {
        let mut entry = Entry::new("AC-1", "Policy And Procedures");
        entry.text = "The organization:".to_string();
        let mut a = Statement::new("AC-1a.", "Develops a policy;");
        a.substatements
            .push(Statement::new("AC-1a.1.", "An access control policy;"));
        entry.statements.push(a);
        entry.supplemental.push("Guidance.".to_string());

        assert_eq!(
            entry.format_description(),
            "The organization:\n\n\
             * **AC-1a.** Develops a policy;\n    \
             * **AC-1a.1.** An access control policy;\n\n\
             Guidance."
        );
    }

    #[test]
    fn test_format_description_empty() {
        let entry = Entry::new("AC-1", "Policy");
        assert_eq!(entry.format_description(), "");
    }
}
