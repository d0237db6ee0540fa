//! Stable internal identifiers.
//!
//! The registry hands out internal ids for catalog entries (keyed by their
//! external id) and for relationships (keyed by the ordered
//! `(source, target, kind)` triple). A run that is seeded from the previous
//! run's output reuses every id the previous run issued, so regenerating a
//! catalog does not churn identifiers.

use std::collections::HashMap;

use crate::config::ENTRY_TYPE;
use crate::document::Bundle;
use crate::error::{IngestError, Result};
use crate::types::RelationshipKind;

/// Strategy for minting fresh internal ids.
pub trait IdGenerator {
    /// Mint a new id for an object of the given type.
    ///
    /// Ids must be unique for the lifetime of the registry.
    fn mint(&mut self, object_type: &str) -> String;
}

/// Mints `<type>--<uuid v4>` ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn mint(&mut self, object_type: &str) -> String {
        format!("{object_type}--{}", uuid::Uuid::new_v4())
    }
}

/// Mints `<type>--<n>` ids from a counter. Deterministic; meant for tests and
/// reproducible fixtures.
#[derive(Debug, Clone, Default)]
pub struct SequentialGenerator {
    next: usize,
}

impl IdGenerator for SequentialGenerator {
    fn mint(&mut self, object_type: &str) -> String {
        self.next += 1;
        format!("{object_type}--{:012}", self.next)
    }
}

type RelationshipKey = (String, String, RelationshipKind);

/// Registry of issued internal ids.
pub struct IdentityRegistry {
    entries: HashMap<String, String>,
    relationships: HashMap<RelationshipKey, String>,
    generator: Box<dyn IdGenerator>,
    issued: usize,
}

impl IdentityRegistry {
    /// Create an empty registry minting UUID-based ids.
    #[must_use]
    pub fn new() -> Self {
        Self::with_generator(UuidGenerator)
    }

    /// Create an empty registry with a custom id strategy.
    #[must_use]
    pub fn with_generator(generator: impl IdGenerator + 'static) -> Self {
        Self {
            entries: HashMap::new(),
            relationships: HashMap::new(),
            generator: Box::new(generator),
            issued: 0,
        }
    }

    /// Preload ids from a previously produced document.
    ///
    /// Non-relationship objects contribute `external_id -> id` pairs taken
    /// from their first external reference; relationship objects contribute
    /// their `(source, target, kind)` triple. Must be called before any
    /// `resolve_*` call.
    ///
    /// Returns the number of ids loaded.
    pub fn seed_from(&mut self, previous: &Bundle) -> Result<usize> {
        if self.issued > 0 {
            return Err(IngestError::RegistrySealed {
                issued: self.issued,
            });
        }

        let mut loaded = 0;
        for object in &previous.objects {
            if object.is_relationship() {
                let Some(rel) = object.to_relationship() else {
                    tracing::debug!(id = %object.id(), "Skipping relationship of unknown kind");
                    continue;
                };
                self.relationships
                    .entry((rel.source_ref, rel.target_ref, rel.kind))
                    .or_insert(rel.id);
                loaded += 1;
            } else if let Some(external_id) = object.external_id() {
                self.entries
                    .entry(external_id.to_string())
                    .or_insert_with(|| object.id().to_string());
                loaded += 1;
            }
        }

        tracing::debug!(loaded, "Seeded identity registry");
        Ok(loaded)
    }

    /// Resolve an entry's internal id, minting one on first sight.
    pub fn resolve_entry(&mut self, external_id: &str) -> String {
        self.issued += 1;
        if let Some(id) = self.entries.get(external_id) {
            return id.clone();
        }
        let id = self.generator.mint(ENTRY_TYPE);
        self.entries.insert(external_id.to_string(), id.clone());
        id
    }

    /// Resolve a relationship's id, minting one on first sight.
    pub fn resolve_relationship(
        &mut self,
        source: &str,
        target: &str,
        kind: RelationshipKind,
    ) -> String {
        self.issued += 1;
        let key = (source.to_string(), target.to_string(), kind);
        if let Some(id) = self.relationships.get(&key) {
            return id.clone();
        }
        let id = self.generator.mint("relationship");
        self.relationships.insert(key, id.clone());
        id
    }

    /// Look up an entry's internal id without minting.
    #[must_use]
    pub fn lookup_entry(&self, external_id: &str) -> Option<&str> {
        self.entries.get(external_id).map(String::as_str)
    }

    /// Number of known entry ids.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of known relationship ids.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("entries", &self.entries.len())
            .field("relationships", &self.relationships.len())
            .field("issued", &self.issued)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn previous_output() -> Bundle {
        Bundle::from_json(
            r#"{"type": "bundle", "id": "bundle--0", "objects": [
                {"type": "course-of-action", "id": "course-of-action--aaa",
                 "external_references": [{"source_name": "NIST 800-53 Revision 4", "external_id": "AC-1"}]},
                {"type": "course-of-action", "id": "course-of-action--bbb",
                 "external_references": [{"source_name": "NIST 800-53 Revision 4", "external_id": "AC-2"}]},
                {"type": "relationship", "id": "relationship--ccc", "relationship_type": "related-to",
                 "source_ref": "course-of-action--aaa", "target_ref": "course-of-action--bbb"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_entry_is_idempotent() {
        let mut registry = IdentityRegistry::new();
        let first = registry.resolve_entry("AC-1");
        let second = registry.resolve_entry("AC-1");
        assert_eq!(first, second);
        assert!(first.starts_with("course-of-action--"));
        assert_ne!(registry.resolve_entry("AC-2"), first);
        assert_eq!(registry.lookup_entry("AC-1"), Some(first.as_str()));
        assert_eq!(registry.lookup_entry("AC-3"), None);
    }

    #[test]
    fn test_seeded_ids_are_reused() {
        let mut registry = IdentityRegistry::new();
        assert_eq!(registry.seed_from(&previous_output()).unwrap(), 3);

        assert_eq!(registry.resolve_entry("AC-2"), "course-of-action--bbb");
        assert_eq!(
            registry.resolve_relationship(
                "course-of-action--aaa",
                "course-of-action--bbb",
                RelationshipKind::RelatedTo
            ),
            "relationship--ccc"
        );
        // Same pair, different kind is a different relationship
        assert_ne!(
            registry.resolve_relationship(
                "course-of-action--aaa",
                "course-of-action--bbb",
                RelationshipKind::SubcontrolOf
            ),
            "relationship--ccc"
        );
    }

    #[test]
    fn test_seed_after_resolve_fails() {
        let mut registry = IdentityRegistry::new();
        registry.resolve_entry("AC-1");
        let err = registry.seed_from(&previous_output()).unwrap_err();
        assert!(matches!(err, IngestError::RegistrySealed { issued: 1 }));
    }

    #[test]
    fn test_sequential_generator() {
        let mut registry = IdentityRegistry::with_generator(SequentialGenerator::default());
        assert_eq!(registry.resolve_entry("AC-1"), "course-of-action--000000000001");
        assert_eq!(
            registry.resolve_relationship("a", "b", RelationshipKind::Mitigates),
            "relationship--000000000002"
        );
        assert_eq!(registry.entry_count(), 1);
        assert_eq!(registry.relationship_count(), 1);
    }
}
