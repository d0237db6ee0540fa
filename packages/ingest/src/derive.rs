//! Structural relationships between catalog entries.

use std::collections::HashSet;

use crate::error::{Diagnostic, IngestError, Result};
use crate::identity::IdentityRegistry;
use crate::types::{Entry, Relationship, RelationshipKind};

/// Relationships derived from an entry forest, plus non-fatal findings.
#[derive(Debug, Default)]
pub struct Derivation {
    /// Deduplicated `subcontrol-of` and `related-to` relationships.
    pub relationships: Vec<Relationship>,

    /// Dropped references.
    pub diagnostics: Vec<Diagnostic>,
}

/// Derive `subcontrol-of` and `related-to` relationships.
///
/// Every entry must already have been resolved in `registry`; targets are
/// looked up, never minted, so a related id naming something outside the catalog
/// (an appendix, a withdrawn control) is dropped with a
/// [`Diagnostic::DanglingReference`]. An enhancement whose parent is
/// unknown is a data error and fails with [`IngestError::MissingParent`].
///
/// Relationships are emitted in entry order; on a repeated
/// `(source, target, kind)` the first one wins.
pub fn derive(entries: &[Entry], registry: &mut IdentityRegistry) -> Result<Derivation> {
    let mut derivation = Derivation::default();
    let mut seen: HashSet<(String, String, RelationshipKind)> = HashSet::new();

    for entry in entries {
        let source = registry.resolve_entry(&entry.external_id);

        if let Some(parent) = &entry.parent_external_id {
            let target = registry
                .lookup_entry(parent)
                .ok_or_else(|| IngestError::MissingParent {
                    entry: entry.external_id.clone(),
                    parent: parent.clone(),
                })?
                .to_string();
            push_unique(
                &mut derivation.relationships,
                &mut seen,
                registry,
                source.clone(),
                target,
                RelationshipKind::SubcontrolOf,
            );
        }

        for related in &entry.related_ids {
            let Some(target) = registry.lookup_entry(related).map(String::from) else {
                let diagnostic = Diagnostic::DanglingReference {
                    entry: entry.external_id.clone(),
                    reference: related.clone(),
                    kind: RelationshipKind::RelatedTo.as_str(),
                };
                tracing::warn!("{diagnostic}");
                derivation.diagnostics.push(diagnostic);
                continue;
            };
            push_unique(
                &mut derivation.relationships,
                &mut seen,
                registry,
                source.clone(),
                target,
                RelationshipKind::RelatedTo,
            );
        }
    }

    tracing::debug!(
        relationships = derivation.relationships.len(),
        dropped = derivation.diagnostics.len(),
        "Derived catalog relationships"
    );
    Ok(derivation)
}

fn push_unique(
    out: &mut Vec<Relationship>,
    seen: &mut HashSet<(String, String, RelationshipKind)>,
    registry: &mut IdentityRegistry,
    source: String,
    target: String,
    kind: RelationshipKind,
) {
    if !seen.insert((source.clone(), target.clone(), kind)) {
        return;
    }
    let id = registry.resolve_relationship(&source, &target, kind);
    out.push(Relationship {
        id,
        source_ref: source,
        target_ref: target,
        kind,
        description: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SequentialGenerator;

    fn resolved(entries: &[Entry]) -> IdentityRegistry {
        let mut registry = IdentityRegistry::with_generator(SequentialGenerator::default());
        for entry in entries {
            registry.resolve_entry(&entry.external_id);
        }
        registry
    }

    #[test]
    fn test_enhancement_yields_subcontrol_of() {
        let entries = vec![
            Entry::new("AC-2", "Account Management"),
            Entry::new("AC-2 (1)", "Automated System Account Management").enhancing("AC-2"),
        ];
        let mut registry = resolved(&entries);
        let derivation = derive(&entries, &mut registry).unwrap();

        assert_eq!(derivation.relationships.len(), 1);
        let rel = &derivation.relationships[0];
        assert_eq!(rel.kind, RelationshipKind::SubcontrolOf);
        assert_eq!(Some(rel.source_ref.as_str()), registry.lookup_entry("AC-2 (1)"));
        assert_eq!(Some(rel.target_ref.as_str()), registry.lookup_entry("AC-2"));
    }

    #[test]
    fn test_dangling_related_is_dropped_with_diagnostic() {
        let entries = vec![
            Entry::new("AC-1", "Policy").with_related(["AC-2", "PM-9"]),
            Entry::new("AC-2", "Accounts"),
        ];
        let mut registry = resolved(&entries);
        let derivation = derive(&entries, &mut registry).unwrap();

        assert_eq!(derivation.relationships.len(), 1);
        assert_eq!(derivation.relationships[0].kind, RelationshipKind::RelatedTo);
        assert_eq!(
            derivation.diagnostics,
            vec![Diagnostic::DanglingReference {
                entry: "AC-1".to_string(),
                reference: "PM-9".to_string(),
                kind: "related-to",
            }]
        );
    }

    #[test]
    fn test_missing_parent_is_fatal() {
        let entries = vec![Entry::new("AC-2 (1)", "Automated").enhancing("AC-2")];
        let mut registry = resolved(&entries);
        let err = derive(&entries, &mut registry).unwrap_err();
        assert!(matches!(
            err,
            IngestError::MissingParent { ref parent, .. } if parent == "AC-2"
        ));
    }

    #[test]
    fn test_repeated_related_ids_are_deduplicated() {
        let entries = vec![
            Entry::new("AC-1", "Policy").with_related(["AC-2", "AC-2"]),
            Entry::new("AC-2", "Accounts"),
        ];
        let mut registry = resolved(&entries);
        let derivation = derive(&entries, &mut registry).unwrap();
        assert_eq!(derivation.relationships.len(), 1);
    }

    #[test]
    fn test_same_pair_different_kind_both_kept() {
        let entries = vec![
            Entry::new("AC-2", "Accounts"),
            Entry::new("AC-2 (1)", "Automated")
                .enhancing("AC-2")
                .with_related(["AC-2"]),
        ];
        let mut registry = resolved(&entries);
        let derivation = derive(&entries, &mut registry).unwrap();
        let kinds: Vec<_> = derivation.relationships.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RelationshipKind::SubcontrolOf, RelationshipKind::RelatedTo]
        );
    }
}
