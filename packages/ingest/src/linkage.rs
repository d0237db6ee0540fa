//! Pattern-based linkage of catalog entries to taxonomy items.
//!
//! Each mapping row holds two regular expressions, one over catalog external
//! ids and one over taxonomy external ids. A row expands to the Cartesian
//! product of everything the two patterns match, one `mitigates`
//! relationship per pair. Patterns are anchored before matching so `T1001`
//! never picks up `T1001.001`.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;

use crate::config::{
    ENTRY_TYPE, MAPPING_CATALOG_COLUMN, MAPPING_DESCRIPTION_COLUMN, MAPPING_TAXONOMY_COLUMN,
};
use crate::document::{Bundle, StixObject};
use crate::error::{IngestError, Result};
use crate::identity::IdentityRegistry;
use crate::table::{clean_cell, Table};
use crate::types::{Relationship, RelationshipKind};

/// One row of a mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    /// 1-based data row number, for error reporting.
    pub row: usize,

    /// Pattern over catalog external ids.
    pub catalog_pattern: String,

    /// Pattern over taxonomy external ids.
    pub taxonomy_pattern: String,

    /// Optional free-text rationale.
    pub description: Option<String>,
}

/// Physical column names of a mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingColumns {
    pub catalog: String,
    pub taxonomy: String,
    pub description: String,
}

impl Default for MappingColumns {
    fn default() -> Self {
        Self {
            catalog: MAPPING_CATALOG_COLUMN.to_string(),
            taxonomy: MAPPING_TAXONOMY_COLUMN.to_string(),
            description: MAPPING_DESCRIPTION_COLUMN.to_string(),
        }
    }
}

/// Parse a tab-delimited mapping table.
///
/// The catalog and taxonomy columns are required; the description column is
/// optional and empty descriptions read as `None`.
pub fn parse_mapping_table(input: &str, columns: &MappingColumns) -> Result<Vec<MappingRow>> {
    let table = Table::parse_tsv(input)?;
    let header = table.header();
    let missing = |column: &str| IngestError::MissingColumn {
        column: column.to_string(),
        context: "mapping table".to_string(),
    };
    let catalog = header
        .position(&columns.catalog)
        .ok_or_else(|| missing(&columns.catalog))?;
    let taxonomy = header
        .position(&columns.taxonomy)
        .ok_or_else(|| missing(&columns.taxonomy))?;
    let description = header.position(&columns.description);

    let rows = (0..table.rows.len())
        .map(|i| {
            let record = table.row(i);
            let cell = |pos: usize| record.get(pos).map(|c| clean_cell(c)).unwrap_or("");
            MappingRow {
                row: i + 1,
                catalog_pattern: cell(catalog).to_string(),
                taxonomy_pattern: cell(taxonomy).to_string(),
                description: description
                    .map(cell)
                    .filter(|d| !d.is_empty())
                    .map(String::from),
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(rows = rows.len(), "Parsed mapping table");
    Ok(rows)
}

/// Matching policy for [`link`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkagePolicy {
    /// When set, index keys containing `(` or `)` only match patterns that
    /// themselves contain an escaped parenthesis. Keeps a parent-level
    /// pattern such as `AC-2.*` from reaching enhancements like `AC-2 (1)`.
    pub exclude_parenthesized_keys: bool,
}

impl LinkagePolicy {
    /// Default policy: every key is eligible.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parenthesized-key exclusion.
    #[must_use]
    pub fn exclude_parenthesized_keys(mut self, exclude: bool) -> Self {
        self.exclude_parenthesized_keys = exclude;
        self
    }
}

/// Lookup table from external id to internal id.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    ids: BTreeMap<String, String>,
}

impl IdIndex {
    /// Build the taxonomy index from raw dataset objects.
    ///
    /// Relationships, objects without external references, revoked objects
    /// and deprecated objects are skipped. Later objects overwrite earlier
    /// ones with the same external id.
    #[must_use]
    pub fn taxonomy(objects: &[StixObject]) -> Self {
        let mut ids = BTreeMap::new();
        for object in objects {
            if object.is_relationship() || object.is_revoked() || object.is_deprecated() {
                continue;
            }
            if let Some(external_id) = object.external_id() {
                ids.insert(external_id.to_string(), object.id().to_string());
            }
        }
        tracing::debug!(items = ids.len(), "Built taxonomy index");
        Self { ids }
    }

    /// Build the catalog index from a controls document.
    #[must_use]
    pub fn catalog(controls: &Bundle) -> Self {
        let ids = controls
            .objects
            .iter()
            .filter(|o| o.object_type() == ENTRY_TYPE)
            .filter_map(|o| Some((o.external_id()?.to_string(), o.id().to_string())))
            .collect();
        Self { ids }
    }

    /// Internal id for an external id.
    #[must_use]
    pub fn get(&self, external_id: &str) -> Option<&str> {
        self.ids.get(external_id).map(String::as_str)
    }

    /// Number of indexed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Internal ids of every key matching `pattern`, in key order.
    pub fn lookup(&self, pattern: &str, row: usize, policy: &LinkagePolicy) -> Result<Vec<&str>> {
        let anchored = anchor_pattern(pattern);
        let regex = Regex::new(&anchored).map_err(|source| IngestError::InvalidPattern {
            row,
            pattern: anchored.clone(),
            source,
        })?;
        let allow_parens = !policy.exclude_parenthesized_keys || pattern.contains(r"\(");

        Ok(self
            .ids
            .iter()
            .filter(|(key, _)| allow_parens || !(key.contains('(') || key.contains(')')))
            .filter(|(key, _)| regex.is_match(key))
            .map(|(_, id)| id.as_str())
            .collect())
    }
}

impl FromIterator<(String, String)> for IdIndex {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Trim a pattern and anchor the whole expression on both ends.
///
/// Existing outer anchors are dropped first, so alternations are anchored
/// as a group rather than branch by branch.
///
/// # Examples
/// ```
/// use controlmap_ingest::linkage::anchor_pattern;
///
/// assert_eq!(anchor_pattern(" T1001 "), "^(?:T1001)$");
/// assert_eq!(anchor_pattern("^AC-2.*"), "^(?:AC-2.*)$");
/// assert_eq!(anchor_pattern("^T1001$"), "^(?:T1001)$");
/// assert_eq!(anchor_pattern("AC-1|AC-2"), "^(?:AC-1|AC-2)$");
/// ```
#[must_use]
pub fn anchor_pattern(pattern: &str) -> String {
    let mut body = pattern.trim();
    body = body.strip_prefix('^').unwrap_or(body);
    if !body.ends_with(r"\$") {
        body = body.strip_suffix('$').unwrap_or(body);
    }
    format!("^(?:{body})$")
}

/// Expand mapping rows into deduplicated `mitigates` relationships.
///
/// A pattern that matches nothing fails the whole run with
/// [`IngestError::UnresolvedLinkage`]. Pairs produced by several rows are
/// kept once, with the first row's description.
pub fn link(
    rows: &[MappingRow],
    catalog: &IdIndex,
    taxonomy: &IdIndex,
    registry: &mut IdentityRegistry,
    policy: &LinkagePolicy,
) -> Result<Vec<Relationship>> {
    let mut relationships = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for mapping in rows {
        let sources = catalog.lookup(&mapping.catalog_pattern, mapping.row, policy)?;
        if sources.is_empty() {
            return Err(unresolved(mapping, MAPPING_CATALOG_COLUMN, &mapping.catalog_pattern));
        }
        let targets = taxonomy.lookup(&mapping.taxonomy_pattern, mapping.row, policy)?;
        if targets.is_empty() {
            return Err(unresolved(mapping, MAPPING_TAXONOMY_COLUMN, &mapping.taxonomy_pattern));
        }

        for source in &sources {
            for target in &targets {
                if !seen.insert((source.to_string(), target.to_string())) {
                    continue;
                }
                let id = registry.resolve_relationship(source, target, RelationshipKind::Mitigates);
                relationships.push(Relationship {
                    id,
                    source_ref: source.to_string(),
                    target_ref: target.to_string(),
                    kind: RelationshipKind::Mitigates,
                    description: mapping.description.clone(),
                });
            }
        }
    }

    tracing::debug!(
        rows = rows.len(),
        relationships = relationships.len(),
        "Linked mapping rows"
    );
    Ok(relationships)
}

fn unresolved(mapping: &MappingRow, column: &str, pattern: &str) -> IngestError {
    IngestError::UnresolvedLinkage {
        row: mapping.row,
        column: column.to_string(),
        pattern: pattern.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SequentialGenerator;
    use serde_json::json;

    fn index(pairs: &[(&str, &str)]) -> IdIndex {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn catalog() -> IdIndex {
        index(&[
            ("AC-1", "coa--1"),
            ("AC-10", "coa--10"),
            ("AC-2", "coa--2"),
            ("AC-2 (1)", "coa--2-1"),
        ])
    }

    fn taxonomy() -> IdIndex {
        index(&[("T1001", "ap--1001"), ("T1001.001", "ap--1001-001"), ("T1002", "ap--1002")])
    }

    fn row(n: usize, catalog: &str, taxonomy: &str) -> MappingRow {
        MappingRow {
            row: n,
            catalog_pattern: catalog.to_string(),
            taxonomy_pattern: taxonomy.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_literal_patterns_are_anchored() {
        let policy = LinkagePolicy::new();
        let catalog = catalog();
        let taxonomy = taxonomy();
        assert_eq!(catalog.lookup("AC-1", 1, &policy).unwrap(), vec!["coa--1"]);
        assert_eq!(taxonomy.lookup("T1001", 1, &policy).unwrap(), vec!["ap--1001"]);
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let catalog = index(&[
            ("AC-1", "coa--1"),
            ("AC-1 (1)", "coa--1-1"),
            ("AC-10", "coa--10"),
            ("AC-2", "coa--2"),
        ]);
        let policy = LinkagePolicy::new();

        let ids = catalog.lookup("AC-1|AC-2", 1, &policy).unwrap();
        assert_eq!(ids, vec!["coa--1", "coa--2"]);

        let ids = catalog.lookup("^AC-1$|^AC-10$", 1, &policy).unwrap();
        assert_eq!(ids, vec!["coa--1", "coa--10"]);
    }

    #[test]
    fn test_escaped_trailing_dollar_is_kept() {
        assert_eq!(anchor_pattern(r"AC-1\$"), r"^(?:AC-1\$)$");
    }

    #[test]
    fn test_wildcard_reaches_enhancements_by_default() {
        let catalog = catalog();
        let ids = catalog.lookup("AC-2.*", 1, &LinkagePolicy::new()).unwrap();
        assert_eq!(ids, vec!["coa--2", "coa--2-1"]);
    }

    #[test]
    fn test_parenthesized_key_exclusion() {
        let policy = LinkagePolicy::new().exclude_parenthesized_keys(true);
        let catalog = catalog();
        let ids = catalog.lookup("AC-2.*", 1, &policy).unwrap();
        assert_eq!(ids, vec!["coa--2"]);

        let ids = catalog.lookup(r"AC-2 \(1\)", 1, &policy).unwrap();
        assert_eq!(ids, vec!["coa--2-1"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = catalog().lookup("AC-(", 7, &LinkagePolicy::new()).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPattern { row: 7, .. }));
    }

    #[test]
    fn test_link_cartesian_product_and_dedup() {
        let mut registry = IdentityRegistry::with_generator(SequentialGenerator::default());
        let rows = vec![
            row(1, "AC-1", "T1001.*"),
            MappingRow {
                description: Some("second".to_string()),
                ..row(2, "AC-1", "T1001")
            },
        ];
        let rels = link(&rows, &catalog(), &taxonomy(), &mut registry, &LinkagePolicy::new())
            .unwrap();

        assert_eq!(rels.len(), 2);
        assert!(rels.iter().all(|r| r.kind == RelationshipKind::Mitigates));
        assert_eq!(rels[0].target_ref, "ap--1001");
        assert_eq!(rels[0].description, None);
    }

    #[test]
    fn test_link_unresolved_is_fatal() {
        let mut registry = IdentityRegistry::new();
        let rows = vec![row(1, "AC-1", "T1001"), row(2, "AC-99", "T1001")];
        let err = link(&rows, &catalog(), &taxonomy(), &mut registry, &LinkagePolicy::new())
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::UnresolvedLinkage { row: 2, ref column, .. } if column == "controlID"
        ));

        let rows = vec![row(3, "AC-1", "T9999")];
        let err = link(&rows, &catalog(), &taxonomy(), &mut registry, &LinkagePolicy::new())
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::UnresolvedLinkage { row: 3, ref column, .. } if column == "techniqueID"
        ));
    }

    #[test]
    fn test_taxonomy_index_skips_inactive_objects() {
        let objects: Vec<StixObject> = serde_json::from_value(json!([
            {"type": "attack-pattern", "id": "ap--1", "external_references": [{"source_name": "mitre-attack", "external_id": "T1001"}]},
            {"type": "attack-pattern", "id": "ap--2", "revoked": true, "external_references": [{"source_name": "mitre-attack", "external_id": "T1002"}]},
            {"type": "attack-pattern", "id": "ap--3", "x_mitre_deprecated": true, "external_references": [{"source_name": "mitre-attack", "external_id": "T1003"}]},
            {"type": "attack-pattern", "id": "ap--4"},
            {"type": "relationship", "id": "rel--1", "external_references": [{"source_name": "x", "external_id": "R1"}]}
        ]))
        .unwrap();
        let taxonomy = IdIndex::taxonomy(&objects);
        assert_eq!(taxonomy.len(), 1);
        assert_eq!(taxonomy.get("T1001"), Some("ap--1"));
    }

    #[test]
    fn test_parse_mapping_table() {
        let input = "controlID\ttechniqueID\tdescription\nAC-1\tT1001\t\nAC-2.*\t T1002 \tshared accounts\n";
        let rows = parse_mapping_table(input, &MappingColumns::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, None);
        assert_eq!(rows[1].row, 2);
        assert_eq!(rows[1].taxonomy_pattern, "T1002");
        assert_eq!(rows[1].description.as_deref(), Some("shared accounts"));
    }

    #[test]
    fn test_parse_mapping_table_requires_pattern_columns() {
        let err = parse_mapping_table("controlID\tnotes\nAC-1\tx\n", &MappingColumns::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { ref column, .. } if column == "techniqueID"));
    }
}
