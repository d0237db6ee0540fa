//! Per-taxonomy-item coverage with family collapse.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::config::{family_id, family_marker, FAMILY_PROPERTY};
use crate::document::{Bundle, StixObject};
use crate::error::{IngestError, Result};
use crate::types::RelationshipKind;

/// Catalog entries grouped by family id.
#[derive(Debug, Clone, Default)]
pub struct Families {
    members: BTreeMap<String, BTreeSet<String>>,
    names: HashMap<String, String>,
}

impl Families {
    /// Partition the entries of a controls document by family id.
    ///
    /// The family name comes from the entries' family property; families
    /// without one are named by their id.
    #[must_use]
    pub fn from_controls(controls: &Bundle) -> Self {
        let mut families = Self::default();
        for entry in controls.entries() {
            let Some(external_id) = entry.external_id() else {
                continue;
            };
            let family = family_id(external_id).to_string();
            if let Some(name) = entry.get(FAMILY_PROPERTY).and_then(|v| v.as_str()) {
                families.names.insert(family.clone(), name.to_string());
            }
            families
                .members
                .entry(family)
                .or_default()
                .insert(external_id.to_string());
        }
        families
    }

    /// Family ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Display name of a family.
    #[must_use]
    pub fn name<'a>(&'a self, family: &'a str) -> &'a str {
        self.names.get(family).map_or(family, String::as_str)
    }

    /// External ids of a family's entries.
    #[must_use]
    pub fn members(&self, family: &str) -> Option<&BTreeSet<String>> {
        self.members.get(family)
    }
}

/// Coverage of one taxonomy item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageEntry {
    /// Taxonomy external id.
    pub taxonomy_id: String,

    /// Entry external ids and collapsed family markers, sorted.
    pub mapped_labels: Vec<String>,

    /// Number of distinct labels.
    pub score: usize,
}

/// Mapping data prepared for repeated aggregation over entry subsets.
#[derive(Debug, Clone)]
pub struct Coverage {
    families: Families,
    /// `(entry external id, taxonomy external id)` for every mitigates edge.
    links: Vec<(String, String)>,
    collapse: bool,
}

impl Coverage {
    /// Prepare coverage from a controls document, a mappings document and
    /// the taxonomy objects.
    ///
    /// Mappings whose source is not an entry of `controls` are ignored. A
    /// mapping whose target is missing from the taxonomy is an error.
    pub fn new(controls: &Bundle, mappings: &Bundle, taxonomy: &[StixObject]) -> Result<Self> {
        let entry_ids: HashMap<&str, &str> = controls
            .entries()
            .filter_map(|e| Some((e.id(), e.external_id()?)))
            .collect();
        let taxonomy_ids: HashMap<&str, &str> = taxonomy
            .iter()
            .filter_map(|o| Some((o.id(), o.external_id()?)))
            .collect();

        let mut links = Vec::new();
        for mapping in mappings
            .relationships()
            .filter(|r| r.is_relationship_of(RelationshipKind::Mitigates))
        {
            let Some(entry) = mapping.source_ref().and_then(|s| entry_ids.get(s)) else {
                continue;
            };
            let target = mapping.target_ref().unwrap_or_default();
            let item = taxonomy_ids.get(target).ok_or_else(|| {
                IngestError::InvalidDocument(format!(
                    "mapping {} targets {target}, which is not in the taxonomy",
                    mapping.id()
                ))
            })?;
            links.push((entry.to_string(), item.to_string()));
        }

        Ok(Self {
            families: Families::from_controls(controls),
            links,
            collapse: true,
        })
    }

    /// Enable or disable family collapse.
    #[must_use]
    pub fn with_collapse(mut self, collapse: bool) -> Self {
        self.collapse = collapse;
        self
    }

    /// The family partition of the whole catalog.
    #[must_use]
    pub fn families(&self) -> &Families {
        &self.families
    }

    /// Aggregate coverage for the entries in `subset`.
    ///
    /// Collapse always compares against the whole family, not against the
    /// part of it that is in the subset. Items are returned in taxonomy id
    /// order; items with no labels are omitted.
    #[must_use]
    pub fn aggregate(&self, subset: &BTreeSet<&str>) -> Vec<CoverageEntry> {
        let mut by_item: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (entry, item) in &self.links {
            if subset.contains(entry.as_str()) {
                by_item.entry(item.as_str()).or_default().insert(entry.as_str());
            }
        }

        by_item
            .into_iter()
            .filter_map(|(item, mapped)| {
                let labels = self.labels(&mapped);
                (!labels.is_empty()).then(|| CoverageEntry {
                    taxonomy_id: item.to_string(),
                    score: labels.len(),
                    mapped_labels: labels.into_iter().collect(),
                })
            })
            .collect()
    }

    /// Coverage over the whole catalog.
    #[must_use]
    pub fn aggregate_all(&self) -> Vec<CoverageEntry> {
        let all: BTreeSet<&str> = self
            .families
            .members
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        self.aggregate(&all)
    }

    fn labels(&self, mapped: &BTreeSet<&str>) -> BTreeSet<String> {
        let mut by_family: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for id in mapped {
            by_family.entry(family_id(id)).or_default().insert(*id);
        }

        let mut labels = BTreeSet::new();
        for (family, ids) in by_family {
            let complete = self.families.members(family).is_some_and(|all| {
                all.len() == ids.len() && all.iter().all(|m| ids.contains(m.as_str()))
            });
            if self.collapse && complete {
                labels.insert(family_marker(self.families.name(family)));
            } else {
                labels.extend(ids.into_iter().map(String::from));
            }
        }
        labels
    }
}

/// One scored item of a heatmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapItem {
    pub item_id: String,
    pub score: usize,
    pub labels: Vec<String>,
}

/// Coverage rendered for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    /// Scope name (catalog, family or entry).
    pub identifier: String,
    pub items: Vec<HeatmapItem>,
    /// `(min, max)` of item scores, `(0, 0)` when empty.
    pub score_range: (usize, usize),
}

impl Heatmap {
    /// Build a heatmap from aggregated coverage.
    #[must_use]
    pub fn new(identifier: impl Into<String>, coverage: Vec<CoverageEntry>) -> Self {
        let items: Vec<HeatmapItem> = coverage
            .into_iter()
            .map(|c| HeatmapItem {
                item_id: c.taxonomy_id,
                score: c.score,
                labels: c.mapped_labels,
            })
            .collect();
        let min = items.iter().map(|i| i.score).min().unwrap_or(0);
        let max = items.iter().map(|i| i.score).max().unwrap_or(0);
        Self {
            identifier: identifier.into(),
            items,
            score_range: (min, max),
        }
    }

    /// Whether the heatmap has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
