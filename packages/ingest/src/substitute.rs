//! Replace a taxonomy dataset's own mitigations with catalog entries.

use std::collections::HashSet;

use crate::config::ENTRY_TYPE;
use crate::document::{Bundle, StixObject};
use crate::types::RelationshipKind;

/// Project catalog entries and their mappings into a taxonomy dataset.
///
/// Every `course-of-action` and every `mitigates` relationship of `base` is
/// dropped, so the dataset's built-in coverage is replaced rather than
/// merged. Catalog entries from `controls` are added next: all of them when
/// `keep_unmapped` is set, otherwise only those that are the source of at
/// least one `mitigates` relationship in `mappings`. All `mitigates`
/// relationships of `mappings` are appended last.
#[must_use]
pub fn substitute(
    base: &Bundle,
    controls: &Bundle,
    mappings: &Bundle,
    keep_unmapped: bool,
) -> Bundle {
    let mitigates: Vec<&StixObject> = mappings
        .relationships()
        .filter(|r| r.is_relationship_of(RelationshipKind::Mitigates))
        .collect();

    let mut objects: Vec<StixObject> = base
        .objects
        .iter()
        .filter(|o| {
            o.object_type() != ENTRY_TYPE && !o.is_relationship_of(RelationshipKind::Mitigates)
        })
        .cloned()
        .collect();
    let kept_from_base = objects.len();

    let mapped: HashSet<&str> = mitigates.iter().filter_map(|r| r.source_ref()).collect();
    objects.extend(
        controls
            .entries()
            .filter(|e| keep_unmapped || mapped.contains(e.id()))
            .cloned(),
    );
    let added_entries = objects.len() - kept_from_base;
    objects.extend(mitigates.into_iter().cloned());

    tracing::debug!(
        kept_from_base,
        added_entries,
        total = objects.len(),
        "Substituted catalog into dataset"
    );

    let mut bundle = Bundle::new(objects);
    if base.spec_version.is_some() {
        bundle.spec_version = base.spec_version.clone();
    }
    bundle
}
