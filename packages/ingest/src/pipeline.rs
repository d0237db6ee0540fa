//! Catalog build service that ties the components together.

use crate::derive::derive;
use crate::document::{Bundle, StixObject};
use crate::edition::Edition;
use crate::error::{Diagnostic, Result};
use crate::identity::IdentityRegistry;
use crate::linkage::{link, parse_mapping_table, IdIndex, LinkagePolicy, MappingColumns};
use crate::types::Entry;

/// Inputs of one build.
#[derive(Debug, Clone, Copy)]
pub struct BuildInputs<'a> {
    /// Tab-delimited catalog table.
    pub catalog: &'a str,

    /// Tab-delimited mapping table.
    pub mappings: &'a str,

    /// Taxonomy dataset objects.
    pub taxonomy: &'a [StixObject],

    /// Controls bundle of the previous run, for id reuse.
    pub previous_controls: Option<&'a Bundle>,

    /// Mappings bundle of the previous run, for id reuse.
    pub previous_mappings: Option<&'a Bundle>,
}

/// Build settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub edition: Edition,
    pub policy: LinkagePolicy,
    pub mapping_columns: MappingColumns,
}

impl BuildOptions {
    /// Default settings for an edition.
    #[must_use]
    pub fn new(edition: Edition) -> Self {
        Self {
            edition,
            policy: LinkagePolicy::default(),
            mapping_columns: MappingColumns::default(),
        }
    }

    /// Replace the linkage policy.
    #[must_use]
    pub fn with_policy(mut self, policy: LinkagePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Result of a build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Assembled entries in document order.
    pub entries: Vec<Entry>,

    /// Catalog entries plus `subcontrol-of` / `related-to` relationships.
    pub controls: Bundle,

    /// `mitigates` relationships from catalog entries to taxonomy items.
    pub mappings: Bundle,

    /// Non-fatal findings.
    pub diagnostics: Vec<Diagnostic>,
}

/// Build the controls and mappings documents with fresh UUID ids.
pub fn build(inputs: BuildInputs<'_>, options: &BuildOptions) -> Result<BuildOutput> {
    build_with_registry(inputs, options, IdentityRegistry::new())
}

/// Build with a caller-supplied registry (e.g. a deterministic generator).
///
/// Any error aborts the build; no partial document is returned.
pub fn build_with_registry(
    inputs: BuildInputs<'_>,
    options: &BuildOptions,
    mut registry: IdentityRegistry,
) -> Result<BuildOutput> {
    let edition = options.edition;
    let entries = edition.parser().parse(inputs.catalog)?;

    // Seeding must happen before the first resolve
    for previous in [inputs.previous_controls, inputs.previous_mappings]
        .into_iter()
        .flatten()
    {
        registry.seed_from(previous)?;
    }

    let mut objects: Vec<StixObject> = entries
        .iter()
        .map(|entry| {
            let id = registry.resolve_entry(&entry.external_id);
            StixObject::entry(entry, &id, edition.framework())
        })
        .collect();

    let derivation = derive(&entries, &mut registry)?;
    objects.extend(derivation.relationships.iter().map(StixObject::relationship));
    let controls = with_previous_id(Bundle::new(objects), inputs.previous_controls);

    let rows = parse_mapping_table(inputs.mappings, &options.mapping_columns)?;
    let catalog_index = IdIndex::catalog(&controls);
    let taxonomy_index = IdIndex::taxonomy(inputs.taxonomy);
    let mitigates = link(
        &rows,
        &catalog_index,
        &taxonomy_index,
        &mut registry,
        &options.policy,
    )?;
    let mappings = with_previous_id(
        Bundle::new(mitigates.iter().map(StixObject::relationship).collect()),
        inputs.previous_mappings,
    );

    tracing::debug!(
        edition = %edition,
        entries = entries.len(),
        controls = controls.objects.len(),
        mappings = mappings.objects.len(),
        ?registry,
        "Build complete"
    );

    Ok(BuildOutput {
        entries,
        controls,
        mappings,
        diagnostics: derivation.diagnostics,
    })
}

fn with_previous_id(mut bundle: Bundle, previous: Option<&Bundle>) -> Bundle {
    if let Some(previous) = previous.filter(|p| !p.id.is_empty()) {
        bundle.id = previous.id.clone();
    }
    bundle
}
