//! Navigator layers rendered from coverage heatmaps.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::config::{
    major_version, CUSTOM_PROPERTY_PREFIX, EMPTY_LAYER_MAX_SCORE, FAMILY_PROPERTY,
    GRADIENT_FLAT, GRADIENT_RANGE, LAYER_VERSION, NAVIGATOR_VERSION,
};
use crate::document::Bundle;

use super::aggregate::{Coverage, Heatmap};

/// Layer format versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerVersions {
    pub navigator: String,
    pub layer: String,
    pub attack: String,
}

/// A scored taxonomy item in a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerTechnique {
    #[serde(rename = "techniqueID")]
    pub technique_id: String,
    pub score: usize,
    pub comment: String,
}

/// Color gradient over the score range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gradient {
    pub colors: Vec<String>,
    #[serde(rename = "minValue")]
    pub min_value: usize,
    #[serde(rename = "maxValue")]
    pub max_value: usize,
}

/// A navigator layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layer {
    pub name: String,
    pub versions: LayerVersions,
    /// 3 = descending by score.
    pub sorting: u8,
    pub description: String,
    pub domain: String,
    pub techniques: Vec<LayerTechnique>,
    pub gradient: Gradient,
}

/// Layer settings shared by every file of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSettings {
    /// Framework id used in names and file names.
    pub framework: String,

    /// Taxonomy domain (e.g. `enterprise-attack`).
    pub domain: String,

    /// Taxonomy version (e.g. `v9.0`).
    pub version: String,
}

/// A layer together with its path relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFile {
    pub path: PathBuf,
    pub heatmap: Heatmap,
    pub layer: Layer,
}

/// Build a layer from a heatmap.
///
/// The gradient spans the heatmap's score range. When every item has the
/// same score the low end drops to zero and a lighter palette is used; an
/// empty layer spans `[0, 100]`.
#[must_use]
pub fn create_layer(
    name: &str,
    description: &str,
    domain: &str,
    heatmap: &Heatmap,
    version: &str,
) -> Layer {
    let (mut min_value, mut max_value) = heatmap.score_range;
    if heatmap.is_empty() {
        max_value = EMPTY_LAYER_MAX_SCORE;
    }
    let mut colors = GRADIENT_RANGE;
    if max_value == min_value {
        min_value = 0;
        colors = GRADIENT_FLAT;
    }

    Layer {
        name: name.to_string(),
        versions: LayerVersions {
            navigator: NAVIGATOR_VERSION.to_string(),
            layer: LAYER_VERSION.to_string(),
            attack: major_version(version).to_string(),
        },
        sorting: 3,
        description: description.to_string(),
        domain: domain.to_string(),
        techniques: heatmap
            .items
            .iter()
            .map(|item| LayerTechnique {
                technique_id: item.item_id.clone(),
                score: item.score,
                comment: format!("Mitigated by {}", item.labels.join(", ")),
            })
            .collect(),
        gradient: Gradient {
            colors: colors.iter().map(|c| c.to_string()).collect(),
            min_value,
            max_value,
        },
    }
}

fn layer_file(
    path: PathBuf,
    heatmap: Heatmap,
    name: &str,
    description: &str,
    settings: &LayerSettings,
) -> LayerFile {
    let layer = create_layer(name, description, &settings.domain, &heatmap, &settings.version);
    LayerFile {
        path,
        heatmap,
        layer,
    }
}

/// Turn free text into a single path component.
///
/// Whitespace becomes `_`; separators and characters not allowed in file
/// names become `-`. A result made only of dots is replaced so the segment
/// can never climb out of its directory.
fn path_segment(text: &str) -> String {
    let segment: String = text
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_whitespace() => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    if segment.chars().all(|c| c == '.') {
        segment.replace('.', "_")
    } else {
        segment
    }
}

/// Whole-catalog, per-family and per-entry layers.
///
/// The overview layer is always emitted. Family and entry layers are only
/// emitted when they have at least one item.
#[must_use]
pub fn overview_layers(coverage: &Coverage, settings: &LayerSettings) -> Vec<LayerFile> {
    let framework = &settings.framework;
    let mut layers = vec![layer_file(
        PathBuf::from(format!("{framework}-overview.json")),
        Heatmap::new(framework.as_str(), coverage.aggregate_all()),
        &format!("{framework} overview"),
        &format!(
            "{framework} heatmap overview of control mappings, where scores are the number of associated controls"
        ),
        settings,
    )];

    let families = coverage.families();
    for family in families.ids() {
        let Some(members) = families.members(family) else {
            continue;
        };
        let name = families.name(family);
        let dir = Path::new("by_family").join(path_segment(name));

        let subset: BTreeSet<&str> = members.iter().map(String::as_str).collect();
        let heatmap = Heatmap::new(family, coverage.aggregate(&subset));
        if heatmap.is_empty() {
            continue;
        }
        layers.push(layer_file(
            dir.join(format!("{family}-overview.json")),
            heatmap,
            &format!("{name} overview"),
            &format!(
                "{framework} heatmap for controls in the {name} family, where scores are the number of associated controls"
            ),
            settings,
        ));

        for member in members {
            let subset: BTreeSet<&str> = [member.as_str()].into_iter().collect();
            let heatmap = Heatmap::new(member.as_str(), coverage.aggregate(&subset));
            if heatmap.is_empty() {
                continue;
            }
            layers.push(layer_file(
                dir.join(format!("{}.json", path_segment(member))),
                heatmap,
                &format!("{member} mappings"),
                &format!("{framework} {member} mappings"),
                settings,
            ));
        }
    }

    tracing::debug!(layers = layers.len(), "Built overview layers");
    layers
}

/// Layers grouping entries by each custom property other than family.
///
/// List-valued properties place an entry in one group per element. A group
/// gets a layer only when its entries have mappings.
#[must_use]
pub fn property_layers(
    coverage: &Coverage,
    controls: &Bundle,
    settings: &LayerSettings,
) -> Vec<LayerFile> {
    // property -> value -> entry external ids
    let mut groups: BTreeMap<&str, BTreeMap<String, BTreeSet<&str>>> = BTreeMap::new();
    let mut list_valued: BTreeSet<&str> = BTreeSet::new();

    for entry in controls.entries() {
        let Some(external_id) = entry.external_id() else {
            continue;
        };
        for (property, value) in entry.custom_properties(CUSTOM_PROPERTY_PREFIX) {
            if property == FAMILY_PROPERTY {
                continue;
            }
            let values: Vec<String> = match value {
                Value::Array(items) => {
                    list_valued.insert(property);
                    items.iter().filter_map(scalar).collect()
                }
                other => scalar(other).into_iter().collect(),
            };
            for v in values {
                groups
                    .entry(property)
                    .or_default()
                    .entry(v)
                    .or_default()
                    .insert(external_id);
            }
        }
    }

    let mut layers = Vec::new();
    for (property, values) in &groups {
        let short = property.trim_start_matches(CUSTOM_PROPERTY_PREFIX);
        let dir = format!("by_{}", path_segment(short));
        let relation = if list_valued.contains(property) {
            "includes"
        } else {
            "is"
        };
        for (value, members) in values {
            let heatmap = Heatmap::new(format!("{short}={value}"), coverage.aggregate(members));
            if heatmap.is_empty() {
                continue;
            }
            layers.push(layer_file(
                Path::new(&dir).join(format!("{}.json", path_segment(value))),
                heatmap,
                &format!("{short}={value} mappings"),
                &format!("techniques where the {short} of associated controls {relation} {value}"),
                settings,
            ));
        }
    }

    tracing::debug!(layers = layers.len(), "Built property layers");
    layers
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Markdown index of the layers, linking each file relative to the output
/// directory. Layers are indented by directory depth; overviews sit one
/// level up from the files they summarize.
#[must_use]
pub fn layer_directory(framework: &str, layers: &[LayerFile]) -> String {
    let mut lines = vec![
        "# Navigator Layers".to_string(),
        String::new(),
        format!("The following layers represent the mappings from the taxonomy to {framework}:"),
        String::new(),
    ];
    for file in layers {
        let parts: Vec<String> = file
            .path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let mut depth = parts.len().saturating_sub(1);
        if file.layer.name.ends_with("overview") {
            depth = depth.saturating_sub(1);
        }
        lines.push(format!(
            "{}- [{}]({})",
            "    ".repeat(depth),
            file.layer.name,
            parts.join("/")
        ));
    }
    lines.join("\n")
}
