//! Output and input documents.
//!
//! Catalog entries, relationships and taxonomy items all travel as loosely
//! typed JSON objects inside a bundle (`{"type": "bundle", "objects": [...]}`).
//! Taxonomy objects carry many fields this crate never interprets, so objects
//! keep their full JSON map and expose typed accessors for the handful of
//! fields ingestion reads.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ENTRY_TYPE, RELATIONSHIP_TYPE, STIX_SPEC_VERSION};
use crate::error::{IngestError, Result};
use crate::types::{Entry, Relationship, RelationshipKind};

/// A single document object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StixObject(Map<String, Value>);

impl StixObject {
    /// Get a raw field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Object type (e.g., "course-of-action", "relationship").
    #[must_use]
    pub fn object_type(&self) -> &str {
        self.str_field("type").unwrap_or_default()
    }

    /// Object id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.str_field("id").unwrap_or_default()
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// Whether this object is a relationship.
    #[must_use]
    pub fn is_relationship(&self) -> bool {
        self.object_type() == RELATIONSHIP_TYPE
    }

    /// Whether this object is a catalog entry.
    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.object_type() == ENTRY_TYPE
    }

    fn first_reference(&self) -> Option<&Map<String, Value>> {
        self.0
            .get("external_references")
            .and_then(Value::as_array)
            .and_then(|refs| refs.first())
            .and_then(Value::as_object)
    }

    /// `external_id` of the first external reference.
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.first_reference()
            .and_then(|r| r.get("external_id"))
            .and_then(Value::as_str)
    }

    /// `source_name` of the first external reference.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        self.first_reference()
            .and_then(|r| r.get("source_name"))
            .and_then(Value::as_str)
    }

    /// Whether the object has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.flag("revoked")
    }

    /// Whether the object has been deprecated.
    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.flag("x_mitre_deprecated")
    }

    /// Relationship type, for relationship objects.
    #[must_use]
    pub fn relationship_type(&self) -> Option<&str> {
        self.str_field("relationship_type")
    }

    /// Source reference, for relationship objects.
    #[must_use]
    pub fn source_ref(&self) -> Option<&str> {
        self.str_field("source_ref")
    }

    /// Target reference, for relationship objects.
    #[must_use]
    pub fn target_ref(&self) -> Option<&str> {
        self.str_field("target_ref")
    }

    /// Whether this object is a relationship of the given kind.
    #[must_use]
    pub fn is_relationship_of(&self, kind: RelationshipKind) -> bool {
        self.is_relationship() && self.relationship_type() == Some(kind.as_str())
    }

    /// Custom properties with the given prefix, in key order.
    pub fn custom_properties<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Build a catalog entry object.
    #[must_use]
    pub fn entry(entry: &Entry, internal_id: &str, framework: &str) -> Self {
        let mut map = Map::new();
        map.insert("type".into(), ENTRY_TYPE.into());
        map.insert("id".into(), internal_id.into());
        map.insert("name".into(), entry.name.clone().into());
        map.insert("description".into(), entry.format_description().into());

        let mut reference = Map::new();
        reference.insert("source_name".into(), framework.into());
        reference.insert("external_id".into(), entry.external_id.clone().into());
        map.insert(
            "external_references".into(),
            Value::Array(vec![Value::Object(reference)]),
        );

        let props = &entry.properties;
        if let Some(family) = &props.family {
            map.insert("x_mitre_family".into(), family.clone().into());
        }
        if let Some(priority) = &props.priority {
            map.insert("x_mitre_priority".into(), priority.clone().into());
        }
        if !props.impact.is_empty() {
            map.insert(
                "x_mitre_impact".into(),
                Value::Array(props.impact.iter().cloned().map(Value::from).collect()),
            );
        }

        Self(map)
    }

    /// Build a relationship object.
    #[must_use]
    pub fn relationship(relationship: &Relationship) -> Self {
        let mut map = Map::new();
        map.insert("type".into(), RELATIONSHIP_TYPE.into());
        map.insert("id".into(), relationship.id.clone().into());
        map.insert("source_ref".into(), relationship.source_ref.clone().into());
        map.insert("target_ref".into(), relationship.target_ref.clone().into());
        map.insert(
            "relationship_type".into(),
            relationship.kind.as_str().into(),
        );
        if let Some(description) = &relationship.description {
            map.insert("description".into(), description.clone().into());
        }
        Self(map)
    }

    /// Read back a relationship object of a known kind.
    #[must_use]
    pub fn to_relationship(&self) -> Option<Relationship> {
        if !self.is_relationship() {
            return None;
        }
        Some(Relationship {
            id: self.id().to_string(),
            source_ref: self.source_ref()?.to_string(),
            target_ref: self.target_ref()?.to_string(),
            kind: RelationshipKind::parse(self.relationship_type()?)?,
            description: self.str_field("description").map(String::from),
        })
    }
}

#[derive(Deserialize)]
struct ObjectList {
    objects: Vec<StixObject>,
}

/// Read the objects of a dataset shaped `{"objects": [...]}`.
///
/// Unlike [`Bundle::from_json`] the top-level `type` is not checked, so
/// dataset exports that are not strictly bundles still load.
pub fn objects_from_json(json: &str) -> Result<Vec<StixObject>> {
    let list: ObjectList = serde_json::from_str(json)?;
    Ok(list.objects)
}

/// Serialize any output value with four-space indentation.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(out)
        .map_err(|e| IngestError::InvalidDocument(format!("non UTF-8 output: {e}")))
}

/// A collection of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle id.
    #[serde(default)]
    pub id: String,

    /// Contained objects.
    pub objects: Vec<StixObject>,

    /// Spec version of the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<String>,

    /// Always "bundle".
    #[serde(rename = "type", default = "bundle_type")]
    pub kind: String,
}

fn bundle_type() -> String {
    "bundle".to_string()
}

impl Bundle {
    /// Create a bundle with a fresh id.
    #[must_use]
    pub fn new(objects: Vec<StixObject>) -> Self {
        Self {
            id: format!("bundle--{}", uuid::Uuid::new_v4()),
            objects,
            spec_version: Some(STIX_SPEC_VERSION.to_string()),
            kind: bundle_type(),
        }
    }

    /// Parse a bundle from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: Self = serde_json::from_str(json)?;
        if bundle.kind != "bundle" {
            return Err(IngestError::InvalidDocument(format!(
                "expected a bundle, found type '{}'",
                bundle.kind
            )));
        }
        Ok(bundle)
    }

    /// Read a bundle from a file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize with four-space indentation and sorted object keys.
    pub fn to_json_pretty(&self) -> Result<String> {
        to_json_pretty(self)
    }

    /// Catalog entry objects.
    pub fn entries(&self) -> impl Iterator<Item = &StixObject> {
        self.objects.iter().filter(|o| o.is_entry())
    }

    /// Relationship objects.
    pub fn relationships(&self) -> impl Iterator<Item = &StixObject> {
        self.objects.iter().filter(|o| o.is_relationship())
    }

    /// Find an object by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StixObject> {
        self.objects.iter().find(|o| o.id() == id)
    }
}
