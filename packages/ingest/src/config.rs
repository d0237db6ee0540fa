//! Configuration constants and validation functions for ingestion.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{IngestError, Result};

/// Framework name written into external references for Revision 4 catalogs.
pub const FRAMEWORK_R4: &str = "NIST 800-53 Revision 4";

/// Framework name written into external references for Revision 5 catalogs.
pub const FRAMEWORK_R5: &str = "NIST 800-53 Revision 5";

/// STIX type of catalog entries.
pub const ENTRY_TYPE: &str = "course-of-action";

/// STIX type of relationships.
pub const RELATIONSHIP_TYPE: &str = "relationship";

/// STIX spec version written on generated bundles.
pub const STIX_SPEC_VERSION: &str = "2.0";

/// Default mapping table column holding the catalog identifier pattern.
pub const MAPPING_CATALOG_COLUMN: &str = "controlID";

/// Default mapping table column holding the taxonomy identifier pattern.
pub const MAPPING_TAXONOMY_COLUMN: &str = "techniqueID";

/// Optional mapping table column with a free-text description.
pub const MAPPING_DESCRIPTION_COLUMN: &str = "description";

/// Prefix of custom properties carried on catalog entries.
pub const CUSTOM_PROPERTY_PREFIX: &str = "x_mitre_";

/// Custom property holding the family name.
pub const FAMILY_PROPERTY: &str = "x_mitre_family";

/// Navigator application version written on layers.
pub const NAVIGATOR_VERSION: &str = "4.3";

/// Layer format version written on layers.
pub const LAYER_VERSION: &str = "4.2";

/// Gradient used when layer scores vary.
pub const GRADIENT_RANGE: [&str; 2] = ["#ACD0E6", "#08336E"];

/// Gradient used when every score in a layer is the same.
pub const GRADIENT_FLAT: [&str; 2] = ["#ffffff", "#66b1ff"];

/// Upper bound of the gradient for a layer without techniques.
pub const EMPTY_LAYER_MAX_SCORE: usize = 100;

/// Supported taxonomy domains.
pub const DOMAINS: [&str; 2] = ["enterprise-attack", "mobile-attack"];

/// Taxonomy version pattern: optional `v`, major, optional `.minor`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?\d+(\.\d+)?$").expect("valid regex"));

/// Family prefix of an external identifier: the word before the first hyphen.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static FAMILY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)-").expect("valid regex"));

/// Label used in coverage output for a fully mapped family.
///
/// # Examples
/// ```
/// use controlmap_ingest::config::family_marker;
///
/// assert_eq!(family_marker("Access Control"), "all 'Access Control' entries");
/// ```
#[must_use]
pub fn family_marker(family_name: &str) -> String {
    format!("all '{family_name}' entries")
}

/// Extract the family id from an external identifier.
///
/// Identifiers without a hyphen form their own family.
///
/// # Examples
/// ```
/// use controlmap_ingest::config::family_id;
///
/// assert_eq!(family_id("AC-2 (1)"), "AC");
/// assert_eq!(family_id("PM-10"), "PM");
/// ```
#[must_use]
pub fn family_id(external_id: &str) -> &str {
    FAMILY_PATTERN
        .captures(external_id)
        .and_then(|c| c.get(1))
        .map_or(external_id, |m| m.as_str())
}

/// Validate a taxonomy version string such as `v9.0`.
///
/// # Examples
/// ```
/// use controlmap_ingest::config::validate_version;
///
/// assert!(validate_version("v9.0").is_ok());
/// assert!(validate_version("10").is_ok());
/// assert!(validate_version("latest").is_err());
/// ```
pub fn validate_version(version: &str) -> Result<()> {
    if VERSION_PATTERN.is_match(version) {
        Ok(())
    } else {
        Err(IngestError::InvalidDocument(format!(
            "invalid taxonomy version '{version}', expected e.g. v9.0"
        )))
    }
}

/// Validate a taxonomy domain name.
pub fn validate_domain(domain: &str) -> Result<()> {
    if DOMAINS.contains(&domain) {
        Ok(())
    } else {
        Err(IngestError::InvalidDocument(format!(
            "unknown domain '{domain}', expected one of: {}",
            DOMAINS.join(", ")
        )))
    }
}

/// Reduce a taxonomy version to its major component.
///
/// # Examples
/// ```
/// use controlmap_ingest::config::major_version;
///
/// assert_eq!(major_version("v9.0"), "9");
/// assert_eq!(major_version("10.1"), "10");
/// ```
#[must_use]
pub fn major_version(version: &str) -> &str {
    let version = version.strip_prefix('v').unwrap_or(version);
    version.split('.').next().unwrap_or(version)
}

/// Title-case text the way catalog titles are normalized.
///
/// Every run of letters starts upper-case and continues lower-case.
///
/// # Examples
/// ```
/// use controlmap_ingest::config::title_case;
///
/// assert_eq!(title_case("ACCESS CONTROL POLICY AND PROCEDURES"), "Access Control Policy And Procedures");
/// assert_eq!(title_case("least privilege | non-privileged access"), "Least Privilege | Non-Privileged Access");
/// ```
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_id() {
        assert_eq!(family_id("AC-1"), "AC");
        assert_eq!(family_id("AC-2 (1)"), "AC");
        assert_eq!(family_id("NOHYPHEN"), "NOHYPHEN");
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version("v8.2").is_ok());
        assert!(validate_version("v10").is_ok());
        assert!(validate_version("").is_err());
        assert!(validate_version("v9.0.1").is_err());
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("enterprise-attack").is_ok());
        assert!(validate_domain("ics-attack").is_err());
    }

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("v8.2"), "8");
        assert_eq!(major_version("9"), "9");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("account management"), "Account Management");
        assert_eq!(title_case("AC-2"), "Ac-2");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_family_marker() {
        assert_eq!(family_marker("AC"), "all 'AC' entries");
    }
}
