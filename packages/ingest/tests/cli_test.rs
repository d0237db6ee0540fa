//! Smoke tests for the `controlmap` binary.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn controlmap() -> Command {
    Command::cargo_bin("controlmap").unwrap()
}

/// Run `build` on the Revision 4 fixtures into `dir`.
fn build_into(dir: &Path) {
    controlmap()
        .arg("build")
        .arg(fixture("catalog_r4.tsv"))
        .arg(fixture("mappings.tsv"))
        .arg(fixture("taxonomy.json"))
        .arg("--output")
        .arg(dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries: 3"));
}

#[test]
fn test_build_writes_bundles() {
    let dir = tempdir().unwrap();
    build_into(dir.path());

    let controls = fs::read_to_string(dir.path().join("nist800-53-r4-controls.json")).unwrap();
    assert!(controls.contains("\"subcontrol-of\""));
    let mappings = fs::read_to_string(dir.path().join("nist800-53-r4-mappings.json")).unwrap();
    assert_eq!(mappings.matches("\"mitigates\"").count(), 3);
}

#[test]
fn test_rebuild_with_previous_output_keeps_ids() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    build_into(first.path());

    controlmap()
        .arg("build")
        .arg(fixture("catalog_r4.tsv"))
        .arg(fixture("mappings.tsv"))
        .arg(fixture("taxonomy.json"))
        .arg("--previous-controls")
        .arg(first.path().join("nist800-53-r4-controls.json"))
        .arg("--previous-mappings")
        .arg(first.path().join("nist800-53-r4-mappings.json"))
        .arg("-o")
        .arg(second.path())
        .assert()
        .success();

    for name in ["nist800-53-r4-controls.json", "nist800-53-r4-mappings.json"] {
        assert_eq!(
            fs::read_to_string(first.path().join(name)).unwrap(),
            fs::read_to_string(second.path().join(name)).unwrap()
        );
    }
}

#[test]
fn test_heatmaps_and_list() {
    let dir = tempdir().unwrap();
    build_into(dir.path());
    let controls = dir.path().join("nist800-53-r4-controls.json");
    let mappings = dir.path().join("nist800-53-r4-mappings.json");
    let layers = dir.path().join("layers");

    controlmap()
        .arg("heatmaps")
        .arg(&controls)
        .arg(&mappings)
        .arg(fixture("taxonomy.json"))
        .args(["--framework", "nist800-53-r4", "--build-directory"])
        .arg("--output")
        .arg(&layers)
        .assert()
        .success();

    assert!(layers.join("nist800-53-r4-overview.json").exists());
    assert!(layers.join("by_family/Access_Control/AC-2_(1).json").exists());
    let index = fs::read_to_string(layers.join("README.md")).unwrap();
    assert!(index.contains("(by_family/Access_Control/AC-overview.json)"));

    let listing = dir.path().join("mappings.md");
    controlmap()
        .arg("list")
        .arg(&mappings)
        .arg(&controls)
        .arg(fixture("taxonomy.json"))
        .arg("-o")
        .arg(&listing)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rows: 3"));
    let table = fs::read_to_string(&listing).unwrap();
    assert!(table.starts_with("| Control ID | Control Name |"));
}

#[test]
fn test_substitute() {
    let dir = tempdir().unwrap();
    build_into(dir.path());
    let output = dir.path().join("enterprise-substituted.json");

    controlmap()
        .arg("substitute")
        .arg(fixture("taxonomy.json"))
        .arg(dir.path().join("nist800-53-r4-controls.json"))
        .arg(dir.path().join("nist800-53-r4-mappings.json"))
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let content = fs::read_to_string(&output).unwrap();
    assert!(!content.contains("course-of-action--m1032"));
    assert!(content.contains("relationship--uses"));
}

#[test]
fn test_unknown_listing_extension_fails() {
    let dir = tempdir().unwrap();
    build_into(dir.path());

    controlmap()
        .arg("list")
        .arg(dir.path().join("nist800-53-r4-mappings.json"))
        .arg(dir.path().join("nist800-53-r4-controls.json"))
        .arg(fixture("taxonomy.json"))
        .arg("-o")
        .arg(dir.path().join("mappings.xlsx"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown output extension 'xlsx'"));
}

#[test]
fn test_invalid_domain_fails() {
    let dir = tempdir().unwrap();

    controlmap()
        .arg("heatmaps")
        .args(["controls.json", "mappings.json", "taxonomy.json"])
        .args(["--framework", "nist800-53-r4", "--domain", "pre-attack"])
        .arg("-o")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown domain 'pre-attack'"));
}
