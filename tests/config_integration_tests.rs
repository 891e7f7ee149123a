//! Integration tests for the sample config and plan fixture files.

use std::fs;
use std::path::Path;

use media_transfer::transfer::{OperationKind, TransferGroup, validate_file_name};
use serde::Deserialize;

#[derive(Deserialize)]
struct PlanFile {
    #[serde(rename = "group")]
    groups: Vec<TransferGroup>,
}

fn read_fixture(name: &str) -> String {
    let path = Path::new("tests/fixtures").join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()))
}

#[test]
fn sample_config_is_valid_toml() {
    let result: Result<toml::Value, _> = toml::from_str(&read_fixture("sample_config.toml"));
    assert!(result.is_ok(), "Sample config should be valid TOML: {:?}", result.err());
}

#[test]
fn sample_config_has_mtransfer_section() {
    let value: toml::Value = toml::from_str(&read_fixture("sample_config.toml")).expect("should parse");
    let section = value.get("mtransfer").expect("should have mtransfer section");

    for key in [
        "workers",
        "verify",
        "operation",
        "log",
        "progress",
        "verbose",
        "debug",
        "source",
        "destination",
        "subtitles",
    ] {
        assert!(section.get(key).is_some(), "[mtransfer] should have '{key}'");
    }

    assert!(section.get("workers").and_then(toml::Value::as_integer).is_some_and(|n| n > 0));
}

#[test]
fn sample_config_operation_is_known() {
    let value: toml::Value = toml::from_str(&read_fixture("sample_config.toml")).expect("should parse");
    let operation = value["mtransfer"]["operation"].as_str().expect("operation should be a string");
    assert!(operation.parse::<OperationKind>().is_ok());
}

#[test]
fn sample_plan_parses_into_groups() {
    let plan: PlanFile = toml::from_str(&read_fixture("sample_plan.toml")).expect("should parse plan");
    assert_eq!(plan.groups.len(), 4);

    let alpha = &plan.groups[0];
    assert_eq!(alpha.name, "Alpha");
    assert_eq!(alpha.category, "Anime");
    assert!(!alpha.is_series());
    assert_eq!(alpha.files.len(), 3);

    let seasons: Vec<_> = plan
        .groups
        .iter()
        .filter(|group| group.name == "Beta")
        .filter_map(|group| group.partition.as_deref())
        .collect();
    assert_eq!(seasons, ["Beta Season 1", "Beta Season 2"]);
}

#[test]
fn sample_plan_file_names_are_valid() {
    let plan: PlanFile = toml::from_str(&read_fixture("sample_plan.toml")).expect("should parse plan");
    for group in &plan.groups {
        for file_name in &group.files {
            assert!(validate_file_name(file_name).is_ok(), "{file_name} should be valid");
        }
    }
}
