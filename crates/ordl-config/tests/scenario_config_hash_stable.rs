//! Scenario: config hash stability.
//!
//! GREEN when:
//! - Loading the same docs twice yields the same config_hash.
//! - Reordering keys within YAML doesn't change the hash.
//! - Changing a value changes the hash.
//! - Later layers override earlier ones, key by key.
//! - Files on disk layer the same way as in-memory docs.

use ordl_config::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig};
use std::io::Write;

const BASE_YAML: &str = r#"
store:
  database_url_env: "ORDL_DATABASE_URL"
  max_connections: 5
lists:
  key_prefix: "ordlist"
  sentinel: "*"
lock:
  ttl_ms: 5000
  poll_interval_ms: 250
  timeout_ms: 2000
"#;

const BASE_YAML_REORDERED: &str = r#"
lock:
  timeout_ms: 2000
  ttl_ms: 5000
  poll_interval_ms: 250
lists:
  sentinel: "*"
  key_prefix: "ordlist"
store:
  max_connections: 5
  database_url_env: "ORDL_DATABASE_URL"
"#;

const OVERLAY_YAML: &str = r#"
lists:
  merge_mode: "append"
lock:
  timeout_ms: 500
"#;

#[test]
fn same_input_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn key_order_does_not_matter() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn different_values_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_leaf_and_keeps_siblings() {
    let c = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let j = &c.config_json;
    assert_eq!(j.pointer("/lock/timeout_ms").unwrap(), 500);
    assert_eq!(j.pointer("/lock/ttl_ms").unwrap(), 5000);
    assert_eq!(j.pointer("/lists/merge_mode").unwrap(), "append");
    assert_eq!(j.pointer("/lists/sentinel").unwrap(), "*");
}

#[test]
fn empty_layers_are_ignored() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&["", BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let empty = LoadedConfig::empty().unwrap();
    assert_eq!(empty.canonical_json, "{}");
}

#[test]
fn files_layer_like_strings() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("overlay.yaml");
    std::fs::File::create(&base)
        .unwrap()
        .write_all(BASE_YAML.as_bytes())
        .unwrap();
    std::fs::File::create(&overlay)
        .unwrap()
        .write_all(OVERLAY_YAML.as_bytes())
        .unwrap();

    let from_files = load_layered_yaml(&[
        base.to_str().unwrap(),
        overlay.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_is_an_error_naming_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
}
