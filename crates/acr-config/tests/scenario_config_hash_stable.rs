//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs hash identically across calls
//! - key order inside YAML does not change the hash
//! - a changed value changes the hash
//! - overlay order matters (later wins) and is reflected in the hash

use acr_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
accrual:
  base_address: "http://localhost:8080"
  request_timeout_ms: 5000
reconcile:
  interval_ms: 10000
  max_in_flight: 4
db:
  url_env: "ACR_DATABASE_URL"
"#;

const BASE_YAML_REORDERED: &str = r#"
db:
  url_env: "ACR_DATABASE_URL"
reconcile:
  max_in_flight: 4
  interval_ms: 10000
accrual:
  request_timeout_ms: 5000
  base_address: "http://localhost:8080"
"#;

const OVERLAY_YAML: &str = r#"
reconcile:
  max_in_flight: 1
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordered keys must canonicalize to the same hash"
    );
}

#[test]
fn overlay_changes_hash_and_wins() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);
    assert_eq!(
        merged.config_json.pointer("/reconcile/max_in_flight"),
        Some(&serde_json::json!(1))
    );
}

#[test]
fn hash_is_hex_sha256() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash.len(), 64);
    assert!(a.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
