//! Shared fixtures for the integration tests

#![allow(dead_code)]

use safetwin::adapter::Credentials;
use safetwin::workflow::{plant_floor, SignalSnapshot};
use safetwin::{AdapterSpec, Dimension};
use serde_json::{json, Value};
use std::path::Path;

/// Work-permit platform: each permit lists the CNESST risks it covers.
pub const PERMIT_SPEC: &str = r#"
platform: permits
auth:
  required: [api_key]
dimensions:
  risks_opportunities:
    expand: { field: risks, into: category }
    fields:
      title: [permit_type]
      identified_date: [issued]
    derive:
      risk_id: "{permit_id}:{category}"
      zone_id: "zone:{location | slug}"
      severity: "{severity | default:high}"
      probability: possible
      risk_score: "12"
      status: open
"#;

pub fn permit_spec() -> AdapterSpec {
    AdapterSpec::from_yaml_str(PERMIT_SPEC).unwrap()
}

pub fn permit(permit_id: &str, location: &str, risks: &[&str]) -> Value {
    json!({
        "permit_id": permit_id,
        "permit_type": "confined_space_entry",
        "issued": "2026-04-02",
        "location": location,
        "risks": risks,
    })
}

pub fn credentials() -> Credentials {
    Credentials::from([("api_key".to_string(), "test-key".to_string())])
}

/// Write `records` as `<dir>/<dimension>.json`.
pub fn write_dimension(dir: &Path, dimension: Dimension, records: &[Value]) {
    let path = dir.join(format!("{}.json", dimension));
    std::fs::write(path, serde_json::to_vec(records).unwrap()).unwrap();
}

pub fn nominal() -> SignalSnapshot {
    plant_floor(25.0, 4.0, 2.0, 70.0)
}

/// Vibration at 13 mm/s against a critical threshold of 12, all else nominal.
pub fn vibration_breach() -> SignalSnapshot {
    plant_floor(25.0, 13.0, 2.0, 70.0)
}

/// Every signal past its critical threshold.
pub fn all_critical() -> SignalSnapshot {
    plant_floor(45.0, 13.0, 25.0, 95.0)
}
