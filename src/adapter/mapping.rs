//! Shared field-mapping transform
//!
//! Every adapter maps raw records the same way; only the mapping table
//! differs. Resolution order for a standard field: the standard name itself,
//! then each candidate in order, then a derive template. Nulls count as
//! absent at every step.

use super::spec::DimensionMapping;
use super::template::render_template;
use super::traits::{AdapterError, AdapterResult};
use super::types::{RawRecord, StandardRecord};
use crate::schema::DimensionSchema;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Transform a batch of raw records for one dimension.
///
/// Fails with `MissingRequiredField` on the first record that cannot
/// resolve a required field; nothing from the batch is returned then.
pub fn transform_records(
    platform: &str,
    schema: &DimensionSchema,
    mapping: &DimensionMapping,
    raw_records: &[RawRecord],
    imported_at: DateTime<Utc>,
) -> AdapterResult<Vec<StandardRecord>> {
    let mut out = Vec::with_capacity(raw_records.len());

    for (index, raw) in raw_records.iter().enumerate() {
        for expanded in expand(raw, mapping)? {
            let working = apply_derivations(expanded, mapping)?;
            let fields = resolve_fields(schema, mapping, &working, index)?;
            out.push(StandardRecord {
                id: record_id(platform, schema, &working),
                source_platform: platform.to_string(),
                dimension: schema.dimension,
                imported_at,
                fields,
            });
        }
    }

    Ok(out)
}

fn expand(raw: &RawRecord, mapping: &DimensionMapping) -> AdapterResult<Vec<RawRecord>> {
    let Some(spec) = &mapping.expand else {
        return Ok(vec![raw.clone()]);
    };

    match raw.get(&spec.field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| {
                let mut record = raw.clone();
                record.insert(spec.into.clone(), item.clone());
                record
            })
            .collect()),
        Some(_) => Err(AdapterError::InvalidRecord(format!(
            "expand field {} is not an array",
            spec.field
        ))),
    }
}

/// Derived values land in the working record only where neither the
/// standard name nor any candidate has a value.
fn apply_derivations(mut record: RawRecord, mapping: &DimensionMapping) -> AdapterResult<RawRecord> {
    for (field, template) in &mapping.derive {
        if lookup(&record, mapping, field).is_some() {
            continue;
        }
        if let Some(value) = render_template(template, &record)? {
            record.insert(field.clone(), Value::String(value));
        }
    }
    Ok(record)
}

fn present<'a>(record: &'a RawRecord, name: &str) -> Option<&'a Value> {
    record.get(name).filter(|v| !v.is_null())
}

fn lookup<'a>(record: &'a RawRecord, mapping: &DimensionMapping, field: &str) -> Option<&'a Value> {
    present(record, field).or_else(|| {
        mapping
            .fields
            .get(field)
            .and_then(|candidates| candidates.iter().find_map(|c| present(record, c)))
    })
}

fn resolve_fields(
    schema: &DimensionSchema,
    mapping: &DimensionMapping,
    record: &RawRecord,
    index: usize,
) -> AdapterResult<Map<String, Value>> {
    let mut fields = Map::new();

    for &field in schema.required_fields {
        match lookup(record, mapping, field) {
            Some(value) => {
                fields.insert(field.to_string(), value.clone());
            }
            None => {
                return Err(AdapterError::MissingRequiredField {
                    dimension: schema.dimension,
                    field: field.to_string(),
                    index,
                })
            }
        }
    }

    let foreign_keys = schema.relationships.iter().map(|r| r.foreign_key());
    let optional = schema.optional_fields.iter().map(|f| f.to_string());
    for field in optional.chain(foreign_keys) {
        if let Some(value) = lookup(record, mapping, &field) {
            fields.insert(field, value.clone());
        }
    }

    Ok(fields)
}

/// Caller-supplied `id`, or a name-based UUID over the record content so a
/// replayed record keeps its identifier.
fn record_id(platform: &str, schema: &DimensionSchema, record: &RawRecord) -> String {
    match present(record, "id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => {
            let name = format!(
                "{}:{}:{}",
                platform,
                schema.dimension,
                Value::Object(record.clone())
            );
            Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::spec::ExpandSpec;
    use crate::schema::{Dimension, SchemaRegistry};
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    fn incident_mapping() -> DimensionMapping {
        let mut mapping = DimensionMapping::default();
        mapping
            .fields
            .insert("incident_id".into(), vec!["ref".into(), "number".into()]);
        mapping.fields.insert("severity".into(), vec!["grav".into()]);
        mapping
    }

    fn incident(extra: Value) -> RawRecord {
        let mut r = raw(json!({
            "type": "near_miss", "date": "2026-03-01", "time": "10:15",
            "location": "Quai 3", "severity": "low", "status": "open"
        }));
        if let Value::Object(map) = extra {
            r.extend(map);
        }
        r
    }

    fn transform(mapping: &DimensionMapping, records: &[RawRecord]) -> AdapterResult<Vec<StandardRecord>> {
        let registry = SchemaRegistry::standard();
        let schema = registry.schema_for(Dimension::IncidentsNonconformities).unwrap();
        transform_records("ehs-cloud", schema, mapping, records, Utc::now())
    }

    #[test]
    fn first_present_candidate_wins() {
        let records = transform(&incident_mapping(), &[incident(json!({"ref": null, "number": "INC-9"}))]).unwrap();
        assert_eq!(records[0].fields["incident_id"], json!("INC-9"));
    }

    #[test]
    fn standard_name_is_tried_before_candidates() {
        let records = transform(
            &incident_mapping(),
            &[incident(json!({"incident_id": "INC-1", "ref": "OTHER"}))],
        )
        .unwrap();
        assert_eq!(records[0].fields["incident_id"], json!("INC-1"));
    }

    #[test]
    fn unresolved_required_field_fails_whole_batch() {
        let ok = incident(json!({"ref": "INC-1"}));
        let mut broken = incident(json!({"ref": "INC-2"}));
        broken.remove("status");

        let err = transform(&incident_mapping(), &[ok, broken]).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::MissingRequiredField { ref field, index: 1, .. } if field == "status"
        ));
    }

    #[test]
    fn optional_fields_and_foreign_keys_only_when_resolvable() {
        let records = transform(
            &incident_mapping(),
            &[incident(json!({"ref": "INC-1", "root_cause": null, "zone_id": "Z-3", "unmapped": 1}))],
        )
        .unwrap();
        let fields = &records[0].fields;
        assert!(!fields.contains_key("root_cause"));
        assert!(!fields.contains_key("unmapped"));
        assert_eq!(fields["zone_id"], json!("Z-3"));
    }

    #[test]
    fn record_id_is_caller_supplied_or_stable() {
        let with_id = transform(&incident_mapping(), &[incident(json!({"ref": "I", "id": "src-1"}))]).unwrap();
        assert_eq!(with_id[0].id, "src-1");

        let a = transform(&incident_mapping(), &[incident(json!({"ref": "I"}))]).unwrap();
        let b = transform(&incident_mapping(), &[incident(json!({"ref": "I"}))]).unwrap();
        assert_eq!(a[0].id, b[0].id);
    }

    #[test]
    fn derived_fields_never_overwrite_source_values() {
        let mut mapping = incident_mapping();
        mapping.derive.insert("status".into(), "closed".into());
        mapping.derive.insert("incident_id".into(), "INC-{date}".into());

        let records = transform(&mapping, &[incident(json!({}))]).unwrap();
        assert_eq!(records[0].fields["status"], json!("open"));
        assert_eq!(records[0].fields["incident_id"], json!("INC-2026-03-01"));
    }

    // === Scenario: one permit fans out into one risk per category ===
    #[test]
    fn expand_yields_one_record_per_element() {
        let registry = SchemaRegistry::standard();
        let schema = registry.schema_for(Dimension::RisksOpportunities).unwrap();
        let mut mapping = DimensionMapping {
            expand: Some(ExpandSpec { field: "risks".into(), into: "category".into() }),
            ..Default::default()
        };
        mapping.fields.insert("title".into(), vec!["type".into()]);
        for (field, template) in [
            ("risk_id", "{permit_id}:{category}"),
            ("severity", "high"),
            ("probability", "possible"),
            ("risk_score", "12"),
            ("status", "open"),
            ("identified_date", "{issued}"),
        ] {
            mapping.derive.insert(field.into(), template.into());
        }

        let permit = raw(json!({
            "permit_id": "PT-1", "type": "confined_space_entry", "issued": "2026-04-02",
            "risks": ["RC5_ESPACES_CLOS", "RC7_CHIMIQUE_BIO"]
        }));
        let records = transform_records("permits", schema, &mapping, &[permit], Utc::now()).unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.fields["risk_id"].clone()).collect();
        assert_eq!(ids, vec![json!("PT-1:RC5_ESPACES_CLOS"), json!("PT-1:RC7_CHIMIQUE_BIO")]);
        assert_ne!(records[0].id, records[1].id);
    }
}
