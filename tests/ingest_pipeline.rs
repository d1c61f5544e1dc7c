//! Ingestion through declarative adapters into graph stores and twins

mod common;

use common::*;
use safetwin::adapter::{Filters, JsonDirSource, RecordSource, StaticSource};
use safetwin::{
    CnesstCategory, Dimension, DimensionOutcome, GraphStore, IngestionManager, MappedAdapter,
    MemoryGraphStore, NodeId, Normalizer, OpenStore, SqliteGraphStore, TwinStore,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn permit_manager(dir: &TempDir, store: Arc<dyn GraphStore>) -> IngestionManager {
    let manager = IngestionManager::new(Normalizer::default()).with_store(store);
    let source = Arc::new(JsonDirSource::new(dir.path()));
    manager.register_adapter(Arc::new(MappedAdapter::new(permit_spec(), source)));
    assert!(manager.connect("permits", &credentials()).await.unwrap());
    manager
}

// === Scenario: a confined-space permit in Tank R-101 ===

#[tokio::test]
async fn permit_becomes_zone_and_risk_joined_by_located_in() {
    let dir = TempDir::new().unwrap();
    write_dimension(
        dir.path(),
        Dimension::RisksOpportunities,
        &[permit("PT-1", "Tank R-101", &["RC5_ESPACES_CLOS"])],
    );
    let store = Arc::new(MemoryGraphStore::new());
    let manager = permit_manager(&dir, store.clone()).await;

    let dims = [Dimension::RisksOpportunities];
    let result = manager.ingest("permits", Some(&dims), &Filters::new()).await.unwrap();

    assert_eq!(
        result.outcome(Dimension::RisksOpportunities),
        Some(&DimensionOutcome::Ingested { raw_count: 1, standardized_count: 1 })
    );
    assert!(result.store.as_ref().unwrap().is_fully_committed());

    let zones = store.nodes_with_label("Zone").unwrap();
    let risks = store.nodes_with_label("Risk").unwrap();
    assert_eq!(zones.len(), 1);
    assert_eq!(risks.len(), 1);
    assert_eq!(zones[0].id, NodeId::from("zone:tank-r-101"));

    let rels = store.relationships_from("Risk", &risks[0].id).unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].relationship, "LOCATED_IN");
    assert_eq!(rels[0].to_id, zones[0].id);
    assert_eq!(
        risks[0].property("cnesst_category").and_then(|v| v.as_str()),
        Some("RC5_ESPACES_CLOS")
    );
}

#[tokio::test]
async fn missing_credentials_keep_the_adapter_disconnected() {
    let dir = TempDir::new().unwrap();
    let manager = IngestionManager::default();
    let source = Arc::new(JsonDirSource::new(dir.path()));
    manager.register_adapter(Arc::new(MappedAdapter::new(permit_spec(), source)));

    assert!(!manager.connect("permits", &Default::default()).await.unwrap());
    assert!(manager.ingest("permits", None, &Filters::new()).await.is_err());
}

// === Scenario: re-ingesting the same source data ===

#[tokio::test]
async fn repeated_ingestion_into_sqlite_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_dimension(
        dir.path(),
        Dimension::RisksOpportunities,
        &[
            permit("PT-1", "Tank R-101", &["RC5_ESPACES_CLOS", "RC7_CHIMIQUE_BIO"]),
            permit("PT-2", "Tank R-101", &["RC5_ESPACES_CLOS"]),
        ],
    );
    let db = dir.path().join("graph").join("safetwin.db");
    let store = Arc::new(SqliteGraphStore::open(&db).unwrap());
    let manager = permit_manager(&dir, store.clone()).await;

    manager.ingest("permits", None, &Filters::new()).await.unwrap();
    let nodes = store.node_count().unwrap();
    let rels = store.relationship_count().unwrap();
    manager.ingest("permits", None, &Filters::new()).await.unwrap();

    // three risks plus one shared zone
    assert_eq!(nodes, 4);
    assert_eq!(rels, 3);
    assert_eq!(store.node_count().unwrap(), nodes);
    assert_eq!(store.relationship_count().unwrap(), rels);

    drop(manager);
    let reopened = SqliteGraphStore::open(&db).unwrap();
    assert_eq!(reopened.node_count().unwrap(), 4);
}

// === Scenario: one platform goes down mid-run ===

#[tokio::test]
async fn failing_platform_does_not_block_the_others() {
    let manager = IngestionManager::default();

    let healthy = StaticSource::new().with_records(
        Dimension::RisksOpportunities,
        vec![permit("PT-1", "Quai 3", &["RC4_VEHICULES"]).as_object().cloned().unwrap()],
    );
    let flaky = Arc::new(StaticSource::new().with_records(
        Dimension::RisksOpportunities,
        vec![permit("PT-9", "Toit", &["RC1_CHUTES_HAUTEUR"]).as_object().cloned().unwrap()],
    ));

    let mut other = permit_spec();
    other.platform = "contractors".into();
    manager.register_adapter(Arc::new(MappedAdapter::new(permit_spec(), Arc::new(healthy))));
    manager.register_adapter(Arc::new(MappedAdapter::new(
        other,
        flaky.clone() as Arc<dyn RecordSource>,
    )));
    manager.connect("permits", &credentials()).await.unwrap();
    manager.connect("contractors", &credentials()).await.unwrap();
    flaky.set_available(false);

    let results = manager.ingest_all(&Filters::new()).await;

    let good = results["permits"].as_ref().unwrap();
    assert_eq!(good.total_records, 1);
    let bad = results["contractors"].as_ref().unwrap();
    assert!(bad.outcome(Dimension::RisksOpportunities).unwrap().is_failed());
    assert_eq!(bad.total_records, 0);
}

// === Scenario: ingested entities feed a twin ===

#[tokio::test]
async fn ingestion_result_builds_a_versioned_twin_with_playbooks() {
    let dir = TempDir::new().unwrap();
    write_dimension(
        dir.path(),
        Dimension::RisksOpportunities,
        &[
            permit("PT-1", "Tank R-101", &["RC5_ESPACES_CLOS"]),
            json!({
                "permit_id": "PT-2", "permit_type": "hot_work", "issued": "2026-04-03",
                "location": "Atelier", "risks": ["RC6_ELECTRICITE"], "severity": "critical"
            }),
        ],
    );
    let manager = permit_manager(&dir, Arc::new(MemoryGraphStore::new())).await;
    let twins = TwinStore::new();

    let result = manager.ingest("permits", None, &Filters::new()).await.unwrap();
    twins.update_twin("TWIN-PLANT-A", &result.normalization);
    let twin = twins.update_twin("TWIN-PLANT-A", &result.normalization);

    assert_eq!(twin.version, 2);
    assert_eq!(twin.layers[&Dimension::RisksOpportunities].len(), 2);
    assert_eq!(twin.playbooks.len(), 1);
    assert_eq!(twin.playbooks[0].category, CnesstCategory::ConfinedSpace);
    assert_eq!(twin.recommendations.len(), 3);
    assert!(twin.recommendations[0].contains("CRITIQUES"));
}
