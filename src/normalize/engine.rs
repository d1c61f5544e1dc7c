//! Record → graph normalization
//!
//! Each record becomes one primary node labelled from its schema, plus one
//! relationship (and one reference node for the target) per declared
//! relationship whose foreign key is present. Records are independent of
//! each other; the only cross-record step is merging by key at the end.

use crate::adapter::StandardRecord;
use crate::graph::{CypherStatement, GraphNode, GraphRelationship, GraphWrite, NodeKey, PropertyValue};
use crate::schema::{cnesst_category, CnesstCategory, Dimension, SchemaError, SchemaRegistry};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that abort one record's normalization
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    UnknownDimension(#[from] SchemaError),

    #[error("record {record_id} has no usable value for primary key {field}")]
    MissingPrimaryKey { record_id: String, field: String },
}

/// A record that could not be normalized; siblings are unaffected.
#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub record_id: String,
    pub dimension: Dimension,
    #[serde(serialize_with = "serialize_display")]
    pub error: NormalizeError,
}

fn serialize_display<S: Serializer>(error: &NormalizeError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationSummary {
    pub nodes_created: usize,
    pub relationships_created: usize,
    pub dimensions_processed: usize,
}

/// Graph output of a batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizationResult {
    /// Distinct nodes, merged by id, in first-seen order
    pub nodes: Vec<GraphNode>,
    /// Distinct relationships, in first-seen order
    pub relationships: Vec<GraphRelationship>,
    /// Node upserts followed by relationship upserts
    pub writes: Vec<GraphWrite>,
    pub summary: NormalizationSummary,
    pub failures: Vec<RecordFailure>,
}

impl NormalizationResult {
    pub fn cypher_statements(&self) -> Vec<CypherStatement> {
        self.writes.iter().map(GraphWrite::to_cypher).collect()
    }
}

/// Graph output of a single record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordGraph {
    pub node: GraphNode,
    /// Minimal nodes standing in for relationship targets
    pub references: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

pub struct Normalizer {
    registry: Arc<SchemaRegistry>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(SchemaRegistry::standard())
    }
}

impl Normalizer {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Normalize a batch. Per-record failures are collected, never fatal.
    pub fn normalize(&self, records: &[StandardRecord]) -> NormalizationResult {
        let mut result = NormalizationResult::default();
        let mut node_index: HashMap<NodeKey, usize> = HashMap::new();
        let mut seen_relationships = HashSet::new();
        let mut dimensions = BTreeSet::new();

        let mut add_node = |nodes: &mut Vec<GraphNode>, node: GraphNode| {
            match node_index.get(&node.key()) {
                Some(&i) => nodes[i].merge(&node),
                None => {
                    node_index.insert(node.key(), nodes.len());
                    nodes.push(node);
                }
            }
        };

        for record in records {
            let graph = match self.normalize_record(record) {
                Ok(graph) => graph,
                Err(error) => {
                    warn!(record_id = %record.id, dimension = %record.dimension, %error, "record skipped");
                    result.failures.push(RecordFailure {
                        record_id: record.id.clone(),
                        dimension: record.dimension,
                        error,
                    });
                    continue;
                }
            };

            dimensions.insert(record.dimension);
            for reference in graph.references {
                add_node(&mut result.nodes, reference);
            }
            add_node(&mut result.nodes, graph.node);
            for rel in graph.relationships {
                if seen_relationships.insert(rel.key()) {
                    result.relationships.push(rel);
                }
            }
        }

        result.writes = result
            .nodes
            .iter()
            .cloned()
            .map(GraphWrite::UpsertNode)
            .chain(result.relationships.iter().cloned().map(GraphWrite::UpsertRelationship))
            .collect();
        result.summary = NormalizationSummary {
            nodes_created: result.nodes.len(),
            relationships_created: result.relationships.len(),
            dimensions_processed: dimensions.len(),
        };

        info!(
            nodes = result.summary.nodes_created,
            relationships = result.summary.relationships_created,
            dimensions = result.summary.dimensions_processed,
            failures = result.failures.len(),
            "normalized batch"
        );
        result
    }

    /// Normalize one record. Pure given the registry.
    pub fn normalize_record(&self, record: &StandardRecord) -> Result<RecordGraph, NormalizeError> {
        let schema = self.registry.schema_for(record.dimension)?;
        let primary_key = schema.primary_key();

        let id = record
            .field(primary_key)
            .and_then(scalar_key)
            .ok_or_else(|| NormalizeError::MissingPrimaryKey {
                record_id: record.id.clone(),
                field: primary_key.to_string(),
            })?;

        let mut node = GraphNode::with_labels(id.as_str(), schema.labels.iter().copied());
        for (key, value) in &record.fields {
            if let Some(pv) = PropertyValue::from_json(value) {
                node.properties.insert(key.clone(), pv);
            }
        }
        node.properties
            .insert("source_platform".into(), record.source_platform.as_str().into());
        node.properties
            .insert("dimension".into(), record.dimension.as_str().into());
        node.properties
            .insert("imported_at".into(), record.imported_at.to_rfc3339().into());
        node.properties
            .insert("record_id".into(), record.id.as_str().into());
        if let Some(mapping) = schema.cnesst_mapping {
            node.properties.insert("cnesst_mapping".into(), mapping.into());
        }
        if let Some(clause) = schema.iso_clause {
            node.properties.insert("iso_clause".into(), clause.into());
        }
        if record.dimension == Dimension::RisksOpportunities {
            if let Some(category) = record.field("category").and_then(Value::as_str) {
                let rc = CnesstCategory::from_code(category)
                    .unwrap_or_else(|| cnesst_category(category));
                node.properties
                    .insert("cnesst_category".into(), rc.code().into());
            }
        }

        let mut references = Vec::new();
        let mut relationships = Vec::new();
        for decl in schema.relationships {
            let Some(value) = record.field(&decl.foreign_key()) else {
                continue;
            };
            for target in foreign_key_targets(value) {
                references.push(GraphNode::new(target.as_str(), decl.target_label));
                relationships.push(GraphRelationship::new(
                    id.as_str(),
                    schema.primary_label(),
                    decl.relationship,
                    target,
                    decl.target_label,
                ));
            }
        }

        Ok(RecordGraph {
            node,
            references,
            relationships,
        })
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    let key = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!key.is_empty()).then_some(key)
}

/// A foreign key may hold one id or a list of ids.
fn foreign_key_targets(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_key).collect(),
        other => scalar_key(other).into_iter().collect(),
    }
}
