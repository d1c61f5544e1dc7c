//! In-process graph store

use super::traits::{GraphStore, StorageError, StorageResult};
use crate::graph::{GraphNode, GraphRelationship, NodeId, NodeKey, RelationshipKey};
use dashmap::DashMap;

/// Concurrent in-memory graph store
///
/// Shared between ingestion runs and workflow sessions behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    nodes: DashMap<NodeKey, GraphNode>,
    relationships: DashMap<RelationshipKey, GraphRelationship>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_endpoint(&self, id: &NodeId, label: &str) -> StorageResult<()> {
        let found = self.nodes.contains_key(&(label.to_string(), id.clone()))
            || self.nodes.iter().any(|n| &n.id == id && n.has_label(label));
        if found {
            Ok(())
        } else {
            Err(StorageError::MissingEndpoint {
                id: id.clone(),
                label: label.to_string(),
            })
        }
    }
}

impl GraphStore for MemoryGraphStore {
    fn upsert_node(&self, node: &GraphNode) -> StorageResult<()> {
        if node.labels.is_empty() {
            return Err(StorageError::Unlabelled(node.id.clone()));
        }
        self.nodes
            .entry(node.key())
            .and_modify(|existing| existing.merge(node))
            .or_insert_with(|| node.clone());
        Ok(())
    }

    fn load_node(&self, label: &str, id: &NodeId) -> StorageResult<Option<GraphNode>> {
        Ok(self
            .nodes
            .get(&(label.to_string(), id.clone()))
            .map(|n| n.clone()))
    }

    fn nodes_with_label(&self, label: &str) -> StorageResult<Vec<GraphNode>> {
        let mut nodes: Vec<GraphNode> = self
            .nodes
            .iter()
            .filter(|n| n.has_label(label))
            .map(|n| n.clone())
            .collect();
        nodes.sort_by(|a, b| {
            a.id
                .cmp(&b.id)
                .then_with(|| a.primary_label().cmp(b.primary_label()))
        });
        Ok(nodes)
    }

    fn node_count(&self) -> StorageResult<usize> {
        Ok(self.nodes.len())
    }

    fn upsert_relationship(&self, rel: &GraphRelationship) -> StorageResult<()> {
        self.check_endpoint(&rel.from_id, &rel.from_label)?;
        self.check_endpoint(&rel.to_id, &rel.to_label)?;
        self.relationships.insert(rel.key(), rel.clone());
        Ok(())
    }

    fn relationships_from(
        &self,
        label: &str,
        id: &NodeId,
    ) -> StorageResult<Vec<GraphRelationship>> {
        let mut rels: Vec<GraphRelationship> = self
            .relationships
            .iter()
            .filter(|r| &r.from_id == id && r.from_label == label)
            .map(|r| r.clone())
            .collect();
        rels.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(rels)
    }

    fn relationship_count(&self) -> StorageResult<usize> {
        Ok(self.relationships.len())
    }
}
