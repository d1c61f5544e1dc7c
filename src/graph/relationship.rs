//! Directed, typed relationships between nodes

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// A relationship `(from:FromLabel)-[:TYPE]->(to:ToLabel)`.
///
/// Identity covers both endpoints' labels, since node ids are only unique
/// per label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub from_id: NodeId,
    pub from_label: String,
    pub relationship: String,
    pub to_id: NodeId,
    pub to_label: String,
}

/// Merge key of a relationship: `(from_label, from_id, type, to_label, to_id)`
pub type RelationshipKey = (String, NodeId, String, String, NodeId);

impl GraphRelationship {
    pub fn new(
        from_id: impl Into<NodeId>,
        from_label: impl Into<String>,
        relationship: impl Into<String>,
        to_id: impl Into<NodeId>,
        to_label: impl Into<String>,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            from_label: from_label.into(),
            relationship: relationship.into(),
            to_id: to_id.into(),
            to_label: to_label.into(),
        }
    }

    pub fn key(&self) -> RelationshipKey {
        (
            self.from_label.clone(),
            self.from_id.clone(),
            self.relationship.clone(),
            self.to_label.clone(),
            self.to_id.clone(),
        )
    }
}

impl std::fmt::Display for GraphRelationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}:{})-[:{}]->({}:{})",
            self.from_id, self.from_label, self.relationship, self.to_id, self.to_label
        )
    }
}
