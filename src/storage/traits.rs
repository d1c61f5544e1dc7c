//! Storage trait definitions

use crate::graph::{GraphNode, GraphRelationship, GraphWrite, NodeId};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A relationship endpoint is absent or lacks the declared label.
    #[error("Missing endpoint {id} with label {label}")]
    MissingEndpoint { id: NodeId, label: String },

    #[error("Node has no labels: {0}")]
    Unlabelled(NodeId),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Why an individual write was rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RejectionReason {
    /// Relationship references a node that doesn't exist under that label
    MissingEndpoint(NodeId),
    Other(String),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEndpoint(id) => write!(f, "missing endpoint {}", id),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// A single rejected write from a batch.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    /// Human-readable description of what was rejected
    pub description: String,
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn new(description: impl Into<String>, reason: RejectionReason) -> Self {
        Self {
            description: description.into(),
            reason,
        }
    }
}

/// Outcome of applying a batch of writes.
///
/// Partial success is the normal case: valid writes commit even when
/// some relationships are rejected.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub nodes_upserted: usize,
    pub relationships_upserted: usize,
    pub rejections: Vec<Rejection>,
}

impl ApplySummary {
    /// True if no writes were rejected
    pub fn is_fully_committed(&self) -> bool {
        self.rejections.is_empty()
    }
}

/// Trait for graph storage backends
///
/// Every write is an upsert keyed by `(primary label, id)` for nodes and by
/// the labelled endpoints plus type for relationships, so retried or
/// concurrent writes converge. Implementations must be
/// thread-safe (Send + Sync).
pub trait GraphStore: Send + Sync {
    // === Node Operations ===

    /// Insert the node, or merge it into the existing node with the same
    /// primary label and id
    fn upsert_node(&self, node: &GraphNode) -> StorageResult<()>;

    /// The node whose primary label is `label`
    fn load_node(&self, label: &str, id: &NodeId) -> StorageResult<Option<GraphNode>>;

    /// All nodes carrying `label`, ordered by id
    fn nodes_with_label(&self, label: &str) -> StorageResult<Vec<GraphNode>>;

    fn node_count(&self) -> StorageResult<usize>;

    // === Relationship Operations ===

    /// Upsert a relationship. Both endpoints must already exist as a node
    /// with that id carrying the declared label, else
    /// `StorageError::MissingEndpoint`.
    fn upsert_relationship(&self, rel: &GraphRelationship) -> StorageResult<()>;

    /// Relationships originating from `(label, id)`
    fn relationships_from(&self, label: &str, id: &NodeId)
        -> StorageResult<Vec<GraphRelationship>>;

    fn relationship_count(&self) -> StorageResult<usize>;

    // === Batch ===

    /// Apply a batch: all node upserts first, then relationships.
    ///
    /// Relationships with a missing endpoint are rejected individually;
    /// any other storage error aborts the batch.
    fn apply(&self, writes: &[GraphWrite]) -> StorageResult<ApplySummary> {
        let mut summary = ApplySummary::default();

        for write in writes {
            if let GraphWrite::UpsertNode(node) = write {
                self.upsert_node(node)?;
                summary.nodes_upserted += 1;
            }
        }

        for write in writes {
            if let GraphWrite::UpsertRelationship(rel) = write {
                match self.upsert_relationship(rel) {
                    Ok(()) => summary.relationships_upserted += 1,
                    Err(StorageError::MissingEndpoint { id, .. }) => {
                        summary.rejections.push(Rejection::new(
                            rel.to_string(),
                            RejectionReason::MissingEndpoint(id),
                        ));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(summary)
    }
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
