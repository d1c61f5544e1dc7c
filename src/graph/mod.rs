//! Graph vocabulary: nodes, relationships and the writes that upsert them

mod node;
mod relationship;
mod write;

pub use node::{GraphNode, NodeId, NodeKey, Properties, PropertyValue};
pub use relationship::{GraphRelationship, RelationshipKey};
pub use write::{CypherStatement, GraphWrite};
