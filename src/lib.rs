//! SafeTwin: HSE knowledge graph ingestion and safety monitoring
//!
//! Records from heterogeneous safety/compliance platforms are mapped onto
//! fifteen canonical dimensions (ISO 45001 / ISO 14001), normalized into
//! typed graph nodes and relationships, and upserted into a graph store.
//! A bounded monitoring workflow scores live signals, plans and executes
//! actions, and escalates to a human above a configured risk threshold.
//!
//! # Core Concepts
//!
//! - **Dimensions**: the fixed schema catalog (`schema`)
//! - **Adapters**: platform sources declared by YAML field mappings (`adapter`)
//! - **Normalization**: standard records → graph writes (`normalize`)
//! - **Sessions**: Perceive → Plan → Act → Learn → Supervise (`workflow`)
//! - **Twins**: versioned entity sets with generated playbooks (`twin`)
//!
//! # Example
//!
//! ```
//! use safetwin::{Dimension, SchemaRegistry};
//!
//! let registry = SchemaRegistry::standard();
//! let schema = registry.schema_for(Dimension::RisksOpportunities).unwrap();
//! assert_eq!(schema.primary_key(), "risk_id");
//! ```

pub mod adapter;
pub mod config;
pub mod graph;
pub mod ingest;
pub mod normalize;
pub mod schema;
pub mod storage;
pub mod twin;
pub mod workflow;

pub use adapter::{
    AdapterError, AdapterSpec, JsonDirSource, MappedAdapter, RawRecord, SourceAdapter,
    StandardRecord, StaticSource,
};
pub use config::{Config, ConfigError, WorkflowConfig};
pub use graph::{GraphNode, GraphRelationship, GraphWrite, NodeId, PropertyValue};
pub use ingest::{DimensionOutcome, IngestError, IngestionManager, IngestionResult};
pub use normalize::{NormalizationResult, Normalizer};
pub use schema::{cnesst_category, CnesstCategory, Dimension, DimensionSchema, SchemaError, SchemaRegistry};
pub use storage::{GraphStore, MemoryGraphStore, OpenStore, SqliteGraphStore, StorageError};
pub use twin::{Playbook, SessionStore, Twin, TwinStore};
pub use workflow::{
    HumanDecision, RiskLevel, SessionState, SessionStatus, Stage, WorkflowEngine, WorkflowError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
