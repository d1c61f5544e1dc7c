//! Canonical HSE dimensions and their schemas
//!
//! The registry is the single source of truth for what a record of each
//! dimension must carry, which graph labels it becomes, and which
//! relationships it may declare.

mod cnesst;
mod dimension;
mod registry;

pub use cnesst::{cnesst_category, CnesstCategory};
pub use dimension::Dimension;
pub use registry::{standard_schemas, DimensionSchema, RelationshipDecl, SchemaRegistry};

use thiserror::Error;

/// Errors from schema lookup and registry construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Invalid schema for {dimension}: {reason}")]
    InvalidSchema { dimension: Dimension, reason: String },

    #[error("Duplicate schema for {0}")]
    DuplicateDimension(Dimension),
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
