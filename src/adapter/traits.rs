//! Source adapter trait and error type

use super::types::{Credentials, Filters, RawRecord, StandardRecord};
use crate::schema::{Dimension, SchemaError};
use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from fetching or transforming source records.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("dimension {0} is not supported by this adapter")]
    UnsupportedDimension(Dimension),

    #[error("record {index} of {dimension} is missing required field {field}")]
    MissingRequiredField {
        dimension: Dimension,
        field: String,
        index: usize,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid adapter spec: {0}")]
    InvalidSpec(String),

    #[error("template error: {0}")]
    Template(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// One external source of HSE records.
///
/// Concrete adapters differ only in how they fetch and which mapping table
/// they declare; the transform algorithm is shared (see `transform_records`).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Platform tag stamped on every record this adapter produces.
    fn platform(&self) -> &str;

    /// Dimensions this adapter can fetch. Static per instance.
    fn supported_dimensions(&self) -> BTreeSet<Dimension>;

    /// Validate credentials and connectivity.
    ///
    /// Returns false instead of failing so a batch can treat the source as
    /// temporarily unusable. Safe to call repeatedly.
    async fn connect(&self, credentials: &Credentials) -> bool;

    fn is_connected(&self) -> bool;

    /// Fetch source-native records. Fails with `SourceUnavailable` when not connected.
    async fn fetch(&self, dimension: Dimension, filters: &Filters) -> AdapterResult<Vec<RawRecord>>;

    /// Map raw records onto the dimension's schema.
    fn transform(
        &self,
        dimension: Dimension,
        raw_records: &[RawRecord],
    ) -> AdapterResult<Vec<StandardRecord>>;
}
