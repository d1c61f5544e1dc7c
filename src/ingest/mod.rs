//! Ingestion manager: adapters → normalizer → graph store

mod manager;
mod result;

pub use manager::{IngestError, IngestResult, IngestionManager};
pub use result::{AdapterInfo, DimensionOutcome, IngestionRecord, IngestionResult};
