//! Ingestion outcomes

use crate::normalize::NormalizationResult;
use crate::schema::Dimension;
use crate::storage::ApplySummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// What happened to one requested dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DimensionOutcome {
    Ingested {
        raw_count: usize,
        standardized_count: usize,
    },
    /// Not supported by the adapter; a warning, not a failure
    Skipped { reason: String },
    Failed { error: String },
}

impl DimensionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Full result of one `ingest` call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    /// `ING-` followed by eight hex digits
    pub ingestion_id: String,
    pub platform: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub dimensions: BTreeMap<Dimension, DimensionOutcome>,
    /// Standardized records handed to the normalizer
    pub total_records: usize,
    pub normalization: NormalizationResult,
    /// Present when the manager has a graph store attached
    pub store: Option<ApplySummary>,
}

impl IngestionResult {
    pub fn outcome(&self, dimension: Dimension) -> Option<&DimensionOutcome> {
        self.dimensions.get(&dimension)
    }

    pub fn failed_dimensions(&self) -> BTreeSet<Dimension> {
        self.dimensions
            .iter()
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(dim, _)| *dim)
            .collect()
    }

    pub(crate) fn history_entry(&self) -> IngestionRecord {
        IngestionRecord {
            ingestion_id: self.ingestion_id.clone(),
            platform: self.platform.clone(),
            started_at: self.started_at,
            duration_ms: self.duration_ms,
            total_records: self.total_records,
            nodes_created: self.normalization.summary.nodes_created,
            relationships_created: self.normalization.summary.relationships_created,
            failed_dimensions: self.failed_dimensions().len(),
        }
    }
}

/// Compact history entry kept by the manager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionRecord {
    pub ingestion_id: String,
    pub platform: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_records: usize,
    pub nodes_created: usize,
    pub relationships_created: usize,
    pub failed_dimensions: usize,
}

/// Registered adapter as seen by a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterInfo {
    pub platform: String,
    pub connected: bool,
    pub dimensions: Vec<Dimension>,
}
