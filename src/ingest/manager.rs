//! IngestionManager: fans out over adapters and dimensions
//!
//! Failures are isolated at two levels: a failing dimension never stops its
//! siblings within one platform, and a failing platform never stops the
//! others in `ingest_all`.

use super::result::{AdapterInfo, DimensionOutcome, IngestionRecord, IngestionResult};
use crate::adapter::{Credentials, Filters, SourceAdapter, StandardRecord};
use crate::normalize::Normalizer;
use crate::schema::Dimension;
use crate::storage::{GraphStore, StorageError};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Adapter not registered: {0}")]
    AdapterNotRegistered(String),

    #[error("Adapter not connected: {0}")]
    NotConnected(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ingestion task failed: {0}")]
    TaskFailed(String),
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

pub struct IngestionManager {
    adapters: DashMap<String, Arc<dyn SourceAdapter>>,
    normalizer: Arc<Normalizer>,
    store: Option<Arc<dyn GraphStore>>,
    history: Mutex<Vec<IngestionRecord>>,
}

impl Default for IngestionManager {
    fn default() -> Self {
        Self::new(Normalizer::default())
    }
}

impl IngestionManager {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            adapters: DashMap::new(),
            normalizer: Arc::new(normalizer),
            store: None,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Write every normalization result into `store`.
    pub fn with_store(mut self, store: Arc<dyn GraphStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register an adapter under its platform tag, replacing any previous one.
    pub fn register_adapter(&self, adapter: Arc<dyn SourceAdapter>) {
        let platform = adapter.platform().to_string();
        info!(%platform, "adapter registered");
        self.adapters.insert(platform, adapter);
    }

    pub fn list_adapters(&self) -> Vec<AdapterInfo> {
        let mut infos: Vec<AdapterInfo> = self
            .adapters
            .iter()
            .map(|entry| AdapterInfo {
                platform: entry.key().clone(),
                connected: entry.value().is_connected(),
                dimensions: entry.value().supported_dimensions().into_iter().collect(),
            })
            .collect();
        infos.sort_by(|a, b| a.platform.cmp(&b.platform));
        infos
    }

    fn adapter(&self, platform: &str) -> IngestResult<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(platform)
            .map(|a| a.value().clone())
            .ok_or_else(|| IngestError::AdapterNotRegistered(platform.to_string()))
    }

    pub async fn connect(&self, platform: &str, credentials: &Credentials) -> IngestResult<bool> {
        let adapter = self.adapter(platform)?;
        Ok(adapter.connect(credentials).await)
    }

    /// Ingest from one platform.
    ///
    /// `dimensions` defaults to everything the adapter supports.
    pub async fn ingest(
        &self,
        platform: &str,
        dimensions: Option<&[Dimension]>,
        filters: &Filters,
    ) -> IngestResult<IngestionResult> {
        let adapter = self.adapter(platform)?;
        let result = run_ingest(
            adapter,
            self.normalizer.clone(),
            self.store.clone(),
            dimensions.map(<[Dimension]>::to_vec),
            filters.clone(),
        )
        .await?;
        self.record(&result);
        Ok(result)
    }

    /// Ingest from every connected platform in parallel.
    pub async fn ingest_all(&self, filters: &Filters) -> BTreeMap<String, IngestResult<IngestionResult>> {
        let mut results = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for entry in self.adapters.iter() {
            if !entry.value().is_connected() {
                continue;
            }
            let platform = entry.key().clone();
            results.insert(
                platform.clone(),
                Err(IngestError::TaskFailed(format!("{} did not complete", platform))),
            );

            let adapter = entry.value().clone();
            let normalizer = self.normalizer.clone();
            let store = self.store.clone();
            let filters = filters.clone();
            tasks.spawn(async move {
                let result = run_ingest(adapter, normalizer, store, None, filters).await;
                (platform, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((platform, result)) => {
                    match &result {
                        Ok(r) => self.record(r),
                        Err(e) => warn!(%platform, error = %e, "platform ingestion failed"),
                    }
                    results.insert(platform, result);
                }
                Err(e) => warn!(error = %e, "ingestion task panicked"),
            }
        }

        results
    }

    pub fn history(&self) -> Vec<IngestionRecord> {
        self.history.lock().unwrap().clone()
    }

    fn record(&self, result: &IngestionResult) {
        self.history.lock().unwrap().push(result.history_entry());
    }
}

/// One platform's ingestion run, detached from the manager so it can be
/// spawned.
async fn run_ingest(
    adapter: Arc<dyn SourceAdapter>,
    normalizer: Arc<Normalizer>,
    store: Option<Arc<dyn GraphStore>>,
    dimensions: Option<Vec<Dimension>>,
    filters: Filters,
) -> IngestResult<IngestionResult> {
    let platform = adapter.platform().to_string();
    if !adapter.is_connected() {
        return Err(IngestError::NotConnected(platform));
    }

    let started_at = Utc::now();
    let clock = Instant::now();
    let ingestion_id = format!("ING-{}", &Uuid::new_v4().simple().to_string()[..8]);
    info!(%platform, %ingestion_id, "ingestion started");

    let supported = adapter.supported_dimensions();
    let requested = dimensions.unwrap_or_else(|| supported.iter().copied().collect());

    let mut outcomes = BTreeMap::new();
    let mut standardized: Vec<StandardRecord> = Vec::new();

    for dimension in requested {
        if !supported.contains(&dimension) {
            warn!(%platform, %dimension, "dimension not supported, skipping");
            outcomes.insert(
                dimension,
                DimensionOutcome::Skipped {
                    reason: format!("{} does not support {}", platform, dimension),
                },
            );
            continue;
        }

        let outcome = match adapter.fetch(dimension, &filters).await {
            Ok(raw) => match adapter.transform(dimension, &raw) {
                Ok(records) => {
                    let outcome = DimensionOutcome::Ingested {
                        raw_count: raw.len(),
                        standardized_count: records.len(),
                    };
                    standardized.extend(records);
                    outcome
                }
                Err(e) => DimensionOutcome::Failed { error: e.to_string() },
            },
            Err(e) => DimensionOutcome::Failed { error: e.to_string() },
        };

        match &outcome {
            DimensionOutcome::Failed { error } => {
                warn!(%platform, %dimension, %error, "dimension failed")
            }
            DimensionOutcome::Ingested { raw_count, standardized_count } => {
                info!(%platform, %dimension, raw_count, standardized_count, "dimension ingested")
            }
            DimensionOutcome::Skipped { .. } => {}
        }
        outcomes.insert(dimension, outcome);
    }

    let normalization = normalizer.normalize(&standardized);

    let store_summary = match store {
        Some(store) => {
            let writes = normalization.writes.clone();
            let summary = tokio::task::spawn_blocking(move || store.apply(&writes))
                .await
                .map_err(|e| IngestError::TaskFailed(e.to_string()))??;
            if !summary.is_fully_committed() {
                warn!(%platform, rejected = summary.rejections.len(), "graph writes rejected");
            }
            Some(summary)
        }
        None => None,
    };

    let duration_ms = clock.elapsed().as_millis() as u64;
    info!(%platform, %ingestion_id, records = standardized.len(), duration_ms, "ingestion finished");

    Ok(IngestionResult {
        ingestion_id,
        platform,
        started_at,
        duration_ms,
        dimensions: outcomes,
        total_records: standardized.len(),
        normalization,
        store: store_summary,
    })
}
