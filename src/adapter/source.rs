//! Record sources: the transport behind a mapped adapter

use super::traits::{AdapterError, AdapterResult};
use super::types::{Filters, RawRecord};
use crate::schema::Dimension;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Where a mapped adapter gets its raw records from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Check the source is reachable.
    async fn ping(&self) -> AdapterResult<()>;

    async fn fetch(&self, dimension: Dimension, filters: &Filters) -> AdapterResult<Vec<RawRecord>>;
}

fn matches_filters(record: &RawRecord, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(key, expected)| record.get(key) == Some(expected))
}

/// Host-supplied records held in memory.
///
/// Dimensions can be marked failing to model a source that serves some
/// endpoints but not others.
#[derive(Debug, Default)]
pub struct StaticSource {
    records: HashMap<Dimension, Vec<RawRecord>>,
    failing: HashSet<Dimension>,
    unavailable: AtomicBool,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, dimension: Dimension, records: Vec<RawRecord>) -> Self {
        self.records.entry(dimension).or_default().extend(records);
        self
    }

    pub fn with_failing_dimension(mut self, dimension: Dimension) -> Self {
        self.failing.insert(dimension);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Relaxed);
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn ping(&self) -> AdapterResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(AdapterError::SourceUnavailable("static source is offline".into()));
        }
        Ok(())
    }

    async fn fetch(&self, dimension: Dimension, filters: &Filters) -> AdapterResult<Vec<RawRecord>> {
        self.ping().await?;
        if self.failing.contains(&dimension) {
            return Err(AdapterError::SourceUnavailable(format!(
                "endpoint for {} returned an error",
                dimension
            )));
        }
        Ok(self
            .records
            .get(&dimension)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| matches_filters(r, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Reads `<dir>/<dimension>.json`, each file a JSON array of objects.
///
/// A missing file means the source has no records for that dimension.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, dimension: Dimension) -> PathBuf {
        self.dir.join(format!("{}.json", dimension))
    }
}

#[async_trait]
impl RecordSource for JsonDirSource {
    async fn ping(&self) -> AdapterResult<()> {
        let meta = tokio::fs::metadata(&self.dir).await.map_err(|e| {
            AdapterError::SourceUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(AdapterError::SourceUnavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        Ok(())
    }

    async fn fetch(&self, dimension: Dimension, filters: &Filters) -> AdapterResult<Vec<RawRecord>> {
        let path = self.path_for(dimension);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no data file for dimension");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let values: Vec<Value> = serde_json::from_slice(&bytes)?;
        let mut records = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            match value {
                Value::Object(map) => {
                    if matches_filters(&map, filters) {
                        records.push(map);
                    }
                }
                other => {
                    return Err(AdapterError::InvalidRecord(format!(
                        "{} entry {} is not an object: {}",
                        path.display(),
                        i,
                        other
                    )))
                }
            }
        }
        Ok(records)
    }
}
