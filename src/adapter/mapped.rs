//! MappedAdapter: an adapter defined entirely by a spec and a record source

use super::mapping::transform_records;
use super::source::RecordSource;
use super::spec::AdapterSpec;
use super::traits::{AdapterError, AdapterResult, SourceAdapter};
use super::types::{Credentials, Filters, RawRecord, StandardRecord};
use crate::schema::{Dimension, SchemaRegistry};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A source adapter configured by data.
///
/// The spec supplies the platform tag, required credentials and mapping
/// tables; the `RecordSource` supplies the records.
pub struct MappedAdapter {
    spec: AdapterSpec,
    source: Arc<dyn RecordSource>,
    registry: Arc<SchemaRegistry>,
    connected: AtomicBool,
}

impl MappedAdapter {
    pub fn new(spec: AdapterSpec, source: Arc<dyn RecordSource>) -> Self {
        Self::with_registry(spec, source, SchemaRegistry::standard())
    }

    pub fn with_registry(
        spec: AdapterSpec,
        source: Arc<dyn RecordSource>,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            spec,
            source,
            registry,
            connected: AtomicBool::new(false),
        }
    }

    pub fn spec(&self) -> &AdapterSpec {
        &self.spec
    }

    fn missing_credentials(&self, credentials: &Credentials) -> Vec<&str> {
        self.spec
            .auth
            .required
            .iter()
            .filter(|key| {
                credentials
                    .get(key.as_str())
                    .map_or(true, |v| v.trim().is_empty())
            })
            .map(String::as_str)
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for MappedAdapter {
    fn platform(&self) -> &str {
        &self.spec.platform
    }

    fn supported_dimensions(&self) -> BTreeSet<Dimension> {
        self.spec
            .dimensions
            .keys()
            .copied()
            .filter(|d| self.registry.contains(*d))
            .collect()
    }

    async fn connect(&self, credentials: &Credentials) -> bool {
        let missing = self.missing_credentials(credentials);
        if !missing.is_empty() {
            warn!(platform = %self.spec.platform, ?missing, "missing credentials");
            self.connected.store(false, Ordering::Relaxed);
            return false;
        }

        match self.source.ping().await {
            Ok(()) => {
                info!(platform = %self.spec.platform, "connected");
                self.connected.store(true, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(platform = %self.spec.platform, error = %e, "connection check failed");
                self.connected.store(false, Ordering::Relaxed);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn fetch(&self, dimension: Dimension, filters: &Filters) -> AdapterResult<Vec<RawRecord>> {
        if !self.is_connected() {
            return Err(AdapterError::SourceUnavailable(format!(
                "{} is not connected",
                self.spec.platform
            )));
        }
        if !self.spec.dimensions.contains_key(&dimension) {
            return Err(AdapterError::UnsupportedDimension(dimension));
        }

        let records = self.source.fetch(dimension, filters).await?;
        debug!(platform = %self.spec.platform, %dimension, count = records.len(), "fetched");
        Ok(records)
    }

    fn transform(
        &self,
        dimension: Dimension,
        raw_records: &[RawRecord],
    ) -> AdapterResult<Vec<StandardRecord>> {
        let mapping = self
            .spec
            .dimensions
            .get(&dimension)
            .ok_or(AdapterError::UnsupportedDimension(dimension))?;
        let schema = self.registry.schema_for(dimension)?;
        transform_records(&self.spec.platform, schema, mapping, raw_records, Utc::now())
    }
}
