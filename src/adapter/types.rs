//! Core adapter layer types
//!
//! - RawRecord: one source-native record, untyped JSON object
//! - Filters: equality constraints passed through to a source
//! - Credentials: key/value secrets checked at connect time
//! - StandardRecord: a record after field-mapping into a dimension schema

use crate::schema::Dimension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// A source-native record.
pub type RawRecord = Map<String, Value>;

/// Field equality constraints applied by a record source.
pub type Filters = BTreeMap<String, Value>;

/// Connection credentials, keyed by name (e.g. `api_key`).
pub type Credentials = HashMap<String, String>;

/// One normalized input record.
///
/// Produced by a source adapter's transform step, consumed once by the
/// normalizer. `fields` holds only values the dimension schema declares
/// (required, optional and relationship foreign keys), never nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardRecord {
    pub id: String,
    pub source_platform: String,
    pub dimension: Dimension,
    pub imported_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

impl StandardRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }
}
