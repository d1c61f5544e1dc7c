//! Declarative adapter specs
//!
//! A source is added by writing a YAML spec, not code:
//!
//! ```yaml
//! platform: permits
//! auth:
//!   required: [api_key]
//! dimensions:
//!   risks_opportunities:
//!     expand: { field: risks, into: category }
//!     fields:
//!       title: [type, permit_type]
//!     derive:
//!       risk_id: "{permit_id}:{category}"
//!       zone_id: "zone:{location | slug}"
//!       status: "open"
//! ```

use super::template::validate_template;
use super::traits::{AdapterError, AdapterResult};
use crate::schema::Dimension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSpec {
    /// Credential keys that must be present and non-empty to connect
    #[serde(default)]
    pub required: Vec<String>,
}

/// Split one raw record into one record per element of an array field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandSpec {
    pub field: String,
    /// Field that receives each element
    pub into: String,
}

/// Mapping table for one dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionMapping {
    /// standard field → candidate source field names, tried in order after
    /// the standard name itself
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,

    /// standard field → template, used only when the source lacks the field
    #[serde(default)]
    pub derive: BTreeMap<String, String>,

    #[serde(default)]
    pub expand: Option<ExpandSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterSpec {
    pub platform: String,
    #[serde(default)]
    pub auth: AuthSpec,
    pub dimensions: BTreeMap<Dimension, DimensionMapping>,
}

impl AdapterSpec {
    pub fn from_yaml_str(yaml: &str) -> AdapterResult<Self> {
        let spec: AdapterSpec = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn load(path: impl AsRef<Path>) -> AdapterResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> AdapterResult<()> {
        if self.platform.trim().is_empty() {
            return Err(AdapterError::InvalidSpec("platform must not be empty".into()));
        }
        for (dimension, mapping) in &self.dimensions {
            for template in mapping.derive.values() {
                validate_template(template).map_err(|e| {
                    AdapterError::InvalidSpec(format!("{}: {}", dimension, e))
                })?;
            }
            if let Some(expand) = &mapping.expand {
                if expand.field.is_empty() || expand.into.is_empty() {
                    return Err(AdapterError::InvalidSpec(format!(
                        "{}: expand needs both field and into",
                        dimension
                    )));
                }
            }
        }
        Ok(())
    }
}
