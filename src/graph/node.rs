//! Node representation in the safety graph

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a graph node, unique across labels
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Typed property values
///
/// There is no null variant: absent and null are the same thing in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<PropertyValue>),
    Object(BTreeMap<String, PropertyValue>),
}

/// Properties collection
pub type Properties = BTreeMap<String, PropertyValue>;

impl PropertyValue {
    /// Convert a JSON value, dropping nulls (including nested ones).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Int(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => Some(Self::Array(items.iter().filter_map(Self::from_json).collect())),
            Value::Object(map) => Some(Self::Object(
                map.iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|pv| (k.clone(), pv)))
                    .collect(),
            )),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Bool(b) => Value::Bool(*b),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Scalar rendering used when a property value becomes an identifier.
    pub fn to_key_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            other => other.to_json().to_string(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Identity of a node: `(primary label, id)`
///
/// Ids are only unique within a dimension, so the same id under two
/// primary labels names two nodes.
pub type NodeKey = (String, NodeId);

/// A labelled node in the safety graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    /// Non-empty; primary label first
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, primary_label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            labels: vec![primary_label.into()],
            properties: Properties::new(),
        }
    }

    pub fn with_labels<I, S>(id: impl Into<NodeId>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn primary_label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or_default()
    }

    pub fn key(&self) -> NodeKey {
        (self.primary_label().to_string(), self.id.clone())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Upsert `other` into this node: labels are unioned (existing order kept),
    /// properties from `other` overwrite same-named ones.
    pub fn merge(&mut self, other: &GraphNode) {
        for label in &other.labels {
            if !self.has_label(label) {
                self.labels.push(label.clone());
            }
        }
        for (key, value) in &other.properties {
            self.properties.insert(key.clone(), value.clone());
        }
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_drops_nulls_at_every_depth() {
        let value = json!({"a": 1, "b": null, "c": [1, null, "x"]});
        let pv = PropertyValue::from_json(&value).unwrap();
        let PropertyValue::Object(map) = pv else {
            panic!("expected object");
        };
        assert!(!map.contains_key("b"));
        assert_eq!(
            map.get("c"),
            Some(&PropertyValue::Array(vec![PropertyValue::Int(1), PropertyValue::from("x")]))
        );
        assert_eq!(PropertyValue::from_json(&json!(null)), None);
    }

    #[test]
    fn merge_unions_labels_and_overwrites_properties() {
        let mut zone = GraphNode::new("zone:tank-r-101", "Zone").with_property("name", "old");
        let enriched = GraphNode::with_labels("zone:tank-r-101", ["Zone", "ConfinedArea"])
            .with_property("name", "Tank R-101")
            .with_property("capacity", 3i64);

        zone.merge(&enriched);

        assert_eq!(zone.labels, vec!["Zone", "ConfinedArea"]);
        assert_eq!(zone.property("name"), Some(&PropertyValue::from("Tank R-101")));
        assert_eq!(zone.property("capacity"), Some(&PropertyValue::Int(3)));
    }

    #[test]
    fn merge_keeps_properties_missing_from_update() {
        let mut node = GraphNode::new("R-1", "Risk").with_property("severity", "high");
        node.merge(&GraphNode::new("R-1", "Risk").with_property("status", "open"));
        assert_eq!(node.properties.len(), 2);
    }

    #[test]
    fn same_id_under_different_primary_labels_has_distinct_keys() {
        let aspect = GraphNode::new("1", "EnvironmentalAspect");
        let audit = GraphNode::new("1", "Audit");
        assert_ne!(aspect.key(), audit.key());
        assert_eq!(audit.key(), ("Audit".to_string(), NodeId::from("1")));
    }

    #[test]
    fn key_string_renders_scalars_plainly() {
        assert_eq!(PropertyValue::Int(42).to_key_string(), "42");
        assert_eq!(PropertyValue::from("R-7").to_key_string(), "R-7");
    }
}
