//! Graph write operations and their Cypher rendering
//!
//! Both operations are upserts. A store applies them by key; the Cypher
//! form is for hosts that forward writes to a property-graph database.

use super::node::GraphNode;
use super::relationship::GraphRelationship;
use serde::Serialize;

/// One idempotent write against the graph store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphWrite {
    UpsertNode(GraphNode),
    UpsertRelationship(GraphRelationship),
}

/// A parameterized Cypher statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CypherStatement {
    pub query: String,
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl GraphWrite {
    pub fn to_cypher(&self) -> CypherStatement {
        match self {
            Self::UpsertNode(node) => node_statement(node),
            Self::UpsertRelationship(rel) => relationship_statement(rel),
        }
    }
}

/// Backtick-quote an identifier unless it is a plain word.
fn quote_ident(ident: &str) -> String {
    let plain = !ident.is_empty()
        && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !ident.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        ident.to_string()
    } else {
        format!("`{}`", ident.replace('`', "``"))
    }
}

fn node_statement(node: &GraphNode) -> CypherStatement {
    let labels: String = node.labels.iter().map(|l| format!(":{}", quote_ident(l))).collect();
    let props: serde_json::Map<_, _> = node
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();

    let mut params = serde_json::Map::new();
    params.insert("id".into(), node.id.as_str().into());
    params.insert("props".into(), serde_json::Value::Object(props));

    CypherStatement {
        query: format!("MERGE (n{} {{id: $id}}) SET n += $props", labels),
        params,
    }
}

fn relationship_statement(rel: &GraphRelationship) -> CypherStatement {
    let mut params = serde_json::Map::new();
    params.insert("from_id".into(), rel.from_id.as_str().into());
    params.insert("to_id".into(), rel.to_id.as_str().into());

    CypherStatement {
        query: format!(
            "MATCH (a:{} {{id: $from_id}}), (b:{} {{id: $to_id}}) MERGE (a)-[r:{}]->(b)",
            quote_ident(&rel.from_label),
            quote_ident(&rel.to_label),
            quote_ident(&rel.relationship),
        ),
        params,
    }
}
