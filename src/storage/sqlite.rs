//! SQLite storage backend

use super::traits::{GraphStore, OpenStore, StorageError, StorageResult};
use crate::graph::{GraphNode, GraphRelationship, NodeId, Properties};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed graph store
///
/// One table for nodes keyed by `(primary_label, id)`, one for
/// relationships keyed by both labelled endpoints and the type.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                primary_label TEXT NOT NULL,
                id TEXT NOT NULL,
                labels_json TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                PRIMARY KEY (primary_label, id)
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_id
                ON nodes(id);

            CREATE TABLE IF NOT EXISTS relationships (
                from_label TEXT NOT NULL,
                from_id TEXT NOT NULL,
                relationship TEXT NOT NULL,
                to_label TEXT NOT NULL,
                to_id TEXT NOT NULL,
                PRIMARY KEY (from_label, from_id, relationship, to_label, to_id)
            );

            CREATE INDEX IF NOT EXISTS idx_relationships_to
                ON relationships(to_label, to_id);
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_node(
        conn: &Connection,
        label: &str,
        id: &NodeId,
    ) -> StorageResult<Option<GraphNode>> {
        let row = conn
            .query_row(
                "SELECT labels_json, properties_json FROM nodes
                 WHERE primary_label = ?1 AND id = ?2",
                params![label, id.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((labels_json, properties_json)) => Ok(Some(GraphNode {
                id: id.clone(),
                labels: serde_json::from_str(&labels_json)?,
                properties: serde_json::from_str::<Properties>(&properties_json)?,
            })),
            None => Ok(None),
        }
    }

    /// Any node with this id carrying `label`, primary or not
    fn check_endpoint(conn: &Connection, id: &NodeId, label: &str) -> StorageResult<()> {
        let mut stmt = conn.prepare("SELECT labels_json FROM nodes WHERE id = ?1")?;
        let rows = stmt.query_map(params![id.as_str()], |row| row.get::<_, String>(0))?;
        for labels_json in rows {
            let labels: Vec<String> = serde_json::from_str(&labels_json?)?;
            if labels.iter().any(|l| l == label) {
                return Ok(());
            }
        }
        Err(StorageError::MissingEndpoint {
            id: id.clone(),
            label: label.to_string(),
        })
    }
}

impl OpenStore for SqliteGraphStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::from_connection(conn)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl GraphStore for SqliteGraphStore {
    fn upsert_node(&self, node: &GraphNode) -> StorageResult<()> {
        if node.labels.is_empty() {
            return Err(StorageError::Unlabelled(node.id.clone()));
        }
        let conn = self.conn.lock().unwrap();

        let merged = match Self::read_node(&conn, node.primary_label(), &node.id)? {
            Some(mut existing) => {
                existing.merge(node);
                existing
            }
            None => node.clone(),
        };

        conn.execute(
            "INSERT INTO nodes (primary_label, id, labels_json, properties_json)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(primary_label, id) DO UPDATE SET
                labels_json = excluded.labels_json,
                properties_json = excluded.properties_json",
            params![
                merged.primary_label(),
                merged.id.as_str(),
                serde_json::to_string(&merged.labels)?,
                serde_json::to_string(&merged.properties)?,
            ],
        )?;
        Ok(())
    }

    fn load_node(&self, label: &str, id: &NodeId) -> StorageResult<Option<GraphNode>> {
        let conn = self.conn.lock().unwrap();
        Self::read_node(&conn, label, id)
    }

    fn nodes_with_label(&self, label: &str) -> StorageResult<Vec<GraphNode>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, labels_json, properties_json FROM nodes ORDER BY id, primary_label",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut nodes = Vec::new();
        for row in rows {
            let (id, labels_json, properties_json) = row?;
            let labels: Vec<String> = serde_json::from_str(&labels_json)?;
            if !labels.iter().any(|l| l == label) {
                continue;
            }
            nodes.push(GraphNode {
                id: NodeId::from_string(id),
                labels,
                properties: serde_json::from_str(&properties_json)?,
            });
        }
        Ok(nodes)
    }

    fn node_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn upsert_relationship(&self, rel: &GraphRelationship) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::check_endpoint(&conn, &rel.from_id, &rel.from_label)?;
        Self::check_endpoint(&conn, &rel.to_id, &rel.to_label)?;

        conn.execute(
            "INSERT INTO relationships (from_label, from_id, relationship, to_label, to_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(from_label, from_id, relationship, to_label, to_id) DO NOTHING",
            params![
                rel.from_label,
                rel.from_id.as_str(),
                rel.relationship,
                rel.to_label,
                rel.to_id.as_str(),
            ],
        )?;
        Ok(())
    }

    fn relationships_from(
        &self,
        label: &str,
        id: &NodeId,
    ) -> StorageResult<Vec<GraphRelationship>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT relationship, to_label, to_id FROM relationships
             WHERE from_label = ?1 AND from_id = ?2
             ORDER BY relationship, to_label, to_id",
        )?;
        let rows = stmt.query_map(params![label, id.as_str()], |row| {
            Ok(GraphRelationship {
                from_id: id.clone(),
                from_label: label.to_string(),
                relationship: row.get(0)?,
                to_id: NodeId::from_string(row.get::<_, String>(2)?),
                to_label: row.get(1)?,
            })
        })?;
        let rels = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(rels)
    }

    fn relationship_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphWrite, PropertyValue};

    fn create_test_store() -> SqliteGraphStore {
        SqliteGraphStore::open_in_memory().unwrap()
    }

    fn risk(id: &str) -> GraphNode {
        GraphNode::with_labels(id, ["Risk", "Hazard", "Opportunity"])
            .with_property("severity", "critical")
            .with_property("risk_score", 20i64)
    }

    #[test]
    fn node_roundtrips_labels_and_properties() {
        let store = create_test_store();
        store.upsert_node(&risk("R-1")).unwrap();

        let loaded = store
            .load_node("Risk", &NodeId::from_string("R-1"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.labels, vec!["Risk", "Hazard", "Opportunity"]);
        assert_eq!(loaded.property("risk_score"), Some(&PropertyValue::Int(20)));
    }

    #[test]
    fn upsert_merges_instead_of_replacing() {
        let store = create_test_store();
        store.upsert_node(&GraphNode::new("Z-1", "Zone")).unwrap();
        store
            .upsert_node(&GraphNode::new("Z-1", "Zone").with_property("name", "Tank R-101"))
            .unwrap();
        store
            .upsert_node(
                &GraphNode::with_labels("Z-1", ["Zone", "Area"]).with_property("floor", 2i64),
            )
            .unwrap();

        assert_eq!(store.node_count().unwrap(), 1);
        let zone = store
            .load_node("Zone", &NodeId::from_string("Z-1"))
            .unwrap()
            .unwrap();
        assert_eq!(zone.labels, vec!["Zone", "Area"]);
        assert_eq!(zone.properties.len(), 2);
    }

    // === Scenario: an aspect and an audit both numbered 1 ===
    #[test]
    fn same_id_under_two_primary_labels_is_two_rows() {
        let store = create_test_store();
        store
            .upsert_node(&GraphNode::new("1", "EnvironmentalAspect").with_property("type", "emission"))
            .unwrap();
        store
            .upsert_node(&GraphNode::new("1", "Audit").with_property("type", "internal"))
            .unwrap();

        assert_eq!(store.node_count().unwrap(), 2);
        let aspect = store
            .load_node("EnvironmentalAspect", &NodeId::from("1"))
            .unwrap()
            .unwrap();
        assert_eq!(aspect.labels, vec!["EnvironmentalAspect"]);
        assert_eq!(aspect.property("type"), Some(&PropertyValue::from("emission")));
        assert!(store.load_node("Risk", &NodeId::from("1")).unwrap().is_none());

        store.upsert_node(&risk("R-1")).unwrap();
        store
            .upsert_relationship(&GraphRelationship::new("R-1", "Risk", "EVALUATED_BY", "1", "Audit"))
            .unwrap();
        let rels = store.relationships_from("Risk", &NodeId::from("R-1")).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].to_label, "Audit");
    }

    #[test]
    fn missing_endpoint_is_rejected() {
        let store = create_test_store();
        store.upsert_node(&risk("R-1")).unwrap();
        let rel = GraphRelationship::new("R-1", "Risk", "LOCATED_IN", "Z-404", "Zone");

        assert!(matches!(
            store.upsert_relationship(&rel),
            Err(StorageError::MissingEndpoint { .. })
        ));
        assert_eq!(store.relationship_count().unwrap(), 0);
    }

    // === Scenario: replaying the same batch is idempotent ===
    #[test]
    fn replayed_batch_does_not_duplicate() {
        let store = create_test_store();
        let writes = vec![
            GraphWrite::UpsertNode(risk("R-1")),
            GraphWrite::UpsertNode(GraphNode::new("Z-1", "Zone")),
            GraphWrite::UpsertRelationship(GraphRelationship::new(
                "R-1", "Risk", "LOCATED_IN", "Z-1", "Zone",
            )),
        ];

        store.apply(&writes).unwrap();
        let second = store.apply(&writes).unwrap();

        assert!(second.is_fully_committed());
        assert_eq!(store.node_count().unwrap(), 2);
        assert_eq!(store.relationship_count().unwrap(), 1);

        let rels = store
            .relationships_from("Risk", &NodeId::from_string("R-1"))
            .unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].to_label, "Zone");
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.db");

        {
            let store = SqliteGraphStore::open(&path).unwrap();
            store.upsert_node(&risk("R-1")).unwrap();
        }

        let store = SqliteGraphStore::open(&path).unwrap();
        assert_eq!(store.nodes_with_label("Hazard").unwrap().len(), 1);
        assert!(store.nodes_with_label("Zone").unwrap().is_empty());
    }
}
