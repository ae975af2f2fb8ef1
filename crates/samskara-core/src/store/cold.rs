//! Cold tier
//!
//! An embedded single-writer key-value store on SQLite, keyed by node id.
//! Nodes land here when demoted out of warm or during compaction, and are
//! promoted straight back to hot on access.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::types::{Node, NodeId};

use super::StoreError;

/// SQLite-backed key-value store
pub struct ColdStore {
    conn: Connection,
}

impl ColdStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id          TEXT PRIMARY KEY,
                accessed_ms INTEGER NOT NULL,
                body        BLOB NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_accessed ON nodes(accessed_ms)",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn put(&self, node: &Node) -> Result<(), StoreError> {
        let body = bincode::serialize(node).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO nodes (id, accessed_ms, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET accessed_ms = ?2, body = ?3",
            params![node.id.to_string(), node.tau_accessed as i64, body],
        )?;
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let body: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT body FROM nodes WHERE id = ?1",
                params![id.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        let Some(body) = body else { return Ok(None) };
        match bincode::deserialize(&body) {
            Ok(node) => Ok(Some(node)),
            Err(e) => {
                warn!(%id, "cold record failed to decode: {}", e);
                Ok(None)
            }
        }
    }

    pub fn contains(&self, id: NodeId) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM nodes WHERE id = ?1",
                params![id.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn ids(&self) -> Result<Vec<NodeId>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id FROM nodes")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for id in rows {
            if let Ok(parsed) = id?.parse() {
                ids.push(parsed);
            }
        }
        Ok(ids)
    }

    pub fn remove(&self, id: NodeId) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM nodes WHERE id = ?1", params![id.to_string()])?;
        Ok(n > 0)
    }

    /// Iterate every stored node; order is stable per snapshot
    /// (accessed_ms, then id)
    pub fn for_each(&self, mut f: impl FnMut(Node)) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM nodes ORDER BY accessed_ms, id")?;
        let rows = stmt.query_map([], |r| r.get::<_, Vec<u8>>(0))?;
        for body in rows {
            let body = body?;
            match bincode::deserialize::<Node>(&body) {
                Ok(node) => f(node),
                Err(e) => warn!("cold record skipped during scan: {}", e),
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeType, QuantizedVector};

    fn node(ms: u64) -> Node {
        Node::new(
            NodeType::Episode,
            QuantizedVector::zero(),
            format!("cold {}", ms).into_bytes(),
            0.5,
            ms,
        )
    }

    #[test]
    fn test_put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cold = ColdStore::open(&dir.path().join("cold.kv")).unwrap();
        let n = node(1);
        cold.put(&n).unwrap();
        assert_eq!(cold.len().unwrap(), 1);
        assert_eq!(cold.get(n.id).unwrap().unwrap().payload, n.payload);
        assert!(cold.remove(n.id).unwrap());
        assert!(!cold.remove(n.id).unwrap());
        assert!(cold.get(n.id).unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let cold = ColdStore::open(&dir.path().join("cold.kv")).unwrap();
        let mut n = node(1);
        cold.put(&n).unwrap();
        n.payload = b"replaced".to_vec();
        cold.put(&n).unwrap();
        assert_eq!(cold.len().unwrap(), 1);
        assert_eq!(cold.get(n.id).unwrap().unwrap().text(), "replaced");
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cold.kv");
        let n = node(1);
        {
            let cold = ColdStore::open(&path).unwrap();
            cold.put(&n).unwrap();
        }
        let cold = ColdStore::open(&path).unwrap();
        assert!(cold.get(n.id).unwrap().is_some());
    }

    #[test]
    fn test_for_each_orders_by_access() {
        let dir = tempfile::tempdir().unwrap();
        let cold = ColdStore::open(&dir.path().join("cold.kv")).unwrap();
        let mut a = node(1);
        let mut b = node(2);
        a.tau_accessed = 200;
        b.tau_accessed = 100;
        cold.put(&a).unwrap();
        cold.put(&b).unwrap();

        let mut seen = Vec::new();
        cold.for_each(|n| seen.push(n.id)).unwrap();
        assert_eq!(seen, vec![b.id, a.id]);
    }
}
