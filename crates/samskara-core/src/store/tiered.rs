//! Tiered store facade
//!
//! Hot slot arena + warm mmap + cold key-value behind one handle, with the
//! dense and sparse index handles riding along so index membership tracks
//! hot membership by construction. WAL coupling lives one layer up, in
//! the Mind facade.

use tracing::warn;

use crate::config::{files, MindConfig};
use crate::index::{DenseIndex, DenseIndexConfig, SparseIndex};
use crate::types::{Node, NodeId};

use super::cold::ColdStore;
use super::hot::HotStore;
use super::warm::WarmStore;
use super::StoreError;

/// Which tier a node was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

/// The three tiers plus the hot-tier indices
pub struct TieredStore {
    hot: HotStore,
    warm: WarmStore,
    cold: ColdStore,
    dense: DenseIndex,
    sparse: SparseIndex,
}

impl TieredStore {
    /// Open all three tiers under the configured storage root. Index
    /// segments are loaded if present and consistent, otherwise rebuilt
    /// from the hot tier (which starts empty until WAL replay).
    pub fn open(config: &MindConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.storage_root)?;
        let hot = HotStore::new(config.hot_capacity);
        let warm = WarmStore::open(&config.path_of(files::WARM), config.warm_initial_bytes)?;
        let cold = ColdStore::open(&config.path_of(files::COLD))?;

        let dense_config = DenseIndexConfig {
            connectivity: config.dense_connectivity,
            expansion_add: config.dense_expansion_add,
            expansion_search: config.dense_expansion_search,
            ..DenseIndexConfig::default()
        };
        let dense = DenseIndex::new(dense_config)
            .map_err(|e| StoreError::Index(e.to_string()))?;
        let sparse = SparseIndex::new();

        Ok(Self {
            hot,
            warm,
            cold,
            dense,
            sparse,
        })
    }

    // ------------------------------------------------------------------
    // contract surface
    // ------------------------------------------------------------------

    /// Authoritative copy of a node, promoting warm/cold hits into hot.
    /// Promotion copies rather than moves: the warm/cold record stays in
    /// place (hot wins on lookup, and the next snapshot rewrites it), so
    /// peer processes sharing the storage root never lose a node to a
    /// concurrent reader. Tier I/O failures surface as warnings and
    /// `None`, never a crash.
    pub fn get(&mut self, id: NodeId) -> Option<Node> {
        if let Some(n) = self.hot.get(id) {
            return Some(n.clone());
        }

        if self.warm.contains(id) {
            if let Some(node) = self.warm.get(id) {
                if let Err(e) = self.install_hot(node.clone()) {
                    warn!(%id, "promotion to hot failed: {}", e);
                }
                return Some(node);
            }
            return None;
        }

        match self.cold.get(id) {
            Ok(Some(node)) => {
                if let Err(e) = self.install_hot(node.clone()) {
                    warn!(%id, "promotion to hot failed: {}", e);
                }
                Some(node)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%id, "cold read failed: {}", e);
                None
            }
        }
    }

    /// Peek without promotion or cloning of warm/cold bodies into hot
    pub fn peek(&self, id: NodeId) -> Option<Node> {
        if let Some(n) = self.hot.get(id) {
            return Some(n.clone());
        }
        if let Some(n) = self.warm.get(id) {
            return Some(n);
        }
        self.cold.get(id).ok().flatten()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.hot.contains(id)
            || self.warm.contains(id)
            || self.cold.contains(id).unwrap_or(false)
    }

    /// Write into hot, demoting the LRU tail first when full
    pub fn put(&mut self, node: Node) -> Result<(), StoreError> {
        self.install_hot(node)
    }

    /// Read, apply `f`, write back. Returns the updated node.
    pub fn update(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut Node),
    ) -> Result<Option<Node>, StoreError> {
        let Some(mut node) = self.get(id) else {
            return Ok(None);
        };
        f(&mut node);
        let updated = node.clone();
        self.install_hot(node)?;
        Ok(Some(updated))
    }

    /// Tombstone everywhere. Returns the removed node if it existed.
    pub fn remove(&mut self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let mut removed = self.hot.remove(id);
        if removed.is_some() {
            self.deindex(id);
        }
        if self.warm.contains(id) {
            let from_warm = self.warm.get(id);
            self.warm.remove(id)?;
            removed = removed.or(from_warm);
        }
        if self.cold.contains(id).unwrap_or(false) {
            let from_cold = self.cold.get(id).unwrap_or(None);
            self.cold.remove(id)?;
            removed = removed.or(from_cold);
        }
        Ok(removed)
    }

    /// Iterate hot, then warm, then cold; order is unspecified but stable
    /// within a tier for the lifetime of a snapshot. A node promoted but
    /// not yet re-snapshotted exists in two tiers; the hot copy is
    /// authoritative and shadows the rest.
    pub fn for_each_node(&self, mut f: impl FnMut(&Node)) {
        let mut seen: std::collections::HashSet<NodeId> = std::collections::HashSet::new();
        for n in self.hot.iter() {
            seen.insert(n.id);
            f(n);
        }
        self.warm.for_each(|n| {
            if seen.insert(n.id) {
                f(&n);
            }
        });
        let result = self.cold.for_each(|n| {
            if seen.insert(n.id) {
                f(&n);
            }
        });
        if let Err(e) = result {
            warn!("cold scan failed: {}", e);
        }
    }

    /// Which tier currently holds `id`
    pub fn tier_of(&self, id: NodeId) -> Option<Tier> {
        if self.hot.contains(id) {
            Some(Tier::Hot)
        } else if self.warm.contains(id) {
            Some(Tier::Warm)
        } else if self.cold.contains(id).unwrap_or(false) {
            Some(Tier::Cold)
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // hot-tier access for the engine
    // ------------------------------------------------------------------

    pub fn hot(&self) -> &HotStore {
        &self.hot
    }

    pub fn hot_mut(&mut self) -> &mut HotStore {
        &mut self.hot
    }

    pub fn dense(&self) -> &DenseIndex {
        &self.dense
    }

    pub fn sparse(&self) -> &SparseIndex {
        &self.sparse
    }

    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }

    /// Warm entries not shadowed by a hot copy
    pub fn warm_len(&self) -> usize {
        self.warm.ids().filter(|&id| !self.hot.contains(id)).count()
    }

    /// Cold entries not shadowed by a hot or warm copy
    pub fn cold_len(&self) -> usize {
        self.cold
            .ids()
            .unwrap_or_default()
            .into_iter()
            .filter(|&id| !self.hot.contains(id) && !self.warm.contains(id))
            .count()
    }

    pub fn total_len(&self) -> usize {
        self.hot_len() + self.warm_len() + self.cold_len()
    }

    /// Demote the oldest-accessed hot node into warm. Returns its id.
    pub fn demote_oldest(&mut self) -> Result<Option<NodeId>, StoreError> {
        let Some(victim) = self.hot.oldest_accessed() else {
            return Ok(None);
        };
        let Some(node) = self.hot.remove(victim) else {
            return Ok(None);
        };
        self.deindex(victim);
        self.warm.put(&node)?;
        Ok(Some(victim))
    }

    /// Write every hot node through to warm so the on-disk tiers plus the
    /// WAL tail reconstruct the full state after a restart. Called by the
    /// snapshot before compaction.
    pub fn flush_hot_to_warm(&mut self) -> Result<(), StoreError> {
        let nodes: Vec<Node> = self.hot.iter().cloned().collect();
        for node in &nodes {
            self.warm.put(node)?;
        }
        Ok(())
    }

    /// Move long-unused warm nodes into cold; snapshot-path housekeeping.
    /// Hot-shadowed entries stay put, the snapshot has just refreshed them.
    pub fn compact(&mut self, older_than_ms: u64) -> Result<usize, StoreError> {
        let mut stale = Vec::new();
        self.warm.for_each(|n| {
            if n.tau_accessed < older_than_ms && !self.hot.contains(n.id) {
                stale.push(n);
            }
        });
        let moved = stale.len();
        for node in stale {
            self.cold.put(&node)?;
            self.warm.remove(node.id)?;
        }
        self.warm.compact()?;
        Ok(moved)
    }

    /// Flush warm; cold commits per statement
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.warm.flush()
    }

    /// Dense search over the hot tier
    pub fn dense_search(&self, query: &[f32], k: usize) -> Vec<(NodeId, f32)> {
        match self.dense.search(query, k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("dense search failed: {}", e);
                vec![]
            }
        }
    }

    /// Sparse search over the hot tier
    pub fn sparse_search(&self, query: &str, k: usize) -> Vec<(NodeId, f32)> {
        self.sparse.search(query, k)
    }

    /// Check dense-index/hot-tier agreement and rebuild both indices if it
    /// fails. Returns true when a rebuild happened.
    pub fn repair_indices(&mut self) -> Result<bool, StoreError> {
        let expected = self
            .hot
            .iter()
            .filter(|n| !n.embedding.is_zero())
            .count();
        let consistent = self.dense.len() == expected
            && self
                .hot
                .iter()
                .filter(|n| !n.embedding.is_zero())
                .all(|n| self.dense.contains(n.id));
        if consistent {
            return Ok(false);
        }
        warn!(
            dense = self.dense.len(),
            hot = expected,
            "dense index out of step with hot tier; rebuilding"
        );
        self.rebuild_indices()?;
        Ok(true)
    }

    /// Rebuild dense and sparse from the hot tier
    pub fn rebuild_indices(&mut self) -> Result<(), StoreError> {
        self.dense
            .clear()
            .map_err(|e| StoreError::Index(e.to_string()))?;
        self.sparse.clear();
        let nodes: Vec<(NodeId, Vec<f32>, String, bool)> = self
            .hot
            .iter()
            .map(|n| {
                (
                    n.id,
                    n.embedding.dequantize(),
                    n.text(),
                    n.embedding.is_zero(),
                )
            })
            .collect();
        for (id, vec, text, zero) in nodes {
            if !zero {
                self.dense
                    .insert(id, &vec)
                    .map_err(|e| StoreError::Index(e.to_string()))?;
            }
            self.sparse.add(id, &text);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    /// Insert into hot (demoting as needed) and keep both indices in step
    fn install_hot(&mut self, node: Node) -> Result<(), StoreError> {
        let id = node.id;
        while self.hot.is_full() && !self.hot.contains(id) {
            if self.demote_oldest()?.is_none() {
                break;
            }
        }
        let text = node.text();
        let embedding = node.embedding.clone();
        if self.hot.insert(node).is_none() {
            return Err(StoreError::CapacityExhausted);
        }
        if embedding.is_zero() {
            // Zero-embedding nodes (on-demand entities) carry no dense
            // signal; cosine against them is undefined
            let _ = self.dense.remove(id);
        } else if let Err(e) = self.dense.insert(id, &embedding.dequantize()) {
            warn!(%id, "dense insert failed: {}", e);
        }
        self.sparse.add(id, &text);
        Ok(())
    }

    fn deindex(&mut self, id: NodeId) {
        if let Err(e) = self.dense.remove(id) {
            warn!(%id, "dense remove failed: {}", e);
        }
        self.sparse.remove(id);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{normalize, NodeType, QuantizedVector, EMBEDDING_DIM};
    use std::path::PathBuf;

    fn config(root: PathBuf) -> MindConfig {
        let mut cfg = MindConfig::new(root);
        cfg.hot_capacity = 4;
        cfg.warm_initial_bytes = 8192;
        cfg
    }

    fn embedded_node(ms: u64, seed: f32) -> Node {
        let mut v: Vec<f32> = (0..EMBEDDING_DIM)
            .map(|i| ((i as f32 + seed) * 0.3).sin())
            .collect();
        normalize(&mut v);
        Node::new(
            NodeType::Episode,
            QuantizedVector::quantize(&v),
            format!("node {}", ms).into_bytes(),
            0.6,
            ms,
        )
    }

    #[test]
    fn test_put_then_get_from_hot() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TieredStore::open(&config(dir.path().into())).unwrap();
        let n = embedded_node(1, 1.0);
        let id = n.id;
        store.put(n).unwrap();
        assert_eq!(store.tier_of(id), Some(Tier::Hot));
        assert!(store.get(id).is_some());
        assert!(store.dense().contains(id));
        assert!(store.sparse().contains(id));
    }

    #[test]
    fn test_overflow_demotes_lru_and_promotes_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TieredStore::open(&config(dir.path().into())).unwrap();
        let mut ids = Vec::new();
        for i in 0..6u64 {
            let mut n = embedded_node(i, i as f32);
            n.tau_accessed = i * 100;
            ids.push(n.id);
            store.put(n).unwrap();
        }
        assert_eq!(store.hot_len(), 4);
        assert_eq!(store.warm_len(), 2);

        // The two oldest-accessed nodes were demoted; index follows hot
        assert_eq!(store.tier_of(ids[0]), Some(Tier::Warm));
        assert!(!store.dense().contains(ids[0]));

        // Access promotes back into hot (demoting someone else)
        let node = store.get(ids[0]).unwrap();
        assert_eq!(node.id, ids[0]);
        assert_eq!(store.tier_of(ids[0]), Some(Tier::Hot));
        assert!(store.dense().contains(ids[0]));
        assert_eq!(store.hot_len(), 4);
    }

    #[test]
    fn test_remove_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TieredStore::open(&config(dir.path().into())).unwrap();
        let n = embedded_node(1, 1.0);
        let id = n.id;
        store.put(n).unwrap();
        assert!(store.remove(id).unwrap().is_some());
        assert!(store.get(id).is_none());
        assert!(!store.dense().contains(id));
        assert!(!store.sparse().contains(id));
        assert!(store.remove(id).unwrap().is_none());
    }

    #[test]
    fn test_update_reindexes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TieredStore::open(&config(dir.path().into())).unwrap();
        let n = embedded_node(1, 1.0);
        let id = n.id;
        store.put(n).unwrap();
        store
            .update(id, |n| n.payload = b"fresh gardening notes".to_vec())
            .unwrap()
            .unwrap();
        let hits = store.sparse_search("gardening", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, id);
    }

    #[test]
    fn test_for_each_covers_all_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TieredStore::open(&config(dir.path().into())).unwrap();
        for i in 0..6u64 {
            let mut n = embedded_node(i, i as f32);
            n.tau_accessed = i * 100;
            store.put(n).unwrap();
        }
        let mut count = 0;
        store.for_each_node(|_| count += 1);
        assert_eq!(count, 6);
    }

    #[test]
    fn test_repair_indices_detects_drift() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TieredStore::open(&config(dir.path().into())).unwrap();
        let n = embedded_node(1, 1.0);
        let id = n.id;
        store.put(n).unwrap();

        // Sabotage: drop the dense entry behind the store's back
        store.dense.remove(id).unwrap();
        assert!(store.repair_indices().unwrap());
        assert!(store.dense().contains(id));
        // Second check is clean
        assert!(!store.repair_indices().unwrap());
    }

    #[test]
    fn test_compact_moves_stale_warm_to_cold() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TieredStore::open(&config(dir.path().into())).unwrap();
        for i in 0..6u64 {
            let mut n = embedded_node(i, i as f32);
            n.tau_accessed = i * 100;
            store.put(n).unwrap();
        }
        assert_eq!(store.warm_len(), 2);
        let moved = store.compact(10_000).unwrap();
        assert_eq!(moved, 2);
        assert_eq!(store.warm_len(), 0);
        assert_eq!(store.cold_len(), 2);
    }
}
