//! Warm tier
//!
//! A memory-mapped append file of serialized nodes. Records are
//! length-prefixed bincode with a one-byte tag so removals survive a
//! restart; the in-memory offset index is rebuilt by walking the file on
//! open. Demoted nodes land here and are promoted back to hot on access.
//!
//! Record layout: `[u32 len][u8 tag][body]` where tag 0 = node (body is
//! bincode), tag 1 = tombstone (body is the raw 16-byte id).

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::warn;

use crate::types::{Node, NodeId};

use super::StoreError;

const TAG_NODE: u8 = 0;
const TAG_TOMBSTONE: u8 = 1;
const PREFIX_LEN: usize = 5;

/// Append-only mmap store with an offset index
pub struct WarmStore {
    path: PathBuf,
    mmap: MmapMut,
    index: HashMap<NodeId, (usize, usize)>,
    free_offset: usize,
    capacity: usize,
}

impl WarmStore {
    /// Open or create the warm file at `path` with at least
    /// `initial_bytes` of capacity, rebuilding the index from its records
    pub fn open(path: &Path, initial_bytes: u64) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let existing = file.metadata()?.len();
        let capacity = existing.max(initial_bytes);
        if existing < capacity {
            file.set_len(capacity)?;
        }

        // Safety: the file is private to this storage root and resized only
        // while no other map of it is held in this process.
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        let mut store = Self {
            path: path.to_path_buf(),
            mmap,
            index: HashMap::new(),
            free_offset: 0,
            capacity: capacity as usize,
        };
        store.rebuild_index();
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.index.keys().copied()
    }

    /// Append a node record; later records for the same id win
    pub fn put(&mut self, node: &Node) -> Result<(), StoreError> {
        let body = bincode::serialize(node).map_err(|e| StoreError::Codec(e.to_string()))?;
        let offset = self.append(TAG_NODE, &body)?;
        self.index.insert(node.id, (offset + PREFIX_LEN, body.len()));
        Ok(())
    }

    /// Read a node back; decode failures surface as warnings and `None`
    pub fn get(&self, id: NodeId) -> Option<Node> {
        let &(offset, len) = self.index.get(&id)?;
        let body = &self.mmap[offset..offset + len];
        match bincode::deserialize(body) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!(%id, "warm record failed to decode: {}", e);
                None
            }
        }
    }

    /// Tombstone an id; true if it was present
    pub fn remove(&mut self, id: NodeId) -> Result<bool, StoreError> {
        if self.index.remove(&id).is_none() {
            return Ok(false);
        }
        let body = id.as_u128().to_le_bytes();
        self.append(TAG_TOMBSTONE, &body)?;
        Ok(true)
    }

    /// Iterate live nodes, decoding lazily; order is file order
    pub fn for_each(&self, mut f: impl FnMut(Node)) {
        // Collect offsets first so decode failures cannot skew iteration
        let mut entries: Vec<(usize, usize)> = self.index.values().copied().collect();
        entries.sort_unstable();
        for (offset, len) in entries {
            let body = &self.mmap[offset..offset + len];
            match bincode::deserialize::<Node>(body) {
                Ok(node) => f(node),
                Err(e) => warn!(offset, "warm record skipped during scan: {}", e),
            }
        }
    }

    /// Rewrite live records only, reclaiming tombstoned and superseded
    /// space. Called from the snapshot path.
    pub fn compact(&mut self) -> Result<(), StoreError> {
        let mut live: Vec<Node> = Vec::with_capacity(self.index.len());
        self.for_each(|n| live.push(n));

        self.mmap[..self.free_offset].fill(0);
        self.index.clear();
        self.free_offset = 0;
        for node in &live {
            self.put(node)?;
        }
        self.flush()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.mmap.flush()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    /// Write `[len][tag][body]` at the free offset, growing if needed.
    /// Returns the record's start offset.
    fn append(&mut self, tag: u8, body: &[u8]) -> Result<usize, StoreError> {
        let needed = PREFIX_LEN + body.len();
        if self.free_offset + needed > self.capacity {
            self.grow(self.free_offset + needed)?;
        }
        let start = self.free_offset;
        let len = (body.len() as u32).to_le_bytes();
        self.mmap[start..start + 4].copy_from_slice(&len);
        self.mmap[start + 4] = tag;
        self.mmap[start + PREFIX_LEN..start + needed].copy_from_slice(body);
        self.free_offset += needed;
        Ok(start)
    }

    fn grow(&mut self, at_least: usize) -> Result<(), StoreError> {
        let new_capacity = (self.capacity * 2).max(at_least);
        self.mmap.flush()?;
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.set_len(new_capacity as u64)?;
        // Safety: same file, same process; the old map is replaced below
        self.mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        self.capacity = new_capacity;
        Ok(())
    }

    /// Walk the file applying records in order; a zero length prefix or a
    /// record overrunning capacity ends the walk
    fn rebuild_index(&mut self) {
        let mut pos = 0usize;
        while pos + PREFIX_LEN <= self.capacity {
            let len =
                u32::from_le_bytes(self.mmap[pos..pos + 4].try_into().unwrap_or_default()) as usize;
            if len == 0 {
                break;
            }
            let tag = self.mmap[pos + 4];
            let body_start = pos + PREFIX_LEN;
            let body_end = body_start + len;
            if body_end > self.capacity {
                warn!(offset = pos, "warm record overruns file; truncating scan");
                break;
            }
            match tag {
                TAG_NODE => {
                    match bincode::deserialize::<Node>(&self.mmap[body_start..body_end]) {
                        Ok(node) => {
                            self.index.insert(node.id, (body_start, len));
                        }
                        Err(e) => warn!(offset = pos, "warm record unreadable: {}", e),
                    }
                }
                TAG_TOMBSTONE if len == 16 => {
                    let raw = u128::from_le_bytes(
                        self.mmap[body_start..body_end].try_into().unwrap_or_default(),
                    );
                    self.index.remove(&NodeId::from_u128(raw));
                }
                other => {
                    warn!(offset = pos, tag = other, "unknown warm record tag; stopping scan");
                    break;
                }
            }
            pos = body_end;
        }
        self.free_offset = pos;
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
            format!("warm {}", ms).into_bytes(),
            0.5,
            ms,
        )
    }

    #[test]
    fn test_put_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut warm = WarmStore::open(&dir.path().join("warm.mmap"), 4096).unwrap();
        let n = node(1);
        warm.put(&n).unwrap();
        assert_eq!(warm.get(n.id).unwrap().payload, n.payload);
        assert!(warm.get(NodeId::generate(99)).is_none());
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warm.mmap");
        let a = node(1);
        let b = node(2);
        {
            let mut warm = WarmStore::open(&path, 4096).unwrap();
            warm.put(&a).unwrap();
            warm.put(&b).unwrap();
            warm.remove(a.id).unwrap();
            warm.flush().unwrap();
        }
        let warm = WarmStore::open(&path, 4096).unwrap();
        assert_eq!(warm.len(), 1);
        assert!(warm.get(a.id).is_none());
        assert!(warm.get(b.id).is_some());
    }

    #[test]
    fn test_later_record_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warm.mmap");
        let mut n = node(1);
        {
            let mut warm = WarmStore::open(&path, 4096).unwrap();
            warm.put(&n).unwrap();
            n.payload = b"second".to_vec();
            warm.put(&n).unwrap();
            warm.flush().unwrap();
        }
        let warm = WarmStore::open(&path, 4096).unwrap();
        assert_eq!(warm.len(), 1);
        assert_eq!(warm.get(n.id).unwrap().text(), "second");
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut warm = WarmStore::open(&dir.path().join("warm.mmap"), 512).unwrap();
        let mut ids = Vec::new();
        for i in 0..32 {
            let n = node(i);
            ids.push(n.id);
            warm.put(&n).unwrap();
        }
        for id in ids {
            assert!(warm.get(id).is_some());
        }
    }

    #[test]
    fn test_compact_reclaims_space() {
        let dir = tempfile::tempdir().unwrap();
        let mut warm = WarmStore::open(&dir.path().join("warm.mmap"), 8192).unwrap();
        let keep = node(1);
        warm.put(&keep).unwrap();
        for i in 2..20 {
            let n = node(i);
            warm.put(&n).unwrap();
            warm.remove(n.id).unwrap();
        }
        let before = warm.free_offset;
        warm.compact().unwrap();
        assert!(warm.free_offset < before);
        assert_eq!(warm.len(), 1);
        assert!(warm.get(keep.id).is_some());
    }
}
