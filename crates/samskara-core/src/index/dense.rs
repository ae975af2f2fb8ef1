//! Dense index
//!
//! Approximate nearest-neighbor search over node embeddings, backed by a
//! USearch HNSW index with cosine metric and i8 scalar quantization.
//! Membership mirrors the hot tier; the whole structure is
//! rebuildable from the hot store at any time.

use std::collections::HashMap;
use std::path::Path;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::types::{NodeId, EMBEDDING_DIM};

/// Dense index error types
#[derive(Debug, thiserror::Error)]
pub enum DenseIndexError {
    #[error("index creation failed: {0}")]
    Creation(String),
    #[error("failed to add vector: {0}")]
    Add(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("invalid dimensions: expected {0}, got {1}")]
    InvalidDimensions(usize, usize),
}

pub type Result<T> = std::result::Result<T, DenseIndexError>;

/// HNSW parameters
#[derive(Debug, Clone, Copy)]
pub struct DenseIndexConfig {
    pub dimensions: usize,
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
}

impl Default for DenseIndexConfig {
    fn default() -> Self {
        Self {
            dimensions: EMBEDDING_DIM,
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
        }
    }
}

/// HNSW index keyed by `NodeId`
pub struct DenseIndex {
    index: Index,
    config: DenseIndexConfig,
    key_of: HashMap<NodeId, u64>,
    id_of: HashMap<u64, NodeId>,
    next_key: u64,
}

impl DenseIndex {
    pub fn new(config: DenseIndexConfig) -> Result<Self> {
        let index = Index::new(&Self::options(&config))
            .map_err(|e| DenseIndexError::Creation(e.to_string()))?;
        Ok(Self {
            index,
            config,
            key_of: HashMap::new(),
            id_of: HashMap::new(),
            next_key: 0,
        })
    }

    fn options(config: &DenseIndexConfig) -> IndexOptions {
        IndexOptions {
            dimensions: config.dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::I8,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            multi: false,
        }
    }

    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.key_of.contains_key(&id)
    }

    /// Add or replace an entry
    pub fn insert(&mut self, id: NodeId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimensions {
            return Err(DenseIndexError::InvalidDimensions(
                self.config.dimensions,
                vector.len(),
            ));
        }

        if let Some(&key) = self.key_of.get(&id) {
            self.index
                .remove(key)
                .map_err(|e| DenseIndexError::Add(e.to_string()))?;
            self.reserve(self.index.size() + 1)?;
            self.index
                .add(key, vector)
                .map_err(|e| DenseIndexError::Add(e.to_string()))?;
            return Ok(());
        }

        // usearch requires reserved capacity before add
        if self.index.size() >= self.index.capacity() {
            let new_capacity = std::cmp::max(self.index.capacity() * 2, 64);
            self.reserve(new_capacity)?;
        }

        let key = self.next_key;
        self.next_key += 1;
        self.index
            .add(key, vector)
            .map_err(|e| DenseIndexError::Add(e.to_string()))?;
        self.key_of.insert(id, key);
        self.id_of.insert(key, id);
        Ok(())
    }

    /// Remove an entry; true if one was present
    pub fn remove(&mut self, id: NodeId) -> Result<bool> {
        if let Some(key) = self.key_of.remove(&id) {
            self.id_of.remove(&key);
            self.index
                .remove(key)
                .map_err(|e| DenseIndexError::Add(e.to_string()))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Top-k by cosine similarity, descending; ties broken by id ascending
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(NodeId, f32)>> {
        if query.len() != self.config.dimensions {
            return Err(DenseIndexError::InvalidDimensions(
                self.config.dimensions,
                query.len(),
            ));
        }
        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let matches = self
            .index
            .search(query, k)
            .map_err(|e| DenseIndexError::Search(e.to_string()))?;

        let mut results = Vec::with_capacity(matches.keys.len());
        for (key, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            if let Some(&id) = self.id_of.get(key) {
                // Cosine distance -> similarity
                results.push((id, 1.0 - distance));
            }
        }
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(results)
    }

    fn reserve(&self, capacity: usize) -> Result<()> {
        self.index
            .reserve(capacity)
            .map_err(|e| DenseIndexError::Creation(format!("reserve failed: {}", e)))
    }

    /// Persist the index plus its id mappings (`<path>.mappings.json`)
    pub fn save(&self, path: &Path) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DenseIndexError::Persistence("invalid path".to_string()))?;
        self.index
            .save(path_str)
            .map_err(|e| DenseIndexError::Persistence(e.to_string()))?;

        let mappings_path = path.with_extension("index.mappings.json");
        let key_of: HashMap<String, u64> = self
            .key_of
            .iter()
            .map(|(id, &k)| (id.to_string(), k))
            .collect();
        let mappings = serde_json::json!({
            "keyOf": key_of,
            "nextKey": self.next_key,
        });
        let body = serde_json::to_string(&mappings)
            .map_err(|e| DenseIndexError::Persistence(e.to_string()))?;
        std::fs::write(&mappings_path, body)
            .map_err(|e| DenseIndexError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Load a persisted index; fails if either file is missing or stale,
    /// in which case the caller rebuilds from the hot store.
    pub fn load(path: &Path, config: DenseIndexConfig) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DenseIndexError::Persistence("invalid path".to_string()))?;
        let index = Index::new(&Self::options(&config))
            .map_err(|e| DenseIndexError::Creation(e.to_string()))?;
        index
            .load(path_str)
            .map_err(|e| DenseIndexError::Persistence(e.to_string()))?;

        let mappings_path = path.with_extension("index.mappings.json");
        let body = std::fs::read_to_string(&mappings_path)
            .map_err(|e| DenseIndexError::Persistence(e.to_string()))?;
        let mappings: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| DenseIndexError::Persistence(e.to_string()))?;

        let raw: HashMap<String, u64> = serde_json::from_value(mappings["keyOf"].clone())
            .map_err(|e| DenseIndexError::Persistence(e.to_string()))?;
        let next_key = mappings["nextKey"]
            .as_u64()
            .ok_or_else(|| DenseIndexError::Persistence("missing nextKey".to_string()))?;

        let mut key_of = HashMap::with_capacity(raw.len());
        let mut id_of = HashMap::with_capacity(raw.len());
        for (id_str, key) in raw {
            let id: NodeId = id_str
                .parse()
                .map_err(|_| DenseIndexError::Persistence(format!("bad id {}", id_str)))?;
            key_of.insert(id, key);
            id_of.insert(key, id);
        }

        Ok(Self {
            index,
            config,
            key_of,
            id_of,
            next_key,
        })
    }

    /// Drop everything; used before a rebuild from the hot store
    pub fn clear(&mut self) -> Result<()> {
        let fresh = Index::new(&Self::options(&self.config))
            .map_err(|e| DenseIndexError::Creation(e.to_string()))?;
        self.index = fresh;
        self.key_of.clear();
        self.id_of.clear();
        self.next_key = 0;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
