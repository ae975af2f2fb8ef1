//! Sparse index
//!
//! Plain BM25 over payload text. Tokenization: lowercase, split on
//! non-alphanumerics, drop tokens shorter than two characters. Parameters
//! k1 = 1.5, b = 0.75, IDF with +0.5 smoothing. Membership mirrors the
//! hot tier, like the dense index.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

const K1: f32 = 1.5;
const B: f32 = 0.75;
const MIN_TOKEN_LEN: usize = 2;

/// Split text into BM25 terms
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(|t| t.to_string())
        .collect()
}

/// In-memory BM25 term index with a JSON segment for persistence
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SparseIndex {
    /// Term frequencies per document
    doc_terms: HashMap<NodeId, HashMap<String, u32>>,
    /// Token count per document
    doc_lengths: HashMap<NodeId, u32>,
    /// Number of documents containing each term
    doc_freqs: HashMap<String, u32>,
    /// Sum of all document lengths
    total_len: u64,
}

impl SparseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.doc_terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_terms.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.doc_terms.contains_key(&id)
    }

    /// Index (or re-index) a document; O(|terms|)
    pub fn add(&mut self, id: NodeId, text: &str) {
        if self.contains(id) {
            self.remove(id);
        }
        let tokens = tokenize(text);
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for t in &tokens {
            *freqs.entry(t.clone()).or_default() += 1;
        }
        for term in freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_default() += 1;
        }
        self.total_len += tokens.len() as u64;
        self.doc_lengths.insert(id, tokens.len() as u32);
        self.doc_terms.insert(id, freqs);
    }

    /// Drop a document; O(|terms|)
    pub fn remove(&mut self, id: NodeId) {
        let Some(freqs) = self.doc_terms.remove(&id) else {
            return;
        };
        for term in freqs.keys() {
            if let Some(df) = self.doc_freqs.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.doc_freqs.remove(term);
                }
            }
        }
        if let Some(len) = self.doc_lengths.remove(&id) {
            self.total_len -= len as u64;
        }
    }

    /// Top-k by summed per-term BM25 score; ties broken by id ascending
    pub fn search(&self, query: &str, k: usize) -> Vec<(NodeId, f32)> {
        if self.is_empty() || k == 0 {
            return vec![];
        }
        let terms = tokenize(query);
        if terms.is_empty() {
            return vec![];
        }

        let n = self.doc_terms.len() as f32;
        let avg_len = (self.total_len as f32 / n).max(1.0);

        let mut scores: HashMap<NodeId, f32> = HashMap::new();
        for term in &terms {
            let Some(&df) = self.doc_freqs.get(term) else {
                continue;
            };
            let idf = (1.0 + (n - df as f32 + 0.5) / (df as f32 + 0.5)).ln();
            for (&id, freqs) in &self.doc_terms {
                let Some(&tf) = freqs.get(term) else {
                    continue;
                };
                let tf = tf as f32;
                let dl = *self.doc_lengths.get(&id).unwrap_or(&0) as f32;
                let score = idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / avg_len));
                *scores.entry(id).or_default() += score;
            }
        }

        let mut results: Vec<(NodeId, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(k);
        results
    }

    /// Persist the whole segment as JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_vec(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, body)
    }

    /// Load a persisted segment
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let body = std::fs::read(path)?;
        serde_json::from_slice(&body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn clear(&mut self) {
        self.doc_terms.clear();
        self.doc_lengths.clear();
        self.doc_freqs.clear();
        self.total_len = 0;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_rules() {
        assert_eq!(
            tokenize("The cache-invalidates, on WRITE!"),
            vec!["the", "cache", "invalidates", "on", "write"]
        );
        // Single characters drop out
        assert_eq!(tokenize("a b cd"), vec!["cd"]);
        assert!(tokenize("!!!").is_empty());
    }

    #[test]
    fn test_search_ranks_matching_docs() {
        let mut idx = SparseIndex::new();
        let a = NodeId::generate(1);
        let b = NodeId::generate(2);
        let c = NodeId::generate(3);
        idx.add(a, "the cache invalidates on write");
        idx.add(b, "use write-through for critical data");
        idx.add(c, "unrelated musings about gardening");

        let results = idx.search("cache", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, a);
        assert!(results[0].1 > 0.0);

        let results = idx.search("write", 10);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_remove_updates_frequencies() {
        let mut idx = SparseIndex::new();
        let a = NodeId::generate(1);
        let b = NodeId::generate(2);
        idx.add(a, "cache cache cache");
        idx.add(b, "cache once");

        idx.remove(a);
        assert_eq!(idx.len(), 1);
        let results = idx.search("cache", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, b);

        // Removing an absent id is a no-op
        idx.remove(a);
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_reindex_replaces_terms() {
        let mut idx = SparseIndex::new();
        let a = NodeId::generate(1);
        idx.add(a, "first version about caching");
        idx.add(a, "second version about gardens");
        assert_eq!(idx.len(), 1);
        assert!(idx.search("caching", 5).is_empty());
        assert_eq!(idx.search("gardens", 5).len(), 1);
    }

    #[test]
    fn test_ties_break_by_id_ascending() {
        let mut idx = SparseIndex::new();
        let a = NodeId::generate(1);
        let b = NodeId::generate(2);
        idx.add(a, "identical text");
        idx.add(b, "identical text");
        let results = idx.search("identical", 10);
        assert_eq!(results.len(), 2);
        assert!(results[0].0 < results[1].0);
        assert!((results[0].1 - results[1].1).abs() < 1e-6);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.index");
        let mut idx = SparseIndex::new();
        let a = NodeId::generate(1);
        idx.add(a, "persistent memory segment");
        idx.save(&path).unwrap();

        let loaded = SparseIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.search("segment", 5)[0].0, a);
    }
}
