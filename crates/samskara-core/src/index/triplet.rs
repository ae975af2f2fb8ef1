//! Triplet and entity index
//!
//! `(subject, predicate, object)` relations stored beside the node graph.
//! Every endpoint maps to an Entity node (created on demand by the graph
//! layer) so traversal sees triplets through `Mentions` edges; this index
//! answers the positional queries.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// A stored relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triplet {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub weight: f32,
}

/// Triplet records plus the entity-name -> node map
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TripletIndex {
    triplets: Vec<Triplet>,
    /// Entity name -> its on-demand Entity node
    entities: HashMap<String, NodeId>,
}

impl TripletIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// Insert a relation; duplicates of (s, p, o) merge by max weight.
    /// Returns the resulting weight.
    pub fn add(&mut self, subject: &str, predicate: &str, object: &str, weight: f32) -> f32 {
        let weight = weight.clamp(0.0, 1.0);
        if let Some(t) = self.triplets.iter_mut().find(|t| {
            t.subject == subject && t.predicate == predicate && t.object == object
        }) {
            t.weight = t.weight.max(weight);
            return t.weight;
        }
        self.triplets.push(Triplet {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            weight,
        });
        weight
    }

    /// Query with any subset of positions bound; empty strings match all
    pub fn query(&self, subject: &str, predicate: &str, object: &str) -> Vec<Triplet> {
        self.triplets
            .iter()
            .filter(|t| {
                (subject.is_empty() || t.subject == subject)
                    && (predicate.is_empty() || t.predicate == predicate)
                    && (object.is_empty() || t.object == object)
            })
            .cloned()
            .collect()
    }

    /// Drop every triplet touching an entity name (forget path)
    pub fn remove_entity(&mut self, name: &str) {
        self.triplets
            .retain(|t| t.subject != name && t.object != name);
        self.entities.remove(name);
    }

    /// The Entity node for `name`, if one was created
    pub fn entity(&self, name: &str) -> Option<NodeId> {
        self.entities.get(name).copied()
    }

    /// Entity name for a node id, if this id backs an entity
    pub fn entity_name(&self, id: NodeId) -> Option<&str> {
        self.entities
            .iter()
            .find_map(|(name, &nid)| (nid == id).then_some(name.as_str()))
    }

    /// Record the Entity node backing `name`
    pub fn set_entity(&mut self, name: &str, id: NodeId) {
        self.entities.insert(name.to_string(), id);
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_vec(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, body)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let body = std::fs::read(path)?;
        serde_json::from_slice(&body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_merges_by_max_weight() {
        let mut idx = TripletIndex::new();
        idx.add("jwt", "prevents", "session-state", 0.4);
        idx.add("jwt", "prevents", "session-state", 0.7);
        idx.add("jwt", "prevents", "session-state", 0.5);
        assert_eq!(idx.len(), 1);
        assert!((idx.query("jwt", "", "")[0].weight - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_positional_query() {
        let mut idx = TripletIndex::new();
        idx.add("jwt", "prevents", "session-state", 0.5);
        idx.add("jwt", "uses", "signatures", 0.5);
        idx.add("redis", "stores", "session-state", 0.5);

        assert_eq!(idx.query("jwt", "", "").len(), 2);
        assert_eq!(idx.query("", "", "session-state").len(), 2);
        assert_eq!(idx.query("jwt", "prevents", "").len(), 1);
        assert_eq!(idx.query("", "", "").len(), 3);
        assert!(idx.query("nope", "", "").is_empty());
    }

    #[test]
    fn test_entity_mapping() {
        let mut idx = TripletIndex::new();
        let id = NodeId::generate(1);
        assert!(idx.entity("jwt").is_none());
        idx.set_entity("jwt", id);
        assert_eq!(idx.entity("jwt"), Some(id));
        assert_eq!(idx.entity_name(id), Some("jwt"));
    }

    #[test]
    fn test_remove_entity_drops_touching_triplets() {
        let mut idx = TripletIndex::new();
        idx.add("a", "rel", "b", 0.5);
        idx.add("b", "rel", "c", 0.5);
        idx.add("c", "rel", "d", 0.5);
        idx.set_entity("b", NodeId::generate(1));

        idx.remove_entity("b");
        assert_eq!(idx.len(), 1);
        assert!(idx.entity("b").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triplets.index");
        let mut idx = TripletIndex::new();
        idx.add("jwt", "prevents", "session-state", 0.9);
        idx.set_entity("jwt", NodeId::generate(1));
        idx.save(&path).unwrap();

        let loaded = TripletIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.entity("jwt").is_some());
    }
}
