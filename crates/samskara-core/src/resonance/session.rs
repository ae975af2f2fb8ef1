//! Session context
//!
//! Priming state for the current session: the recent-observations ring,
//! the active intentions, and the goal basin (nodes whose embedding sits
//! within cosine reach of any intention). Refreshed at the top of every
//! resonance call; fed back from every emitted result.

use std::collections::{HashSet, VecDeque};

use crate::store::HotStore;
use crate::types::{NodeId, NodeType};

/// Capacity of the recent-observations ring
pub const RECENT_CAPACITY: usize = 20;

/// Per-session priming state
#[derive(Debug, Default)]
pub struct SessionContext {
    recent: VecDeque<NodeId>,
    intentions: Vec<NodeId>,
    goal_basin: HashSet<NodeId>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute active intentions and the goal basin from the hot tier.
    /// A node joins the basin when its embedding is within cosine
    /// `basin_tau` of any intention's embedding.
    pub fn refresh(&mut self, hot: &HotStore, basin_tau: f32) {
        self.intentions = hot
            .iter()
            .filter(|n| n.node_type == NodeType::Intention)
            .map(|n| n.id)
            .collect();

        self.goal_basin.clear();
        let intention_embeddings: Vec<_> = self
            .intentions
            .iter()
            .filter_map(|&id| hot.get(id))
            .map(|n| n.embedding.clone())
            .filter(|e| !e.is_zero())
            .collect();
        if intention_embeddings.is_empty() {
            return;
        }
        for node in hot.iter() {
            if node.node_type == NodeType::Intention || node.embedding.is_zero() {
                continue;
            }
            if intention_embeddings
                .iter()
                .any(|ie| ie.approx_cosine(&node.embedding) >= basin_tau)
            {
                self.goal_basin.insert(node.id);
            }
        }
    }

    /// Append an emitted id to the ring, evicting the oldest past capacity
    pub fn observe(&mut self, id: NodeId) {
        self.recent.retain(|&r| r != id);
        self.recent.push_back(id);
        while self.recent.len() > RECENT_CAPACITY {
            self.recent.pop_front();
        }
    }

    pub fn is_recent(&self, id: NodeId) -> bool {
        self.recent.contains(&id)
    }

    pub fn is_intention(&self, id: NodeId) -> bool {
        self.intentions.contains(&id)
    }

    pub fn in_goal_basin(&self, id: NodeId) -> bool {
        self.goal_basin.contains(&id)
    }

    pub fn recent(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.recent.iter().copied()
    }

    pub fn intentions(&self) -> &[NodeId] {
        &self.intentions
    }

    /// Drop a forgotten node from every priming structure
    pub fn evict(&mut self, id: NodeId) {
        self.recent.retain(|&r| r != id);
        self.intentions.retain(|&r| r != id);
        self.goal_basin.remove(&id);
    }
}

// ============================================================================
// TESTS
// ============================================================================
