//! Hot tier
//!
//! An in-process slot arena with a free list for O(1) allocation and an
//! id -> slot map. The slot <-> id mapping stays bijective for
//! every live node.

use std::collections::HashMap;

use crate::types::{Node, NodeId};

/// Capacity-bounded slot array
pub struct HotStore {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    by_id: HashMap<NodeId, usize>,
    capacity: usize,
}

impl HotStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_id: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Insert or replace. Returns the slot, or `None` when the tier is
    /// full and the id is new; the tiered layer demotes and retries.
    pub fn insert(&mut self, node: Node) -> Option<usize> {
        if let Some(&slot) = self.by_id.get(&node.id) {
            self.slots[slot] = Some(node);
            return Some(slot);
        }
        if self.is_full() {
            return None;
        }
        let slot = match self.free.pop() {
            Some(s) => s,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.by_id.insert(node.id, slot);
        self.slots[slot] = Some(node);
        Some(slot)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.by_id.get(&id).and_then(|&s| self.slots[s].as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = *self.by_id.get(&id)?;
        self.slots[slot].as_mut()
    }

    /// Remove a node, tombstoning its slot onto the free list
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.by_id.remove(&id)?;
        let node = self.slots[slot].take();
        self.free.push(slot);
        node
    }

    /// Stable-within-snapshot iteration over live nodes
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.by_id.keys().copied()
    }

    /// The live node with the oldest `tau_accessed`; demotion victim
    pub fn oldest_accessed(&self) -> Option<NodeId> {
        self.iter()
            .min_by(|a, b| {
                a.tau_accessed
                    .cmp(&b.tau_accessed)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|n| n.id)
    }

    /// Debug check of the slot/id bijection
    #[cfg(test)]
    pub fn check_bijection(&self) -> bool {
        if self.by_id.len() != self.slots.iter().filter(|s| s.is_some()).count() {
            return false;
        }
        self.by_id.iter().all(|(&id, &slot)| {
            self.slots
                .get(slot)
                .and_then(|s| s.as_ref())
                .map(|n| n.id == id)
                .unwrap_or(false)
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
