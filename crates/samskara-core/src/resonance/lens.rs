//! Lenses
//!
//! A lens re-weights retrieval without subclassing anything: it is a plain
//! value record of per-type attention, a confidence bias, and per-edge-type
//! preferences consumed by the resonance engine. The six named lenses are
//! fixed vocabulary; `parse_name` falls back to the neutral witness.

use std::collections::HashMap;

use crate::types::{EdgeType, NodeType};

/// Retrieval re-weighting consumed by the resonance engine
#[derive(Debug, Clone, Default)]
pub struct Lens {
    /// Replaces the default type-boost table; absent types default to 1.0
    pub attention: HashMap<NodeType, f32>,
    /// Added to the confidence share of the seed score
    pub bias: f32,
    /// Spread multipliers per edge type; absent types default to 1.0
    pub edge_preferences: HashMap<EdgeType, f32>,
}

impl Lens {
    /// Attention weight for a node type
    pub fn attention_for(&self, t: NodeType) -> f32 {
        self.attention.get(&t).copied().unwrap_or(1.0)
    }

    /// Spread preference for an edge type
    pub fn edge_preference(&self, t: EdgeType) -> f32 {
        self.edge_preferences.get(&t).copied().unwrap_or(1.0)
    }

    /// The acting mind: what happened and what was done
    pub fn manas() -> Self {
        Self {
            attention: HashMap::from([
                (NodeType::Episode, 1.3),
                (NodeType::Operation, 1.2),
                (NodeType::Entity, 1.1),
            ]),
            bias: -0.1,
            edge_preferences: HashMap::from([
                (EdgeType::TriggeredBy, 1.3),
                (EdgeType::AppliedIn, 1.2),
            ]),
        }
    }

    /// The discriminating intellect: what is known to hold
    pub fn buddhi() -> Self {
        Self {
            attention: HashMap::from([
                (NodeType::Wisdom, 1.3),
                (NodeType::Invariant, 1.2),
                (NodeType::Belief, 1.1),
            ]),
            bias: 0.2,
            edge_preferences: HashMap::from([
                (EdgeType::Supports, 1.3),
                (EdgeType::Contradicts, 1.2),
            ]),
        }
    }

    /// The sense of self: who the mind is and wants to be
    pub fn ahamkara() -> Self {
        Self {
            attention: HashMap::from([
                (NodeType::Identity, 1.4),
                (NodeType::Aspiration, 1.2),
                (NodeType::Voice, 1.1),
            ]),
            bias: 0.1,
            edge_preferences: HashMap::from([(EdgeType::CreatedBy, 1.2)]),
        }
    }

    /// The memory substrate: threads and accumulated experience
    pub fn chitta() -> Self {
        Self {
            attention: HashMap::from([
                (NodeType::StoryThread, 1.3),
                (NodeType::Episode, 1.2),
                (NodeType::Dream, 1.1),
            ]),
            bias: 0.0,
            edge_preferences: HashMap::from([
                (EdgeType::Continues, 1.3),
                (EdgeType::EvolvedFrom, 1.2),
            ]),
        }
    }

    /// Imagination and doubt: the open and the unknown
    pub fn vikalpa() -> Self {
        Self {
            attention: HashMap::from([
                (NodeType::Question, 1.3),
                (NodeType::Gap, 1.2),
                (NodeType::Dream, 1.2),
            ]),
            bias: -0.2,
            edge_preferences: HashMap::from([
                (EdgeType::Answers, 1.3),
                (EdgeType::Addresses, 1.2),
            ]),
        }
    }

    /// The witness: observes without preference
    pub fn sakshi() -> Self {
        Self {
            attention: HashMap::from([(NodeType::Meta, 1.2)]),
            bias: 0.0,
            edge_preferences: HashMap::new(),
        }
    }

    /// Look a lens up by name; unknown names get the witness
    pub fn parse_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "manas" => Self::manas(),
            "buddhi" => Self::buddhi(),
            "ahamkara" => Self::ahamkara(),
            "chitta" => Self::chitta(),
            "vikalpa" => Self::vikalpa(),
            _ => Self::sakshi(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
