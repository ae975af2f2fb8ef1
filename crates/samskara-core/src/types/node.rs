//! Memory nodes and edges
//!
//! A node is a typed, embedded, confidence-weighted record. Edges live
//! inside their source node and hold `NodeId` targets, never references;
//! the reverse direction is served by the graph module's reverse-edge index.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::confidence::Confidence;
use super::id::NodeId;
use super::vector::QuantizedVector;

/// Tag prefix encoding realm membership, e.g. `realm:work`
pub const REALM_TAG_PREFIX: &str = "realm:";

// ============================================================================
// NODE TYPES
// ============================================================================

/// Types of memory nodes. Type selects the default decay rate and the
/// retrieval bias applied during seed scoring.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Distilled, durable insight
    Wisdom,
    /// A held position that evidence can move
    Belief,
    /// An active goal driving the session's goal basin
    Intention,
    /// A long-horizon want
    Aspiration,
    /// A concrete remembered event
    #[default]
    Episode,
    /// A procedure that was carried out
    Operation,
    /// A rule that must hold; protected from pruning
    Invariant,
    /// Who the mind is; protected from pruning
    Identity,
    /// A named concept or definition
    Term,
    /// Something that went wrong, kept prominent
    Failure,
    /// Synthesized during consolidation, fast to fade
    Dream,
    /// A perspective or register of speech
    Voice,
    /// A note about the memory system itself
    Meta,
    /// A known unknown
    Gap,
    /// An open question awaiting an answer
    Question,
    /// A narrative thread across sessions; ledgers live here
    StoryThread,
    /// A named thing referenced by triplets
    Entity,
    /// A reified (subject, predicate, object) relation
    Triplet,
}

impl NodeType {
    pub const ALL: [NodeType; 18] = [
        NodeType::Wisdom,
        NodeType::Belief,
        NodeType::Intention,
        NodeType::Aspiration,
        NodeType::Episode,
        NodeType::Operation,
        NodeType::Invariant,
        NodeType::Identity,
        NodeType::Term,
        NodeType::Failure,
        NodeType::Dream,
        NodeType::Voice,
        NodeType::Meta,
        NodeType::Gap,
        NodeType::Question,
        NodeType::StoryThread,
        NodeType::Entity,
        NodeType::Triplet,
    ];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Wisdom => "wisdom",
            NodeType::Belief => "belief",
            NodeType::Intention => "intention",
            NodeType::Aspiration => "aspiration",
            NodeType::Episode => "episode",
            NodeType::Operation => "operation",
            NodeType::Invariant => "invariant",
            NodeType::Identity => "identity",
            NodeType::Term => "term",
            NodeType::Failure => "failure",
            NodeType::Dream => "dream",
            NodeType::Voice => "voice",
            NodeType::Meta => "meta",
            NodeType::Gap => "gap",
            NodeType::Question => "question",
            NodeType::StoryThread => "storythread",
            NodeType::Entity => "entity",
            NodeType::Triplet => "triplet",
        }
    }

    /// Parse from string name; unknown names fall back to Episode
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "wisdom" => NodeType::Wisdom,
            "belief" => NodeType::Belief,
            "intention" => NodeType::Intention,
            "aspiration" => NodeType::Aspiration,
            "episode" => NodeType::Episode,
            "operation" => NodeType::Operation,
            "invariant" => NodeType::Invariant,
            "identity" => NodeType::Identity,
            "term" => NodeType::Term,
            "failure" => NodeType::Failure,
            "dream" => NodeType::Dream,
            "voice" => NodeType::Voice,
            "meta" => NodeType::Meta,
            "gap" => NodeType::Gap,
            "question" => NodeType::Question,
            "storythread" | "story_thread" => NodeType::StoryThread,
            "entity" => NodeType::Entity,
            "triplet" => NodeType::Triplet,
            _ => NodeType::Episode,
        }
    }

    /// Default decay rate per day, clamped to [0.001, 0.20].
    /// Identity and Invariant barely fade; Dreams fade fast.
    pub fn default_decay_rate(&self) -> f32 {
        match self {
            NodeType::Identity => 0.001,
            NodeType::Invariant => 0.002,
            NodeType::Wisdom | NodeType::Belief => 0.005,
            NodeType::Aspiration | NodeType::Failure | NodeType::Term | NodeType::Entity
            | NodeType::Triplet => 0.01,
            NodeType::Intention | NodeType::Meta | NodeType::StoryThread => 0.02,
            NodeType::Question => 0.03,
            NodeType::Episode | NodeType::Voice | NodeType::Gap => 0.05,
            NodeType::Operation => 0.08,
            NodeType::Dream => 0.10,
        }
    }

    /// Retrieval bias applied during seed scoring
    pub fn retrieval_boost(&self) -> f32 {
        match self {
            NodeType::Failure => 1.2,
            NodeType::Belief | NodeType::Invariant => 1.1,
            NodeType::Episode => 0.9,
            _ => 1.0,
        }
    }

    /// Types exempt from pruning after decay
    pub fn prune_protected(&self) -> bool {
        matches!(
            self,
            NodeType::Invariant | NodeType::Identity | NodeType::Belief
        )
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// EDGES
// ============================================================================

/// Typed relations between nodes
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Similar,
    Supports,
    Contradicts,
    AppliedIn,
    EvolvedFrom,
    PartOf,
    TriggeredBy,
    CreatedBy,
    ScopedTo,
    Answers,
    Addresses,
    Continues,
    Mentions,
    IsA,
    RelatesTo,
}

impl EdgeType {
    pub const ALL: [EdgeType; 15] = [
        EdgeType::Similar,
        EdgeType::Supports,
        EdgeType::Contradicts,
        EdgeType::AppliedIn,
        EdgeType::EvolvedFrom,
        EdgeType::PartOf,
        EdgeType::TriggeredBy,
        EdgeType::CreatedBy,
        EdgeType::ScopedTo,
        EdgeType::Answers,
        EdgeType::Addresses,
        EdgeType::Continues,
        EdgeType::Mentions,
        EdgeType::IsA,
        EdgeType::RelatesTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Similar => "similar",
            EdgeType::Supports => "supports",
            EdgeType::Contradicts => "contradicts",
            EdgeType::AppliedIn => "appliedin",
            EdgeType::EvolvedFrom => "evolvedfrom",
            EdgeType::PartOf => "partof",
            EdgeType::TriggeredBy => "triggeredby",
            EdgeType::CreatedBy => "createdby",
            EdgeType::ScopedTo => "scopedto",
            EdgeType::Answers => "answers",
            EdgeType::Addresses => "addresses",
            EdgeType::Continues => "continues",
            EdgeType::Mentions => "mentions",
            EdgeType::IsA => "isa",
            EdgeType::RelatesTo => "relatesto",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "similar" => EdgeType::Similar,
            "supports" => EdgeType::Supports,
            "contradicts" => EdgeType::Contradicts,
            "appliedin" => EdgeType::AppliedIn,
            "evolvedfrom" => EdgeType::EvolvedFrom,
            "partof" => EdgeType::PartOf,
            "triggeredby" => EdgeType::TriggeredBy,
            "createdby" => EdgeType::CreatedBy,
            "scopedto" => EdgeType::ScopedTo,
            "answers" => EdgeType::Answers,
            "addresses" => EdgeType::Addresses,
            "continues" => EdgeType::Continues,
            "mentions" => EdgeType::Mentions,
            "isa" => EdgeType::IsA,
            _ => EdgeType::RelatesTo,
        }
    }

    /// Stable wire tag for WAL edge deltas
    pub fn wire_tag(&self) -> u8 {
        match self {
            EdgeType::Similar => 0,
            EdgeType::Supports => 1,
            EdgeType::Contradicts => 2,
            EdgeType::AppliedIn => 3,
            EdgeType::EvolvedFrom => 4,
            EdgeType::PartOf => 5,
            EdgeType::TriggeredBy => 6,
            EdgeType::CreatedBy => 7,
            EdgeType::ScopedTo => 8,
            EdgeType::Answers => 9,
            EdgeType::Addresses => 10,
            EdgeType::Continues => 11,
            EdgeType::Mentions => 12,
            EdgeType::IsA => 13,
            EdgeType::RelatesTo => 14,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        EdgeType::ALL.get(tag as usize).copied()
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A weighted, typed, outgoing relation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub target: NodeId,
    pub edge_type: EdgeType,
    /// Weight in [0, 1]
    pub weight: f32,
}

impl Edge {
    pub fn new(target: NodeId, edge_type: EdgeType, weight: f32) -> Self {
        Self {
            target,
            edge_type,
            weight: weight.clamp(0.0, 1.0),
        }
    }
}

// ============================================================================
// NODE
// ============================================================================

/// A memory node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Identity, immutable
    pub id: NodeId,
    /// Type; selects default decay rate and retrieval bias
    pub node_type: NodeType,
    /// Quantized embedding
    pub embedding: QuantizedVector,
    /// Raw content, typically UTF-8 text
    #[serde(with = "serde_bytes_compat")]
    pub payload: Vec<u8>,
    /// Bayesian posterior
    pub confidence: Confidence,
    /// Creation millisecond
    pub tau_created: u64,
    /// Last-access millisecond
    pub tau_accessed: u64,
    /// Decay per day, in [0.001, 0.20]
    pub decay_rate: f32,
    /// Caller-supplied reconstructability hint; carried, never ranked on
    pub epsilon: f32,
    /// Outgoing edges; (target, type) pairs are unique
    pub edges: Vec<Edge>,
    /// Exact-match filter keys; realm membership is a `realm:<name>` tag
    pub tags: BTreeSet<String>,
}

// Payload bytes serialize as base64-free byte arrays under bincode and as a
// plain JSON array of numbers otherwise; the MCP layer renders text views.
mod serde_bytes_compat {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(d)
    }
}

impl Node {
    /// Create a node from text content at `now_ms`
    pub fn new(
        node_type: NodeType,
        embedding: QuantizedVector,
        payload: Vec<u8>,
        mu: f32,
        now_ms: u64,
    ) -> Self {
        Self {
            id: NodeId::generate(now_ms),
            node_type,
            embedding,
            payload,
            confidence: Confidence::new(mu, now_ms),
            tau_created: now_ms,
            tau_accessed: now_ms,
            decay_rate: node_type.default_decay_rate(),
            epsilon: 0.0,
            edges: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Lossy UTF-8 view of the payload. The payload itself stays verbatim.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Record an access
    pub fn touch(&mut self, now_ms: u64) {
        self.tau_accessed = now_ms;
    }

    /// Realm this node is scoped to, if any
    pub fn realm(&self) -> Option<&str> {
        self.tags
            .iter()
            .find_map(|t| t.strip_prefix(REALM_TAG_PREFIX))
    }

    /// Upsert an outgoing edge. Duplicates of (target, type) merge by
    /// max weight. Returns the resulting weight.
    pub fn put_edge(&mut self, target: NodeId, edge_type: EdgeType, weight: f32) -> f32 {
        let weight = weight.clamp(0.0, 1.0);
        if let Some(e) = self
            .edges
            .iter_mut()
            .find(|e| e.target == target && e.edge_type == edge_type)
        {
            e.weight = e.weight.max(weight);
            return e.weight;
        }
        self.edges.push(Edge::new(target, edge_type, weight));
        weight
    }

    /// Set an edge weight exactly (Hebbian and feedback paths)
    pub fn set_edge_weight(&mut self, target: NodeId, edge_type: EdgeType, weight: f32) -> f32 {
        let weight = weight.clamp(0.0, 1.0);
        if let Some(e) = self
            .edges
            .iter_mut()
            .find(|e| e.target == target && e.edge_type == edge_type)
        {
            e.weight = weight;
            return e.weight;
        }
        self.edges.push(Edge::new(target, edge_type, weight));
        weight
    }

    /// Current weight of an edge, if present
    pub fn edge_weight(&self, target: NodeId, edge_type: EdgeType) -> Option<f32> {
        self.edges
            .iter()
            .find(|e| e.target == target && e.edge_type == edge_type)
            .map(|e| e.weight)
    }

    /// Remove an edge; true if one was present
    pub fn remove_edge(&mut self, target: NodeId, edge_type: EdgeType) -> bool {
        let before = self.edges.len();
        self.edges
            .retain(|e| !(e.target == target && e.edge_type == edge_type));
        self.edges.len() != before
    }

    /// Conservative confidence estimate
    pub fn effective(&self) -> f32 {
        self.confidence.effective()
    }
}

// ============================================================================
// TESTS
// ============================================================================
