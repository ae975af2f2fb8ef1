//! Core data model
//!
//! Identifiers, nodes, edges, confidence, quantized vectors, and the two
//! health readings. Everything here is a plain value; behavior lives in
//! the store, graph, and resonance modules.

mod coherence;
mod confidence;
mod id;
mod node;
mod vector;

pub use coherence::{Coherence, HealthStatus, MindHealth};
pub use confidence::{Confidence, DEFAULT_SIGMA_SQ};
pub use id::{NodeId, ParseNodeIdError};
pub use node::{Edge, EdgeType, Node, NodeType, REALM_TAG_PREFIX};
pub use vector::{cosine_similarity, normalize, QuantizedVector, EMBEDDING_DIM};
