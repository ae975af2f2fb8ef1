//! Tool handlers
//!
//! One module per tool family. Every module exposes `schema()` describing
//! its input and `execute()` running it against the shared Mind. Tool
//! failures come back as `isError` results with a machine-readable kind;
//! only an unknown tool name surfaces as a JSON-RPC error.

pub mod dynamics;
pub mod graph;
pub mod ledger;
pub mod memory;
pub mod realm;
pub mod recall;
pub mod remember;
pub mod review;
pub mod status;

use serde::de::DeserializeOwned;
use serde_json::Value;

use samskara_core::{MindError, Node, NodeId, Recall};

use crate::protocol::messages::CallToolResult;

/// Deserialize tool arguments, mapping failures to InvalidParams
pub(crate) fn parse_args<T: DeserializeOwned>(args: Option<Value>) -> Result<T, CallToolResult> {
    let value = args.unwrap_or(Value::Object(Default::default()));
    serde_json::from_value(value)
        .map_err(|e| CallToolResult::fail(format!("invalid params: {}", e), "invalid_params"))
}

/// Parse a canonical node id string
pub(crate) fn parse_id(raw: &str) -> Result<NodeId, CallToolResult> {
    raw.parse()
        .map_err(|_| CallToolResult::fail(format!("invalid node id: {}", raw), "invalid_params"))
}

/// Map an engine error onto the failure channel
pub(crate) fn fail(e: &MindError) -> CallToolResult {
    CallToolResult::fail(e.to_string(), e.kind())
}

/// Structured view of a node for the machine channel
pub(crate) fn node_json(node: &Node) -> Value {
    serde_json::json!({
        "id": node.id.to_string(),
        "type": node.node_type.as_str(),
        "text": node.text(),
        "confidence": {
            "mu": node.confidence.mu,
            "sigmaSq": node.confidence.sigma_sq,
            "n": node.confidence.n,
            "effective": node.effective(),
        },
        "tauCreated": node.tau_created,
        "tauAccessed": node.tau_accessed,
        "decayRate": node.decay_rate,
        "epsilon": node.epsilon,
        "tags": node.tags,
        "edges": node.edges.iter().map(|e| serde_json::json!({
            "target": e.target.to_string(),
            "type": e.edge_type.as_str(),
            "weight": e.weight,
        })).collect::<Vec<_>>(),
    })
}

/// Structured view of a ranked recall list
pub(crate) fn recalls_json(recalls: &[Recall]) -> Value {
    Value::Array(
        recalls
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id.to_string(),
                    "type": r.node_type.as_str(),
                    "text": r.text,
                    "confidence": r.confidence,
                    "similarity": r.similarity,
                    "relevance": r.relevance,
                })
            })
            .collect(),
    )
}

// ============================================================================
// TESTS
// ============================================================================
