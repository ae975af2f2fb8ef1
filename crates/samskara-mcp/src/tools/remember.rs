//! remember tool
//!
//! The write path. Text form requires an embedder; the vector form is the
//! mirror for callers without one, per the engine's dual API.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::{Mind, NodeType};

use crate::protocol::messages::CallToolResult;

use super::{fail, parse_args};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RememberInput {
    /// Text to embed and store; mutually exclusive with `vector`
    text: Option<String>,
    /// Explicit 384-float embedding for embedder-less callers
    vector: Option<Vec<f32>>,
    /// Payload for the vector form (defaults to empty)
    payload: Option<String>,
    #[serde(rename = "type")]
    node_type: String,
    confidence: Option<f32>,
    #[serde(default)]
    tags: BTreeSet<String>,
    /// Reconstructability hint; carried, never ranked on
    epsilon: Option<f32>,
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "text": {"type": "string", "description": "Content to embed and remember"},
            "vector": {"type": "array", "items": {"type": "number"}, "description": "Explicit 384-dim embedding (no embedder required)"},
            "payload": {"type": "string", "description": "Payload text for the vector form"},
            "type": {"type": "string", "description": "Node type (wisdom, belief, intention, episode, failure, ...)"},
            "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "tags": {"type": "array", "items": {"type": "string"}},
            "epsilon": {"type": "number", "minimum": 0.0, "maximum": 1.0}
        },
        "required": ["type"]
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: RememberInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let node_type = NodeType::parse_name(&input.node_type);

    let mut mind = mind.lock().await;
    let stored = match (&input.text, &input.vector) {
        (Some(text), None) => mind.remember(text, node_type, input.confidence, input.tags),
        (None, Some(vector)) => mind.remember_with_vector(
            node_type,
            vector,
            input.confidence,
            input.payload.clone().unwrap_or_default().into_bytes(),
            input.tags,
        ),
        _ => {
            return CallToolResult::fail(
                "provide exactly one of `text` or `vector`",
                "invalid_params",
            )
        }
    };

    let id = match stored {
        Ok(id) => id,
        Err(e) => return fail(&e),
    };
    if let Some(epsilon) = input.epsilon {
        if let Err(e) = mind.update_node(id, |n| n.epsilon = epsilon.clamp(0.0, 1.0)) {
            return fail(&e);
        }
    }

    CallToolResult::ok(
        format!("Remembered {} as {}", node_type, id),
        serde_json::json!({ "id": id.to_string(), "type": node_type.as_str() }),
    )
}
