//! memory tool
//!
//! Single-node management: fetch, text/tag views, payload edits,
//! retagging, removal, and confidence adjustments including the Hebbian
//! pair strengthener.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::Mind;

use crate::protocol::messages::CallToolResult;

use super::{fail, node_json, parse_args, parse_id};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MemoryInput {
    action: String,
    id: Option<String>,
    /// Second node for `hebbian`
    other: Option<String>,
    delta: Option<f32>,
    text: Option<String>,
    tags: Option<BTreeSet<String>>,
    epsilon: Option<f32>,
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["get", "text", "tags", "edit", "retag", "remove", "strengthen", "weaken", "hebbian", "epsilon"],
                "description": "What to do with the node"
            },
            "id": {"type": "string", "description": "Node id (canonical dashed hex)"},
            "other": {"type": "string", "description": "Second node id for hebbian"},
            "delta": {"type": "number", "description": "Confidence or edge-weight delta"},
            "text": {"type": "string", "description": "Replacement payload for edit"},
            "tags": {"type": "array", "items": {"type": "string"}},
            "epsilon": {"type": "number"}
        },
        "required": ["action", "id"]
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: MemoryInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let id = match input.id.as_deref() {
        Some(raw) => match parse_id(raw) {
            Ok(id) => id,
            Err(e) => return e,
        },
        None => return CallToolResult::fail("missing required field: id", "invalid_params"),
    };
    let mut mind = mind.lock().await;

    match input.action.as_str() {
        "get" => match mind.get(id) {
            Ok(Some(node)) => CallToolResult::ok(node.text(), node_json(&node)),
            Ok(None) => CallToolResult::fail(format!("node {} not found", id), "not_found"),
            Err(e) => fail(&e),
        },
        "text" => match mind.text(id) {
            Ok(Some(text)) => CallToolResult::ok(text.clone(), serde_json::json!({ "text": text })),
            Ok(None) => CallToolResult::fail(format!("node {} not found", id), "not_found"),
            Err(e) => fail(&e),
        },
        "tags" => match mind.tags(id) {
            Ok(Some(tags)) => CallToolResult::ok(
                format!("{} tags", tags.len()),
                serde_json::json!({ "tags": tags }),
            ),
            Ok(None) => CallToolResult::fail(format!("node {} not found", id), "not_found"),
            Err(e) => fail(&e),
        },
        "edit" => {
            let Some(text) = input.text else {
                return CallToolResult::fail("missing required field: text", "invalid_params");
            };
            let payload = text.into_bytes();
            match mind.update_node(id, move |n| n.payload = payload) {
                Ok(node) => CallToolResult::ok("payload updated", node_json(&node)),
                Err(e) => fail(&e),
            }
        }
        "retag" => {
            let Some(tags) = input.tags else {
                return CallToolResult::fail("missing required field: tags", "invalid_params");
            };
            match mind.update_node(id, move |n| n.tags = tags) {
                Ok(node) => CallToolResult::ok("tags replaced", node_json(&node)),
                Err(e) => fail(&e),
            }
        }
        "remove" => match mind.remove_node(id) {
            Ok(()) => CallToolResult::ok(
                format!("removed {}", id),
                serde_json::json!({ "removed": id.to_string() }),
            ),
            Err(e) => fail(&e),
        },
        "strengthen" | "weaken" => {
            let delta = input.delta.unwrap_or(0.1);
            let result = if input.action == "strengthen" {
                mind.strengthen(id, delta)
            } else {
                mind.weaken(id, delta)
            };
            match result {
                Ok(effective) => CallToolResult::ok(
                    format!("effective confidence now {:.3}", effective),
                    serde_json::json!({ "effective": effective }),
                ),
                Err(e) => fail(&e),
            }
        }
        "hebbian" => {
            let other = match input.other.as_deref() {
                Some(raw) => match parse_id(raw) {
                    Ok(other) => other,
                    Err(e) => return e,
                },
                None => {
                    return CallToolResult::fail("missing required field: other", "invalid_params")
                }
            };
            match mind.hebbian_strengthen(id, other, input.delta.unwrap_or(0.1)) {
                Ok(()) => CallToolResult::ok(
                    "similar edges reinforced",
                    serde_json::json!({ "a": id.to_string(), "b": other.to_string() }),
                ),
                Err(e) => fail(&e),
            }
        }
        "epsilon" => {
            let epsilon = input.epsilon.unwrap_or(0.0).clamp(0.0, 1.0);
            match mind.update_node(id, move |n| n.epsilon = epsilon) {
                Ok(node) => CallToolResult::ok("epsilon updated", node_json(&node)),
                Err(e) => fail(&e),
            }
        }
        other => CallToolResult::fail(format!("unknown action: {}", other), "invalid_params"),
    }
}
