//! graph tool
//!
//! Relations: triplet connections with on-demand entities, typed edges
//! between existing nodes, positional triplet queries, confidence
//! propagation, and forgetting with cascade/rewire.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::{EdgeType, Mind};

use crate::protocol::messages::CallToolResult;

use super::{fail, parse_args, parse_id};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GraphInput {
    action: String,
    subject: Option<String>,
    predicate: Option<String>,
    object: Option<String>,
    from: Option<String>,
    to: Option<String>,
    edge_type: Option<String>,
    #[serde(default = "default_weight")]
    weight: f32,
    id: Option<String>,
    delta: Option<f32>,
    #[serde(default = "default_decay_factor")]
    decay_factor: f32,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
    #[serde(default)]
    cascade: bool,
    #[serde(default)]
    rewire: bool,
    #[serde(default = "default_cascade_strength")]
    cascade_strength: f32,
}

fn default_weight() -> f32 {
    0.5
}

fn default_decay_factor() -> f32 {
    0.5
}

fn default_max_depth() -> usize {
    3
}

fn default_cascade_strength() -> f32 {
    0.1
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["connect", "link", "query", "propagate", "forget"],
                "description": "connect = (s,p,o) triplet; link = typed edge between nodes; query = positional triplet lookup; propagate = BFS confidence delta; forget = remove with optional cascade/rewire"
            },
            "subject": {"type": "string"},
            "predicate": {"type": "string"},
            "object": {"type": "string"},
            "from": {"type": "string"},
            "to": {"type": "string"},
            "edgeType": {"type": "string"},
            "weight": {"type": "number", "default": 0.5},
            "id": {"type": "string"},
            "delta": {"type": "number"},
            "decayFactor": {"type": "number", "default": 0.5},
            "maxDepth": {"type": "integer", "default": 3},
            "cascade": {"type": "boolean", "default": false},
            "rewire": {"type": "boolean", "default": false},
            "cascadeStrength": {"type": "number", "default": 0.1}
        },
        "required": ["action"]
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: GraphInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let mut mind = mind.lock().await;

    match input.action.as_str() {
        "connect" => {
            let (Some(s), Some(p), Some(o)) = (&input.subject, &input.predicate, &input.object)
            else {
                return CallToolResult::fail(
                    "connect needs subject, predicate, and object",
                    "invalid_params",
                );
            };
            match mind.connect(s, p, o, input.weight) {
                Ok(()) => CallToolResult::ok(
                    format!("connected ({}) -[{}]-> ({})", s, p, o),
                    serde_json::json!({ "subject": s, "predicate": p, "object": o }),
                ),
                Err(e) => fail(&e),
            }
        }
        "link" => {
            let (Some(from_raw), Some(to_raw)) = (&input.from, &input.to) else {
                return CallToolResult::fail("link needs from and to", "invalid_params");
            };
            let from = match parse_id(from_raw) {
                Ok(id) => id,
                Err(e) => return e,
            };
            let to = match parse_id(to_raw) {
                Ok(id) => id,
                Err(e) => return e,
            };
            let edge_type = EdgeType::parse_name(input.edge_type.as_deref().unwrap_or("relatesto"));
            match mind.connect_nodes(from, to, edge_type, input.weight) {
                Ok(()) => CallToolResult::ok(
                    format!("linked {} -[{}]-> {}", from, edge_type, to),
                    serde_json::json!({ "from": from.to_string(), "to": to.to_string(), "type": edge_type.as_str() }),
                ),
                Err(e) => fail(&e),
            }
        }
        "query" => {
            let triplets = match mind.query_graph(
                input.subject.as_deref().unwrap_or(""),
                input.predicate.as_deref().unwrap_or(""),
                input.object.as_deref().unwrap_or(""),
            ) {
                Ok(t) => t,
                Err(e) => return fail(&e),
            };
            CallToolResult::ok(
                format!("{} triplets", triplets.len()),
                serde_json::json!(triplets),
            )
        }
        "propagate" => {
            let Some(id_raw) = input.id.as_deref() else {
                return CallToolResult::fail("propagate needs id", "invalid_params");
            };
            let id = match parse_id(id_raw) {
                Ok(id) => id,
                Err(e) => return e,
            };
            let delta = input.delta.unwrap_or(0.1);
            match mind.propagate_confidence(id, delta, input.decay_factor, input.max_depth) {
                Ok((applied, total)) => CallToolResult::ok(
                    format!("propagated to {} nodes (total {:.3})", applied.len(), total),
                    serde_json::json!({
                        "applied": applied.iter().map(|(id, d)| serde_json::json!({
                            "id": id.to_string(), "delta": d,
                        })).collect::<Vec<_>>(),
                        "total": total,
                    }),
                ),
                Err(e) => fail(&e),
            }
        }
        "forget" => {
            let Some(id_raw) = input.id.as_deref() else {
                return CallToolResult::fail("forget needs id", "invalid_params");
            };
            let id = match parse_id(id_raw) {
                Ok(id) => id,
                Err(e) => return e,
            };
            match mind.forget(id, input.cascade, input.rewire, input.cascade_strength) {
                Ok(()) => CallToolResult::ok(
                    format!("forgot {}", id),
                    serde_json::json!({ "forgotten": id.to_string() }),
                ),
                Err(e) => fail(&e),
            }
        }
        other => CallToolResult::fail(format!("unknown action: {}", other), "invalid_params"),
    }
}
