//! dynamics tool
//!
//! The maintenance surface: run a tick, drain feedback, synthesize
//! wisdom, snapshot, and work with attractors.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::{FeedbackTarget, Mind};

use crate::protocol::messages::CallToolResult;

use super::{fail, parse_args, parse_id};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DynamicsInput {
    action: String,
    #[serde(default = "default_max")]
    max: usize,
    #[serde(default = "default_strength")]
    strength: f32,
    id: Option<String>,
    delta: Option<f32>,
}

fn default_max() -> usize {
    5
}

fn default_strength() -> f32 {
    0.02
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["tick", "apply_feedback", "queue_feedback", "synthesize_wisdom", "snapshot", "attractors", "settle"],
                "description": "Dynamics operation to run"
            },
            "max": {"type": "integer", "default": 5, "description": "Attractor cap"},
            "strength": {"type": "number", "default": 0.02, "description": "Settle strength"},
            "id": {"type": "string", "description": "Node for queue_feedback"},
            "delta": {"type": "number", "description": "Signed delta for queue_feedback"}
        },
        "required": ["action"]
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: DynamicsInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let mut mind = mind.lock().await;

    match input.action.as_str() {
        "tick" => match mind.tick() {
            Ok(report) => CallToolResult::ok(
                format!(
                    "tick: {} decayed, {} pruned, {} wisdom",
                    report.decayed, report.pruned, report.wisdom_created
                ),
                serde_json::json!(report),
            ),
            Err(e) => fail(&e),
        },
        "apply_feedback" => match mind.apply_feedback() {
            Ok(applied) => CallToolResult::ok(
                format!("{} feedback entries applied", applied),
                serde_json::json!({ "applied": applied }),
            ),
            Err(e) => fail(&e),
        },
        "queue_feedback" => {
            let Some(id_raw) = input.id.as_deref() else {
                return CallToolResult::fail("queue_feedback needs id", "invalid_params");
            };
            let id = match parse_id(id_raw) {
                Ok(id) => id,
                Err(e) => return e,
            };
            mind.queue_feedback(FeedbackTarget::Confidence(id), input.delta.unwrap_or(0.1));
            CallToolResult::ok("feedback queued", serde_json::json!({ "queued": true }))
        }
        "synthesize_wisdom" => match mind.synthesize_wisdom() {
            Ok(created) => CallToolResult::ok(
                format!("{} wisdom nodes synthesized", created),
                serde_json::json!({ "created": created }),
            ),
            Err(e) => fail(&e),
        },
        "snapshot" => match mind.snapshot() {
            Ok(()) => CallToolResult::ok("snapshot written", serde_json::json!({ "ok": true })),
            Err(e) => fail(&e),
        },
        "attractors" => match mind.find_attractors(input.max) {
            Ok(attractors) => CallToolResult::ok(
                format!("{} attractors", attractors.len()),
                serde_json::json!(attractors),
            ),
            Err(e) => fail(&e),
        },
        "settle" => match mind.run_attractor_dynamics(input.max, input.strength) {
            Ok((attractors, settled)) => CallToolResult::ok(
                format!("{} nodes settled toward {} attractors", settled, attractors.len()),
                serde_json::json!({ "attractors": attractors, "settled": settled }),
            ),
            Err(e) => fail(&e),
        },
        other => CallToolResult::fail(format!("unknown action: {}", other), "invalid_params"),
    }
}
