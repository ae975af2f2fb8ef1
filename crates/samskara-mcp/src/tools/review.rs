//! review tool
//!
//! Human-in-the-loop quality control over stored memories.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::Mind;

use crate::protocol::messages::CallToolResult;

use super::{fail, parse_args, parse_id};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ReviewInput {
    action: String,
    id: Option<String>,
    #[serde(default = "default_quality")]
    quality: u8,
    text: Option<String>,
}

fn default_quality() -> u8 {
    3
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["submit", "approve", "reject", "edit", "defer", "stats"]},
            "id": {"type": "string"},
            "quality": {"type": "integer", "minimum": 1, "maximum": 5, "default": 3},
            "text": {"type": "string", "description": "Replacement text for edit"}
        },
        "required": ["action"]
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: ReviewInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let mut mind = mind.lock().await;

    if input.action == "stats" {
        let stats = mind.review_stats();
        return CallToolResult::ok(
            format!("{} pending", stats.pending),
            serde_json::json!(stats),
        );
    }

    let id = match input.id.as_deref() {
        Some(raw) => match parse_id(raw) {
            Ok(id) => id,
            Err(e) => return e,
        },
        None => return CallToolResult::fail("missing required field: id", "invalid_params"),
    };

    match input.action.as_str() {
        "submit" => match mind.submit_for_review(id) {
            Ok(()) => CallToolResult::ok(
                format!("{} queued for review", id),
                serde_json::json!({ "submitted": id.to_string() }),
            ),
            Err(e) => fail(&e),
        },
        "approve" => match mind.approve_review(id, input.quality) {
            Ok(effective) => CallToolResult::ok(
                format!("approved; effective confidence {:.3}", effective),
                serde_json::json!({ "effective": effective }),
            ),
            Err(e) => fail(&e),
        },
        "reject" => match mind.reject_review(id, input.quality) {
            Ok(effective) => CallToolResult::ok(
                format!("rejected; effective confidence {:.3}", effective),
                serde_json::json!({ "effective": effective }),
            ),
            Err(e) => fail(&e),
        },
        "edit" => {
            let Some(text) = input.text.as_deref() else {
                return CallToolResult::fail("edit needs text", "invalid_params");
            };
            match mind.edit_review(id, text) {
                Ok(()) => CallToolResult::ok(
                    "edited in review",
                    serde_json::json!({ "edited": id.to_string() }),
                ),
                Err(e) => fail(&e),
            }
        }
        "defer" => match mind.defer_review(id) {
            Ok(()) => CallToolResult::ok(
                "deferred",
                serde_json::json!({ "deferred": id.to_string() }),
            ),
            Err(e) => fail(&e),
        },
        other => CallToolResult::fail(format!("unknown action: {}", other), "invalid_params"),
    }
}
