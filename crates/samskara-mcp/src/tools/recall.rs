//! recall tool
//!
//! The read path, one action per recall shape: plain primed recall,
//! resonate, the full nine-phase pipeline, lens views, and exact-tag
//! lookup.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::{Lens, Mind};

use crate::protocol::messages::CallToolResult;

use super::{fail, parse_args, recalls_json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RecallInput {
    action: String,
    query: Option<String>,
    tag: Option<String>,
    lens: Option<String>,
    #[serde(default = "default_k")]
    k: usize,
    #[serde(default = "default_spread")]
    spread: f32,
    #[serde(default = "default_hebbian")]
    hebbian: f32,
}

fn default_k() -> usize {
    10
}

fn default_spread() -> f32 {
    0.5
}

fn default_hebbian() -> f32 {
    0.1
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["recall", "resonate", "full_resonate", "lens", "by_tag"],
                "description": "Which recall shape to run"
            },
            "query": {"type": "string"},
            "tag": {"type": "string", "description": "Exact tag for by_tag"},
            "lens": {"type": "string", "enum": ["manas", "buddhi", "ahamkara", "chitta", "vikalpa", "sakshi"]},
            "k": {"type": "integer", "minimum": 1, "default": 10},
            "spread": {"type": "number", "default": 0.5},
            "hebbian": {"type": "number", "default": 0.1}
        },
        "required": ["action"]
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: RecallInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let mut mind = mind.lock().await;

    let result = match input.action.as_str() {
        "recall" => match require(&input.query, "query") {
            Ok(q) => mind.recall(q, input.k),
            Err(e) => return e,
        },
        "resonate" => match require(&input.query, "query") {
            Ok(q) => mind.resonate(q, input.k, input.spread),
            Err(e) => return e,
        },
        "full_resonate" => match require(&input.query, "query") {
            Ok(q) => mind.full_resonate(q, input.k, input.spread, input.hebbian, None),
            Err(e) => return e,
        },
        "lens" => match require(&input.query, "query") {
            Ok(q) => {
                let lens = Lens::parse_name(input.lens.as_deref().unwrap_or("sakshi"));
                mind.lens_recall(q, lens, input.k)
            }
            Err(e) => return e,
        },
        "by_tag" => match require(&input.tag, "tag") {
            Ok(tag) => mind.recall_by_tag(tag, input.k),
            Err(e) => return e,
        },
        other => {
            return CallToolResult::fail(format!("unknown action: {}", other), "invalid_params")
        }
    };

    match result {
        Ok(recalls) => CallToolResult::ok(
            format!("{} memories resonated", recalls.len()),
            recalls_json(&recalls),
        ),
        Err(e) => fail(&e),
    }
}

fn require<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, CallToolResult> {
    field.as_deref().ok_or_else(|| {
        CallToolResult::fail(format!("missing required field: {}", name), "invalid_params")
    })
}
