//! ledger tool
//!
//! Session-state persistence: save the current working state, load the
//! newest matching ledger, list recent ones.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::Mind;

use crate::protocol::messages::CallToolResult;

use super::{fail, parse_args};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LedgerInput {
    action: String,
    content: Option<String>,
    session: Option<String>,
    project: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["save", "load", "list"]},
            "content": {"type": "string", "description": "Ledger body for save"},
            "session": {"type": "string"},
            "project": {"type": "string"},
            "limit": {"type": "integer", "default": 10}
        },
        "required": ["action"]
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: LedgerInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let mut mind = mind.lock().await;

    match input.action.as_str() {
        "save" => {
            let Some(content) = input.content.as_deref() else {
                return CallToolResult::fail("save needs content", "invalid_params");
            };
            match mind.save_ledger(content, input.session.as_deref(), input.project.as_deref()) {
                Ok(id) => CallToolResult::ok(
                    format!("ledger saved as {}", id),
                    serde_json::json!({ "id": id.to_string() }),
                ),
                Err(e) => fail(&e),
            }
        }
        "load" => {
            match mind.load_ledger(input.session.as_deref(), input.project.as_deref()) {
                Ok(Some((id, content))) => CallToolResult::ok(
                    content.clone(),
                    serde_json::json!({ "id": id.to_string(), "content": content }),
                ),
                Ok(None) => CallToolResult::fail("no matching ledger", "not_found"),
                Err(e) => fail(&e),
            }
        }
        "list" => match mind.list_ledgers(input.limit, input.project.as_deref()) {
            Ok(ledgers) => CallToolResult::ok(
                format!("{} ledgers", ledgers.len()),
                serde_json::json!(ledgers),
            ),
            Err(e) => fail(&e),
        },
        other => CallToolResult::fail(format!("unknown action: {}", other), "invalid_params"),
    }
}
