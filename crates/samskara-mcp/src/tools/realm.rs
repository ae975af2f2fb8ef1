//! realm tool
//!
//! Scope management: read or switch the current realm, create children.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::{Mind, ROOT_REALM};

use crate::protocol::messages::CallToolResult;

use super::{fail, parse_args};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RealmInput {
    action: String,
    name: Option<String>,
    parent: Option<String>,
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["current", "set", "create"]},
            "name": {"type": "string"},
            "parent": {"type": "string", "description": "Parent realm for create; defaults to the root"}
        },
        "required": ["action"]
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: RealmInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let mut mind = mind.lock().await;

    match input.action.as_str() {
        "current" => {
            let current = mind.current_realm().to_string();
            CallToolResult::ok(current.clone(), serde_json::json!({ "realm": current }))
        }
        "set" => {
            let Some(name) = input.name.as_deref() else {
                return CallToolResult::fail("set needs name", "invalid_params");
            };
            match mind.set_realm(name) {
                Ok(()) => CallToolResult::ok(
                    format!("realm is now {}", name),
                    serde_json::json!({ "realm": name }),
                ),
                Err(e) => fail(&e),
            }
        }
        "create" => {
            let Some(name) = input.name.as_deref() else {
                return CallToolResult::fail("create needs name", "invalid_params");
            };
            let parent = input.parent.as_deref().unwrap_or(ROOT_REALM);
            match mind.create_realm(name, parent) {
                Ok(()) => CallToolResult::ok(
                    format!("realm {} created under {}", name, parent),
                    serde_json::json!({ "realm": name, "parent": parent }),
                ),
                Err(e) => fail(&e),
            }
        }
        other => CallToolResult::fail(format!("unknown action: {}", other), "invalid_params"),
    }
}
