//! status tool
//!
//! Store census plus the two health readings: coherence tau (graph
//! agreement) and vitality psi (store and index health).

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use samskara_core::Mind;

use crate::protocol::messages::CallToolResult;

use super::{fail, parse_args};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StatusInput {
    #[serde(default = "default_action")]
    action: String,
}

fn default_action() -> String {
    "state".to_string()
}

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["state", "coherence", "health"], "default": "state"}
        }
    })
}

pub async fn execute(mind: &Arc<Mutex<Mind>>, args: Option<Value>) -> CallToolResult {
    let input: StatusInput = match parse_args(args) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let mut mind = mind.lock().await;

    match input.action.as_str() {
        "state" => match mind.state() {
            Ok(state) => CallToolResult::ok(
                format!(
                    "{} nodes ({} hot / {} warm / {} cold)",
                    state.total_nodes, state.hot, state.warm, state.cold
                ),
                serde_json::json!(state),
            ),
            Err(e) => fail(&e),
        },
        "coherence" => match mind.coherence() {
            Ok(coherence) => CallToolResult::ok(
                format!("coherence tau {:.3}", coherence.tau()),
                serde_json::json!({
                    "local": coherence.local,
                    "global": coherence.global,
                    "temporal": coherence.temporal,
                    "structural": coherence.structural,
                    "tau": coherence.tau(),
                }),
            ),
            Err(e) => fail(&e),
        },
        "health" => match mind.health() {
            Ok(health) => CallToolResult::ok(
                format!("{} (psi {:.3})", health.status().as_str(), health.psi()),
                serde_json::json!({
                    "structural": health.structural,
                    "semantic": health.semantic,
                    "temporal": health.temporal,
                    "capacity": health.capacity,
                    "psi": health.psi(),
                    "status": health.status().as_str(),
                }),
            ),
            Err(e) => fail(&e),
        },
        other => CallToolResult::fail(format!("unknown action: {}", other), "invalid_params"),
    }
}
