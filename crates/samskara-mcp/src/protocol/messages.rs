//! MCP message shapes
//!
//! Request and result payloads for `initialize`, `tools/list`, and
//! `tools/call`. Tool results carry a human text channel and a structured
//! machine channel; all text is valid UTF-8 by construction (payload
//! bytes pass through lossy replacement in the core before reaching us).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::PROTOCOL_VERSION;

// ============================================================================
// INITIALIZE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub client_info: Value,
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl Default for InitializeRequest {
    fn default() -> Self {
        Self {
            protocol_version: default_protocol_version(),
            capabilities: Value::Null,
            client_info: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: ServerInfo,
    pub capabilities: ServerCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<HashMap<String, Value>>,
}

// ============================================================================
// TOOLS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescription {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// One entry of the text channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
}

impl CallToolResult {
    /// A successful tool result: human text plus machine payload
    pub fn ok(text: impl Into<String>, structured: Value) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text".to_string(),
                text: sanitize_text(text.into()),
            }],
            is_error: false,
            structured: Some(structured),
        }
    }

    /// A failed tool call: concise human message, machine-readable kind
    pub fn fail(message: impl Into<String>, kind: &str) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text".to_string(),
                text: sanitize_text(message.into()),
            }],
            is_error: true,
            structured: Some(serde_json::json!({ "kind": kind })),
        }
    }
}

/// Guarantee valid UTF-8 on the wire; invalid sequences become U+FFFD
fn sanitize_text(text: String) -> String {
    String::from_utf8_lossy(text.as_bytes()).into_owned()
}

// ============================================================================
// TESTS
// ============================================================================
