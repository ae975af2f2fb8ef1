//! MCP server core
//!
//! Routes JSON-RPC requests to the tool handlers. The server owns the
//! shared Mind handle; every tool call takes the mutex for its duration,
//! which is the single-writer discipline of the engine.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use samskara_core::Mind;

use crate::protocol::messages::{
    CallToolRequest, InitializeRequest, InitializeResult, ListToolsResult, ServerCapabilities,
    ServerInfo, ToolDescription,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::tools;

/// MCP server implementation
pub struct McpServer {
    mind: Arc<Mutex<Mind>>,
    initialized: bool,
    shutdown: bool,
}

impl McpServer {
    pub fn new(mind: Arc<Mutex<Mind>>) -> Self {
        Self {
            mind,
            initialized: false,
            shutdown: false,
        }
    }

    /// Whether a `shutdown` request asked the transport loop to end
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
    }

    /// Handle an incoming JSON-RPC request; `None` means notification
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("handling {}", request.method);

        if !self.initialized
            && !matches!(
                request.method.as_str(),
                "initialize" | "initialized" | "notifications/initialized"
            )
        {
            warn!("rejecting '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request("server not initialized"),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "initialized" | "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            "shutdown" => self.handle_shutdown().await,
            method => Err(JsonRpcError::method_not_found(method)),
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    async fn handle_initialize(&mut self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        // Use the client's version when it is older than ours
        let negotiated = if request.protocol_version.as_str() < PROTOCOL_VERSION {
            request.protocol_version.clone()
        } else {
            PROTOCOL_VERSION.to_string()
        };

        self.initialized = true;
        info!(version = %negotiated, "session initialized");

        let result = InitializeResult {
            protocol_version: negotiated,
            server_info: ServerInfo {
                name: "samskara".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some({
                    let mut map = HashMap::new();
                    map.insert("listChanged".to_string(), serde_json::json!(false));
                    map
                }),
            },
            instructions: Some(
                "Samskara is a persistent associative memory. Store observations with \
                 `remember`, retrieve with `recall` (actions: recall, resonate, \
                 full_resonate, lens, by_tag), relate things with `graph`, and let the \
                 background dynamics decay, prune, and condense what accumulates. \
                 Confidence is Bayesian: strengthen what proves right, weaken what \
                 proves wrong, and the ranking follows."
                    .to_string(),
            ),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        let tools = vec![
            ToolDescription {
                name: "remember".to_string(),
                description: Some(
                    "Store a typed memory. Text form embeds the content; vector form takes an \
                     explicit 384-dim embedding for callers without an embedder."
                        .to_string(),
                ),
                input_schema: tools::remember::schema(),
            },
            ToolDescription {
                name: "recall".to_string(),
                description: Some(
                    "Retrieve memories. Actions: 'recall' (primed seeds + inhibition), \
                     'resonate' (adds spreading activation, attractors, and Hebbian \
                     reinforcement), 'full_resonate' (everything including priming), 'lens' \
                     (re-rank seeds through a named lens), 'by_tag' (exact tag lookup)."
                        .to_string(),
                ),
                input_schema: tools::recall::schema(),
            },
            ToolDescription {
                name: "memory".to_string(),
                description: Some(
                    "Single-node management. Actions: 'get', 'text', 'tags', 'edit', 'retag', \
                     'remove', 'strengthen', 'weaken', 'hebbian', 'epsilon'."
                        .to_string(),
                ),
                input_schema: tools::memory::schema(),
            },
            ToolDescription {
                name: "graph".to_string(),
                description: Some(
                    "Relations. Actions: 'connect' ((subject, predicate, object) triplet with \
                     on-demand entity nodes), 'link' (typed edge between nodes), 'query' \
                     (positional triplet lookup), 'propagate' (BFS confidence delta), 'forget' \
                     (remove with optional cascade and rewire)."
                        .to_string(),
                ),
                input_schema: tools::graph::schema(),
            },
            ToolDescription {
                name: "dynamics".to_string(),
                description: Some(
                    "Maintenance. Actions: 'tick' (decay + prune + feedback + wisdom + settle), \
                     'apply_feedback', 'queue_feedback', 'synthesize_wisdom', 'snapshot', \
                     'attractors', 'settle'."
                        .to_string(),
                ),
                input_schema: tools::dynamics::schema(),
            },
            ToolDescription {
                name: "realm".to_string(),
                description: Some(
                    "Recall scoping. Actions: 'current', 'set', 'create'. Memories written in a \
                     realm are visible only from that realm and its descendants."
                        .to_string(),
                ),
                input_schema: tools::realm::schema(),
            },
            ToolDescription {
                name: "review".to_string(),
                description: Some(
                    "Quality control. Actions: 'submit', 'approve', 'reject', 'edit', 'defer', \
                     'stats'. Verdicts adjust node confidence and source trust."
                        .to_string(),
                ),
                input_schema: tools::review::schema(),
            },
            ToolDescription {
                name: "ledger".to_string(),
                description: Some(
                    "Session-state persistence. Actions: 'save', 'load' (newest matching), \
                     'list'."
                        .to_string(),
                ),
                input_schema: tools::ledger::schema(),
            },
            ToolDescription {
                name: "status".to_string(),
                description: Some(
                    "Store census and health. Actions: 'state', 'coherence' (graph agreement \
                     tau), 'health' (vitality psi and status)."
                        .to_string(),
                ),
                input_schema: tools::status::schema(),
            },
        ];
        serde_json::to_value(ListToolsResult { tools })
            .map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing tool call parameters")),
        };

        let result = match request.name.as_str() {
            "remember" => tools::remember::execute(&self.mind, request.arguments).await,
            "recall" => tools::recall::execute(&self.mind, request.arguments).await,
            "memory" => tools::memory::execute(&self.mind, request.arguments).await,
            "graph" => tools::graph::execute(&self.mind, request.arguments).await,
            "dynamics" => tools::dynamics::execute(&self.mind, request.arguments).await,
            "realm" => tools::realm::execute(&self.mind, request.arguments).await,
            "review" => tools::review::execute(&self.mind, request.arguments).await,
            "ledger" => tools::ledger::execute(&self.mind, request.arguments).await,
            "status" => tools::status::execute(&self.mind, request.arguments).await,
            name => return Err(JsonRpcError::tool_not_found(name)),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_shutdown(&mut self) -> Result<Value, JsonRpcError> {
        info!("shutdown requested; flushing");
        {
            let mut mind = self.mind.lock().await;
            if let Err(e) = mind.snapshot() {
                warn!("final snapshot failed: {}", e);
            }
        }
        self.shutdown = true;
        Ok(serde_json::json!({}))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use samskara_core::{MindConfig, EMBEDDING_DIM};

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::Number(1.into())),
            method: method.to_string(),
            params,
        }
    }

    async fn test_server(dir: &std::path::Path) -> McpServer {
        let mut cfg = MindConfig::new(dir.to_path_buf());
        cfg.warm_initial_bytes = 64 * 1024;
        let mind = Mind::open(cfg).unwrap();
        McpServer::new(Arc::new(Mutex::new(mind)))
    }

    #[tokio::test]
    async fn test_requires_initialize_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = test_server(dir.path()).await;

        let response = server
            .handle_request(request("tools/list", None))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32600);

        let response = server
            .handle_request(request("initialize", None))
            .await
            .unwrap();
        assert!(response.error.is_none());

        let response = server
            .handle_request(request("tools/list", None))
            .await
            .unwrap();
        let tools = response.result.unwrap();
        assert_eq!(tools["tools"].as_array().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_initialized_notification_gets_no_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = test_server(dir.path()).await;
        server.handle_request(request("initialize", None)).await;
        assert!(server
            .handle_request(request("initialized", None))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = test_server(dir.path()).await;
        server.handle_request(request("initialize", None)).await;

        let response = server
            .handle_request(request("nope/nothing", None))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);

        let response = server
            .handle_request(request(
                "tools/call",
                Some(serde_json::json!({"name": "no-such-tool"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32001);
    }

    #[tokio::test]
    async fn test_remember_and_recall_through_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = test_server(dir.path()).await;
        server.handle_request(request("initialize", None)).await;

        // No embedder wired in this test: use the explicit-vector form
        let vector: Vec<f32> = (0..EMBEDDING_DIM).map(|i| (i as f32 * 0.1).sin()).collect();
        let response = server
            .handle_request(request(
                "tools/call",
                Some(serde_json::json!({
                    "name": "remember",
                    "arguments": {
                        "vector": vector,
                        "payload": "the cache invalidates on write",
                        "type": "wisdom",
                        "confidence": 0.8
                    }
                })),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let id = result["structured"]["id"].as_str().unwrap().to_string();

        // Tag lookup sees it; the text channel is valid UTF-8 prose
        let response = server
            .handle_request(request(
                "tools/call",
                Some(serde_json::json!({
                    "name": "memory",
                    "arguments": {"action": "text", "id": id}
                })),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(
            result["structured"]["text"],
            "the cache invalidates on write"
        );

        // Text recall without an embedder reports the capability gap
        let response = server
            .handle_request(request(
                "tools/call",
                Some(serde_json::json!({
                    "name": "recall",
                    "arguments": {"action": "recall", "query": "cache"}
                })),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["structured"]["kind"], "embedder_unavailable");
    }

    #[tokio::test]
    async fn test_shutdown_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = test_server(dir.path()).await;
        server.handle_request(request("initialize", None)).await;
        assert!(!server.shutdown_requested());
        let response = server
            .handle_request(request("shutdown", None))
            .await
            .unwrap();
        assert!(response.error.is_none());
        assert!(server.shutdown_requested());
    }

    #[tokio::test]
    async fn test_status_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = test_server(dir.path()).await;
        server.handle_request(request("initialize", None)).await;

        let response = server
            .handle_request(request(
                "tools/call",
                Some(serde_json::json!({"name": "status", "arguments": {"action": "health"}})),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["structured"]["status"], "vital");
    }
}
