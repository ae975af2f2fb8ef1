//! UNIX socket transport
//!
//! The same line-delimited JSON-RPC as stdio, served on a UNIX domain
//! socket. Connections are handled one at a time: the server state is a
//! single Mind and the protocol is strictly request/response.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{info, warn};

use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::server::McpServer;

/// UNIX socket transport for the MCP server
pub struct SocketTransport {
    path: PathBuf,
}

impl SocketTransport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Serve until a `shutdown` request arrives on some connection
    pub async fn run(self, mut server: McpServer) -> Result<(), std::io::Error> {
        // A stale socket file from a previous run blocks bind
        let _ = std::fs::remove_file(&self.path);
        let listener = UnixListener::bind(&self.path)?;
        info!(path = %self.path.display(), "listening on unix socket");

        'accept: loop {
            let (stream, _) = listener.accept().await?;
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            while let Ok(Some(line)) = lines.next_line().await {
                if line.is_empty() {
                    continue;
                }
                let request: JsonRpcRequest = match serde_json::from_str(&line) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("failed to parse request: {}", e);
                        let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                        send(&mut write_half, &response).await?;
                        continue;
                    }
                };

                if let Some(response) = server.handle_request(request).await {
                    send(&mut write_half, &response).await?;
                }
                if server.shutdown_requested() {
                    break 'accept;
                }
            }
        }

        let _ = std::fs::remove_file(&self.path);
        Ok(())
    }
}

async fn send(
    out: &mut (impl AsyncWriteExt + Unpin),
    response: &JsonRpcResponse,
) -> Result<(), std::io::Error> {
    let body = serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
            .to_string()
    });
    out.write_all(body.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}
