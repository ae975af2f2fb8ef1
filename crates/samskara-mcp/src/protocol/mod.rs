//! MCP protocol implementation
//!
//! JSON-RPC 2.0 over line-delimited transports: stdio by default, a UNIX
//! socket when configured.

pub mod messages;
pub mod socket;
pub mod stdio;
pub mod types;
