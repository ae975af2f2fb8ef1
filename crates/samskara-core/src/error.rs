//! Error kinds surfaced by the Mind facade
//!
//! Module-local errors (`WalError`, `StoreError`, ...) convert upward into
//! `MindError`, which is what the RPC boundary sees. Index inconsistencies
//! recover locally and are reported as warnings, not errors; recall misses
//! are empty lists, never errors.

use crate::types::NodeId;

/// Result alias used across the crate's public surface
pub type Result<T> = std::result::Result<T, MindError>;

/// Error kinds visible at the Mind API
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MindError {
    /// Bad request payload; never mutates state
    #[error("parse error: {0}")]
    Parse(String),

    /// Request shape violation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Parameter schema violation
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Unknown node, ledger, question, or realm
    #[error("not found: {0}")]
    NotFound(String),

    /// Another writer held the WAL lock beyond the configured wait
    #[error("conflict: {0}")]
    Conflict(String),

    /// A text-embedding operation was requested without an embedder
    #[error("no embedder configured; retry with an explicit vector")]
    EmbedderUnavailable,

    /// Dense index fell out of step with the hot store; recovered by rebuild
    #[error("index inconsistency: {0}")]
    IndexInconsistency(String),

    /// Disk or WAL failure; the triggering mutation was rolled back
    #[error("storage i/o: {0}")]
    StorageIo(String),

    /// Operation aborted between phases
    #[error("cancelled")]
    Cancelled,

    /// Reserved for bugs
    #[error("internal: {0}")]
    Internal(String),
}

impl MindError {
    /// Convenience for the common unknown-node case
    pub fn node_not_found(id: NodeId) -> Self {
        MindError::NotFound(format!("node {}", id))
    }

    /// Machine-readable kind string for the structured error channel
    pub fn kind(&self) -> &'static str {
        match self {
            MindError::Parse(_) => "parse_error",
            MindError::InvalidRequest(_) => "invalid_request",
            MindError::InvalidParams(_) => "invalid_params",
            MindError::NotFound(_) => "not_found",
            MindError::Conflict(_) => "conflict",
            MindError::EmbedderUnavailable => "embedder_unavailable",
            MindError::IndexInconsistency(_) => "index_inconsistency",
            MindError::StorageIo(_) => "storage_io",
            MindError::Cancelled => "cancelled",
            MindError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for MindError {
    fn from(e: std::io::Error) -> Self {
        MindError::StorageIo(e.to_string())
    }
}

impl From<rusqlite::Error> for MindError {
    fn from(e: rusqlite::Error) -> Self {
        MindError::StorageIo(e.to_string())
    }
}

impl From<serde_json::Error> for MindError {
    fn from(e: serde_json::Error) -> Self {
        MindError::Parse(e.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
