//! Embeddings
//!
//! The engine consumes embedding as a capability: anything implementing
//! `Embedder` can back `remember(text, ...)` and the query side of recall.
//! A local fastembed implementation ships behind the `embeddings` feature;
//! without it (or an injected implementation) text-embedding operations
//! surface `EmbedderUnavailable` and the explicit-vector API still works.

#[cfg(feature = "embeddings")]
mod local;

#[cfg(feature = "embeddings")]
pub use local::LocalEmbedder;

use crate::types::EMBEDDING_DIM;

/// Embedder error type
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("model initialization failed: {0}")]
    ModelInit(String),
    #[error("embedding generation failed: {0}")]
    Failed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// `Embed(text) -> vector`, 384 dimensions, L2-normalized
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

// ============================================================================
// TESTS
// ============================================================================
