//! # Samskara Core
//!
//! Persistent associative memory engine for long-running AI assistants:
//!
//! - **Typed memory graph**: 18 node types, 15 edge types, Bayesian
//!   confidence with conservative ranking estimates
//! - **Tiered storage**: hot slot arena, warm memory-mapped file, cold
//!   embedded key-value store behind one handle
//! - **Write-ahead log**: CRC'd delta encodings doubling as the
//!   cross-process synchronization channel
//! - **Dense + sparse retrieval**: HNSW over int8-quantized embeddings,
//!   BM25 over payload text
//! - **Resonance**: six-phase recall combining similarity, confidence,
//!   recency, type bias, spreading activation, attractor gravity, lateral
//!   inhibition, priming, and Hebbian reinforcement
//! - **Dynamics**: decay ticks, pruning, wisdom synthesis, attractor
//!   settling, snapshots
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use samskara_core::{Mind, MindConfig, NodeType};
//!
//! let config = MindConfig::from_env("/var/lib/samskara".into());
//! let mut mind = Mind::open(config)?;
//! mind.set_embedder(Box::new(samskara_core::LocalEmbedder::new()));
//!
//! let id = mind.remember("The cache invalidates on write.",
//!                        NodeType::Wisdom, Some(0.8), Default::default())?;
//! let recalls = mind.recall("cache", 3)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): bundle SQLite for the cold tier
//! - `embeddings`: local embedding generation with fastembed

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod dynamics;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod index;
pub mod mind;
pub mod resonance;
pub mod store;
pub mod types;
pub mod wal;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Data model
pub use types::{
    cosine_similarity, normalize, Coherence, Confidence, Edge, EdgeType, HealthStatus,
    MindHealth, Node, NodeId, NodeType, QuantizedVector, EMBEDDING_DIM, REALM_TAG_PREFIX,
};

// Errors
pub use error::{MindError, Result};

// Configuration
pub use config::{files, MindConfig};

// Storage
pub use store::{ColdStore, HotStore, StoreError, Tier, TieredStore, WarmStore};

// WAL
pub use wal::{
    ConfidenceDelta, DecodedRecord, EdgeDelta, PayloadFmt, RecordHeader, RecordKind, TouchDelta,
    Wal, WalError, WalPayload,
};

// Indices
pub use index::{DenseIndex, DenseIndexConfig, SparseIndex, Triplet, TripletIndex};

// Graph
pub use graph::{propagation_plan, PropagationStep, ReverseEdgeIndex};

// Resonance
pub use resonance::{
    find_attractors, Attractor, AttractorSummary, Lens, PipelinePlan, Recall, SessionContext,
};

// Dynamics
pub use dynamics::{Feedback, FeedbackTarget, SynthesizedWisdom, PROMOTED_TAG};

// Mind facade
pub use mind::{
    LedgerSummary, Mind, MindState, RealmManager, ReviewEntry, ReviewOutcome, ReviewStats,
    ReviewStatus, TickReport, DEFAULT_CONFIDENCE, DEFAULT_HEBBIAN_STRENGTH, LEDGER_TAG,
    ROOT_REALM,
};

// Embedding capability
pub use embeddings::{Embedder, EmbedderError};

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub use embeddings::LocalEmbedder;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WAL format revision (highest payload fmt understood)
pub const WAL_FORMAT: u8 = 4;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Coherence, Confidence, Edge, EdgeType, Lens, Mind, MindConfig, MindError, MindHealth,
        MindState, Node, NodeId, NodeType, QuantizedVector, Recall, Result, TickReport,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::LocalEmbedder;
}
