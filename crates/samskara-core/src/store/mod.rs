//! Tiered storage
//!
//! Hot (in-process slot arena), warm (memory-mapped append file), and cold
//! (embedded SQLite key-value) behind the `TieredStore` facade.

mod cold;
mod hot;
mod tiered;
mod warm;

pub use cold::ColdStore;
pub use hot::HotStore;
pub use tiered::{Tier, TieredStore};
pub use warm::WarmStore;

/// Store-local error type; the Mind facade maps these into `MindError`
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("store database: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store codec: {0}")]
    Codec(String),
    #[error("store index: {0}")]
    Index(String),
    #[error("hot tier capacity exhausted and nothing to demote")]
    CapacityExhausted,
}
