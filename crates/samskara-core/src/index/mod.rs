//! Search indices
//!
//! Dense (HNSW over embeddings), sparse (BM25 over payload text), and the
//! triplet/entity index. The dense and sparse indices mirror hot-tier
//! membership and are deterministically rebuildable from it.

mod dense;
mod sparse;
mod triplet;

pub use dense::{DenseIndex, DenseIndexConfig, DenseIndexError};
pub use sparse::{tokenize, SparseIndex};
pub use triplet::{Triplet, TripletIndex};
