//! End-to-end test harness
//!
//! Builds real `Mind` instances against temp storage roots, with a
//! deterministic lexicon-based mock embedder so semantic scenarios run
//! without model downloads.

pub mod mocks;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use samskara_core::{Mind, MindConfig};

use crate::mocks::LexiconEmbedder;

/// A pinnable wall clock shared between test and mind
#[derive(Clone)]
pub struct TestClock(Arc<AtomicU64>);

impl TestClock {
    pub fn at(ms: u64) -> Self {
        Self(Arc::new(AtomicU64::new(ms)))
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: u64) {
        self.0.fetch_add(days * 86_400_000, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Open a mind at `root` with the mock embedder and a pinned clock
pub fn open_mind(root: &Path, clock: &TestClock) -> Mind {
    let mut config = MindConfig::new(root.to_path_buf());
    config.warm_initial_bytes = 256 * 1024;
    let mut mind = Mind::open(config).expect("mind open");
    mind.set_embedder(Box::new(LexiconEmbedder::new()));
    let handle = clock.clone();
    mind.set_clock(Box::new(move || handle.now()));
    mind
}

/// Open a mind without any embedder (vector-only API surface)
pub fn open_mind_without_embedder(root: &Path, clock: &TestClock) -> Mind {
    let mut config = MindConfig::new(root.to_path_buf());
    config.warm_initial_bytes = 256 * 1024;
    let mut mind = Mind::open(config).expect("mind open");
    let handle = clock.clone();
    mind.set_clock(Box::new(move || handle.now()));
    mind
}
