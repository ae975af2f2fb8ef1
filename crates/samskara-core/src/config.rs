//! Engine configuration
//!
//! Every tunable exposed through the environment, with the
//! defaults the rest of the crate assumes. `MindConfig::from_env` applies
//! `SAMSKARA_*` overrides on top of a storage root.

use std::path::PathBuf;

/// On-disk layout under the storage root
pub mod files {
    pub const WAL: &str = "wal.log";
    pub const HOT_IDX: &str = "hot.idx";
    pub const WARM: &str = "warm.mmap";
    pub const COLD: &str = "cold.kv";
    pub const DENSE: &str = "dense.index";
    pub const SPARSE: &str = "sparse.index";
    pub const TRIPLETS: &str = "triplets.index";
    pub const REALM: &str = "realm.state";
    pub const REVIEW: &str = "review.queue";
}

/// Tunables for the whole engine
#[derive(Debug, Clone)]
pub struct MindConfig {
    /// Directory holding every persisted file
    pub storage_root: PathBuf,

    // ---- tiers ----
    /// Hot-tier slot capacity
    pub hot_capacity: usize,
    /// Initial warm-tier file size in bytes
    pub warm_initial_bytes: u64,

    // ---- dense index ----
    /// HNSW connectivity
    pub dense_connectivity: usize,
    /// HNSW expansion factor while adding
    pub dense_expansion_add: usize,
    /// HNSW expansion factor while searching
    pub dense_expansion_search: usize,

    // ---- scoring ----
    /// Confidence share of the seed score
    pub confidence_weight: f32,
    /// Recency share of the seed score
    pub recency_weight: f32,
    /// Recency half-life in days
    pub recency_half_life_days: f32,
    /// Seed pool multiplier: dense search fetches `seed_multiplier * k`
    pub seed_multiplier: usize,

    // ---- priming ----
    /// Boost for candidates in the recent-observations ring
    pub priming_recent_boost: f32,
    /// Boost for active intentions
    pub priming_intention_boost: f32,
    /// Boost for goal-basin membership
    pub priming_basin_boost: f32,
    /// Cosine threshold for goal-basin membership
    pub goal_basin_tau: f32,

    // ---- inhibition ----
    /// Cosine threshold above which a later candidate is suppressed
    pub inhibition_threshold: f32,
    /// Suppression strength; survivors keep `1 - strength` of their score
    pub inhibition_strength: f32,
    /// Remove suppressed candidates instead of down-weighting them
    pub inhibition_hard: bool,

    // ---- spreading / attractors ----
    /// Maximum spreading hops from each seed
    pub spread_max_hops: usize,
    /// Activation floor below which spreading halts
    pub spread_floor: f32,
    /// Maximum attractors discovered per pass
    pub attractor_max: usize,
    /// Minimum effective confidence for attractor candidates
    pub attractor_min_effective: f32,

    // ---- dynamics ----
    /// Post-decay effective confidence below which unprotected nodes prune
    pub prune_threshold: f32,
    /// Episode-cluster cosine threshold for wisdom synthesis
    pub wisdom_cluster_tau: f32,
    /// Embedding nudge applied by attractor settling
    pub settle_strength: f32,
    /// Snapshot every N ticks
    pub snapshot_every_ticks: u32,

    // ---- health ----
    /// Sample size for the global coherence component
    pub coherence_sample: usize,
    /// Freshness window for the temporal components, in days
    pub freshness_window_days: f32,
    /// Edge weight below which a node counts as structurally disconnected
    pub structural_weight_floor: f32,

    // ---- misc ----
    /// Query-embedding cache entries
    pub query_cache_size: usize,
    /// WAL lock wait before surfacing Conflict, in milliseconds
    pub wal_lock_wait_ms: u64,
}

impl MindConfig {
    /// Defaults rooted at `storage_root`
    pub fn new(storage_root: PathBuf) -> Self {
        Self {
            storage_root,
            hot_capacity: 10_000,
            warm_initial_bytes: 16 * 1024 * 1024,
            dense_connectivity: 16,
            dense_expansion_add: 128,
            dense_expansion_search: 64,
            confidence_weight: 0.3,
            recency_weight: 0.5,
            recency_half_life_days: 30.0,
            seed_multiplier: 3,
            priming_recent_boost: 0.30,
            priming_intention_boost: 0.25,
            priming_basin_boost: 0.15,
            goal_basin_tau: 0.6,
            inhibition_threshold: 0.85,
            inhibition_strength: 0.70,
            inhibition_hard: false,
            spread_max_hops: 3,
            spread_floor: 0.01,
            attractor_max: 5,
            attractor_min_effective: 0.6,
            prune_threshold: 0.05,
            wisdom_cluster_tau: 0.75,
            settle_strength: 0.02,
            snapshot_every_ticks: 6,
            coherence_sample: 64,
            freshness_window_days: 7.0,
            structural_weight_floor: 0.1,
            query_cache_size: 256,
            wal_lock_wait_ms: 2_000,
        }
    }

    /// Defaults plus `SAMSKARA_*` environment overrides
    pub fn from_env(storage_root: PathBuf) -> Self {
        let mut cfg = Self::new(storage_root);
        read_env("SAMSKARA_HOT_CAPACITY", &mut cfg.hot_capacity);
        read_env("SAMSKARA_DENSE_CONNECTIVITY", &mut cfg.dense_connectivity);
        read_env("SAMSKARA_DENSE_EXPANSION_ADD", &mut cfg.dense_expansion_add);
        read_env(
            "SAMSKARA_DENSE_EXPANSION_SEARCH",
            &mut cfg.dense_expansion_search,
        );
        read_env("SAMSKARA_HALF_LIFE_DAYS", &mut cfg.recency_half_life_days);
        read_env("SAMSKARA_PRIMING_RECENT", &mut cfg.priming_recent_boost);
        read_env("SAMSKARA_PRIMING_INTENTION", &mut cfg.priming_intention_boost);
        read_env("SAMSKARA_PRIMING_BASIN", &mut cfg.priming_basin_boost);
        read_env("SAMSKARA_INHIBITION_THRESHOLD", &mut cfg.inhibition_threshold);
        read_env("SAMSKARA_INHIBITION_STRENGTH", &mut cfg.inhibition_strength);
        read_env("SAMSKARA_PRUNE_THRESHOLD", &mut cfg.prune_threshold);
        read_env("SAMSKARA_SNAPSHOT_EVERY_TICKS", &mut cfg.snapshot_every_ticks);
        read_env("SAMSKARA_COHERENCE_SAMPLE", &mut cfg.coherence_sample);
        read_env("SAMSKARA_WAL_LOCK_WAIT_MS", &mut cfg.wal_lock_wait_ms);
        if let Ok(v) = std::env::var("SAMSKARA_INHIBITION_HARD") {
            cfg.inhibition_hard = matches!(v.as_str(), "1" | "true" | "yes");
        }
        cfg
    }

    /// Default storage root under the platform data directory
    pub fn default_storage_root() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "samskara", "mind")
            .map(|d| d.data_dir().to_path_buf())
    }

    /// Absolute path of a layout file
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.storage_root.join(name)
    }
}

fn read_env<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(parsed) = v.parse() {
            *slot = parsed;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
