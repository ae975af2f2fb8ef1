//! The Mind facade
//!
//! Everything enters here. A `Mind` owns the WAL, the tiered store with
//! its indices, the triplet index, the reverse-edge index, the session
//! context, realms, the review queue, and the feedback queue, and it
//! couples every mutation to a WAL record: the record is durable before
//! the in-memory change lands, so a failed append never leaves the store
//! ahead of the log.
//!
//! Cross-process discipline: reads that need fresh state call
//! `sync_from_shared_field` first; writes discover and apply peer records
//! under the WAL lock before their own record is assigned a sequence.

mod realm;
mod review;

pub use realm::{RealmManager, ROOT_REALM};
pub use review::{ReviewEntry, ReviewOutcome, ReviewQueue, ReviewStats, ReviewStatus};

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::atomic::AtomicBool;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{files, MindConfig};
use crate::dynamics::{
    apply_decay, prune_candidates, synthesize_wisdom, settle_toward_attractors, Feedback,
    FeedbackQueue, FeedbackTarget, PROMOTED_TAG,
};
use crate::embeddings::{Embedder, EmbedderError};
use crate::error::{MindError, Result};
use crate::graph::{propagation_plan, ReverseEdgeIndex};
use crate::index::{Triplet, TripletIndex};
use crate::resonance::{
    self, find_attractors, AttractorSummary, Lens, PipelinePlan, Recall, SessionContext,
};
use crate::store::TieredStore;
use crate::types::{
    Coherence, Confidence, EdgeType, MindHealth, Node, NodeId, NodeType, QuantizedVector,
    EMBEDDING_DIM,
};
use crate::wal::{
    ConfidenceDelta, DecodedRecord, EdgeDelta, RecordKind, TouchDelta, Wal, WalError, WalPayload,
};

/// Hebbian strength used by `resonate`, which does not take one explicitly
pub const DEFAULT_HEBBIAN_STRENGTH: f32 = 0.1;

/// Default prior mean when the caller supplies no confidence
pub const DEFAULT_CONFIDENCE: f32 = 0.7;

/// Tag carried by ledger nodes
pub const LEDGER_TAG: &str = "ledger";

// ============================================================================
// API VALUE TYPES
// ============================================================================

/// Store census for the `state()` surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindState {
    pub total_nodes: usize,
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
    /// Whether an embedder is wired in
    pub yantra_ready: bool,
}

/// What one dynamics tick did
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub decayed: usize,
    pub pruned: usize,
    pub feedback_applied: usize,
    pub wisdom_created: usize,
    pub settled: usize,
    pub snapshotted: bool,
}

/// One row of `list_ledgers`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub id: NodeId,
    pub session: Option<String>,
    pub project: Option<String>,
    pub saved_ms: u64,
    pub excerpt: String,
}

/// Snapshot cursor persisted in `hot.idx`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotMeta {
    last_seq: u64,
    saved_ms: u64,
}

fn map_wal(e: WalError) -> MindError {
    match e {
        WalError::LockTimeout => MindError::Conflict("wal lock held by another writer".into()),
        other => MindError::StorageIo(other.to_string()),
    }
}

// ============================================================================
// MIND
// ============================================================================

/// The memory engine behind one storage root
pub struct Mind {
    config: MindConfig,
    wal: Wal,
    store: TieredStore,
    triplets: TripletIndex,
    reverse: ReverseEdgeIndex,
    session: SessionContext,
    realms: RealmManager,
    review: ReviewQueue,
    feedback: FeedbackQueue,
    embedder: Option<Box<dyn Embedder>>,
    query_cache: LruCache<String, Vec<f32>>,
    clock: Box<dyn Fn() -> u64 + Send + Sync>,
    /// Provenance id stamped on review submissions and audit episodes
    source: String,
    ticks: u32,
}

impl Mind {
    /// Open the engine at the configured storage root: open all tiers,
    /// load the persisted realm/review/triplet state, replay the WAL tail
    /// past the last snapshot, warm-start the hot tier, and rebuild the
    /// derived indices.
    pub fn open(config: MindConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.storage_root)?;
        let wal = Wal::open(&config.path_of(files::WAL), config.wal_lock_wait_ms).map_err(map_wal)?;
        let store = TieredStore::open(&config).map_err(|e| MindError::StorageIo(e.to_string()))?;

        let triplets = TripletIndex::load(&config.path_of(files::TRIPLETS)).unwrap_or_default();
        let realms = match RealmManager::load(&config.path_of(files::REALM)) {
            Ok(r) => r,
            Err(_) => RealmManager::new(),
        };
        let review = ReviewQueue::load(&config.path_of(files::REVIEW)).unwrap_or_default();

        let snapshot: SnapshotMeta = std::fs::read(config.path_of(files::HOT_IDX))
            .ok()
            .and_then(|body| serde_json::from_slice(&body).ok())
            .unwrap_or_default();

        let cache = NonZeroUsize::new(config.query_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        let mut mind = Self {
            config,
            wal,
            store,
            triplets,
            reverse: ReverseEdgeIndex::new(),
            session: SessionContext::new(),
            realms,
            review,
            feedback: FeedbackQueue::new(),
            embedder: None,
            query_cache: LruCache::new(cache),
            clock: Box::new(system_now),
            source: format!("proc-{}", std::process::id()),
            ticks: 0,
        };

        // Replay everything past the snapshot cursor
        let mut tail = Vec::new();
        mind.wal
            .replay_from(snapshot.last_seq, |rec| tail.push(rec))
            .map_err(map_wal)?;
        let replayed = tail.len();
        for rec in tail {
            mind.apply_record(rec);
        }

        mind.warm_start();
        mind.rebuild_reverse();
        if mind
            .store
            .repair_indices()
            .map_err(|e| MindError::StorageIo(e.to_string()))?
        {
            warn!("indices rebuilt during open");
        }

        info!(
            replayed,
            hot = mind.store.hot_len(),
            warm = mind.store.warm_len(),
            cold = mind.store.cold_len(),
            realm = mind.realms.current(),
            "mind open"
        );
        Ok(mind)
    }

    /// Inject the `Embed(text) -> vector` capability
    pub fn set_embedder(&mut self, embedder: Box<dyn Embedder>) {
        self.embedder = Some(embedder);
    }

    /// Replace the wall-clock source (tests pin this)
    pub fn set_clock(&mut self, clock: Box<dyn Fn() -> u64 + Send + Sync>) {
        self.clock = clock;
    }

    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    // ==================================================================
    // CROSS-PROCESS SYNC
    // ==================================================================

    /// Replay peer records appended since this process last looked.
    /// Returns the new last-seen WAL sequence.
    pub fn sync_from_shared_field(&mut self) -> Result<u64> {
        let mut records = Vec::new();
        let seq = self
            .wal
            .sync_from_shared_field(|rec| records.push(rec))
            .map_err(map_wal)?;
        for rec in records {
            self.apply_record(rec);
        }
        Ok(seq)
    }

    /// Append a record, applying any peer records discovered under the
    /// lock before ours (so local state reflects the file order)
    fn wal_commit(&mut self, kind: RecordKind, payload: WalPayload) -> Result<u64> {
        let now = self.now();
        let mut peers = Vec::new();
        let seq = self
            .wal
            .append(kind, &payload, now, |rec| peers.push(rec))
            .map_err(map_wal)?;
        for rec in peers {
            self.apply_record(rec);
        }
        Ok(seq)
    }

    /// Apply one decoded WAL record. Idempotent: a record applied twice
    /// changes nothing beyond `tau` fields, and confidence deltas respect
    /// the monotonicity of `n`.
    fn apply_record(&mut self, rec: DecodedRecord) {
        match (rec.header.kind, rec.payload) {
            (RecordKind::Insert | RecordKind::Update, WalPayload::NodeFull(node)) => {
                if let Err(e) = self.install_local(node) {
                    warn!(seq = rec.header.seq, "replayed node rejected: {}", e);
                }
            }
            (RecordKind::Delete, WalPayload::Touch(d)) => {
                let _ = self.store.remove(d.id);
                self.reverse.remove_node(d.id);
                self.session.evict(d.id);
            }
            (_, WalPayload::Touch(d)) => {
                let _ = self.store.update(d.id, |n| {
                    n.tau_accessed = n.tau_accessed.max(d.tau_accessed);
                });
            }
            (_, WalPayload::Confidence(d)) => {
                let _ = self.store.update(d.id, |n| {
                    // evidence count never moves backward
                    if d.confidence.n >= n.confidence.n {
                        n.confidence = d.confidence;
                    }
                });
            }
            (RecordKind::EdgeRemove, WalPayload::Edge(d)) => {
                let Some(edge_type) = EdgeType::from_wire_tag(d.edge_type) else {
                    return;
                };
                let _ = self.store.update(d.from, |n| {
                    n.remove_edge(d.to, edge_type);
                });
                self.reverse.remove(d.from, d.to, edge_type);
            }
            (_, WalPayload::Edge(d)) => {
                let Some(edge_type) = EdgeType::from_wire_tag(d.edge_type) else {
                    return;
                };
                if self.store.update(d.from, |n| {
                    n.set_edge_weight(d.to, edge_type, d.weight);
                }).ok().flatten().is_some() {
                    self.reverse.set(d.from, d.to, edge_type, d.weight);
                }
            }
            (kind, payload) => {
                debug!(?kind, ?payload, "wal record shape ignored");
            }
        }
    }

    /// Install a node into the store and keep the reverse index in step
    fn install_local(&mut self, node: Node) -> Result<()> {
        self.reverse.clear_source(node.id);
        for e in &node.edges {
            self.reverse.set(node.id, e.target, e.edge_type, e.weight);
        }
        self.store
            .put(node)
            .map_err(|e| MindError::StorageIo(e.to_string()))
    }

    fn warm_start(&mut self) {
        // Pull the most recently touched persisted nodes into the hot
        // tier so retrieval works immediately after a restart
        let budget = self.config.hot_capacity / 2;
        if budget == 0 || self.store.hot_len() >= budget {
            return;
        }
        let mut recent: Vec<(u64, NodeId)> = Vec::new();
        self.store.for_each_node(|n| recent.push((n.tau_accessed, n.id)));
        recent.sort_by(|a, b| b.cmp(a));
        let wanted: Vec<NodeId> = recent
            .into_iter()
            .take(budget)
            .map(|(_, id)| id)
            .collect();
        for id in wanted {
            let _ = self.store.get(id);
        }
    }

    fn rebuild_reverse(&mut self) {
        let reverse = &mut self.reverse;
        reverse.clear();
        self.store.for_each_node(|n| reverse.index_node(n));
    }

    // ==================================================================
    // EMBEDDING
    // ==================================================================

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        if let Some(v) = self.query_cache.get(text) {
            return Ok(v.clone());
        }
        let embedder = self
            .embedder
            .as_ref()
            .ok_or(MindError::EmbedderUnavailable)?;
        let vector = embedder.embed(text).map_err(|e| match e {
            EmbedderError::InvalidInput(m) => MindError::InvalidParams(m),
            other => MindError::Internal(other.to_string()),
        })?;
        self.query_cache.put(text.to_string(), vector.clone());
        Ok(vector)
    }

    // ==================================================================
    // WRITES
    // ==================================================================

    /// Store a text memory. Requires an embedder; the explicit-vector
    /// variant below works without one.
    pub fn remember(
        &mut self,
        text: &str,
        node_type: NodeType,
        confidence: Option<f32>,
        tags: BTreeSet<String>,
    ) -> Result<NodeId> {
        let vector = self.embed(text)?;
        self.insert_node(
            node_type,
            QuantizedVector::quantize(&vector),
            text.as_bytes().to_vec(),
            confidence,
            tags,
        )
    }

    /// Store a memory from an explicit vector; the mirror of `remember`
    /// for callers without an embedding function
    pub fn remember_with_vector(
        &mut self,
        node_type: NodeType,
        vector: &[f32],
        confidence: Option<f32>,
        payload: Vec<u8>,
        tags: BTreeSet<String>,
    ) -> Result<NodeId> {
        if vector.len() != EMBEDDING_DIM {
            return Err(MindError::InvalidParams(format!(
                "expected {} vector components, got {}",
                EMBEDDING_DIM,
                vector.len()
            )));
        }
        self.insert_node(
            node_type,
            QuantizedVector::quantize(vector),
            payload,
            confidence,
            tags,
        )
    }

    fn insert_node(
        &mut self,
        node_type: NodeType,
        embedding: QuantizedVector,
        payload: Vec<u8>,
        confidence: Option<f32>,
        mut tags: BTreeSet<String>,
    ) -> Result<NodeId> {
        let now = self.now();
        // Writes made inside a scoped realm belong to it unless the
        // caller already scoped them explicitly
        if self.realms.current() != ROOT_REALM
            && !tags.iter().any(|t| t.starts_with(crate::types::REALM_TAG_PREFIX))
        {
            tags.insert(format!(
                "{}{}",
                crate::types::REALM_TAG_PREFIX,
                self.realms.current()
            ));
        }
        let mut node = Node::new(
            node_type,
            embedding,
            payload,
            confidence.unwrap_or(DEFAULT_CONFIDENCE),
            now,
        );
        node.tags = tags;
        let id = node.id;

        self.wal_commit(RecordKind::Insert, WalPayload::NodeFull(node.clone()))?;
        self.install_local(node)?;
        debug!(%id, ?node_type, "remember");
        Ok(id)
    }

    /// Read, apply `f`, write back, and log the full updated node
    pub fn update_node(&mut self, id: NodeId, f: impl FnOnce(&mut Node)) -> Result<Node> {
        self.sync_from_shared_field()?;
        let Some(mut node) = self.store.get(id) else {
            return Err(MindError::node_not_found(id));
        };
        f(&mut node);
        node.id = id;
        self.wal_commit(RecordKind::Update, WalPayload::NodeFull(node.clone()))?;
        self.install_local(node.clone())?;
        Ok(node)
    }

    /// Tombstone a node everywhere
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.sync_from_shared_field()?;
        if !self.store.contains(id) {
            return Err(MindError::node_not_found(id));
        }
        let now = self.now();
        self.wal_commit(
            RecordKind::Delete,
            WalPayload::Touch(TouchDelta {
                id,
                tau_accessed: now,
            }),
        )?;
        self.store
            .remove(id)
            .map_err(|e| MindError::StorageIo(e.to_string()))?;
        self.reverse.remove_node(id);
        self.session.evict(id);
        if let Some(name) = self.triplets.entity_name(id).map(str::to_string) {
            self.triplets.remove_entity(&name);
        }
        Ok(())
    }

    // ==================================================================
    // READS
    // ==================================================================

    /// Fetch and touch a node
    pub fn get(&mut self, id: NodeId) -> Result<Option<Node>> {
        self.sync_from_shared_field()?;
        let Some(mut node) = self.store.get(id) else {
            return Ok(None);
        };
        let now = self.now();
        self.touch(id, now)?;
        node.tau_accessed = now;
        Ok(Some(node))
    }

    /// Text view of a node's payload
    pub fn text(&mut self, id: NodeId) -> Result<Option<String>> {
        Ok(self.get(id)?.map(|n| n.text()))
    }

    /// A node's tags
    pub fn tags(&mut self, id: NodeId) -> Result<Option<BTreeSet<String>>> {
        Ok(self.get(id)?.map(|n| n.tags))
    }

    fn touch(&mut self, id: NodeId, now: u64) -> Result<()> {
        self.wal_commit(
            RecordKind::Update,
            WalPayload::Touch(TouchDelta {
                id,
                tau_accessed: now,
            }),
        )?;
        let _ = self.store.update(id, |n| n.tau_accessed = now);
        Ok(())
    }

    // ==================================================================
    // CONFIDENCE AND EDGES
    // ==================================================================

    /// Raise a node's confidence by an absolute delta; returns the new
    /// effective estimate
    pub fn strengthen(&mut self, id: NodeId, delta: f32) -> Result<f32> {
        self.adjust_confidence(id, delta.max(0.0), true)
    }

    /// Lower a node's confidence by an absolute delta
    pub fn weaken(&mut self, id: NodeId, delta: f32) -> Result<f32> {
        self.adjust_confidence(id, delta.max(0.0), false)
    }

    fn adjust_confidence(&mut self, id: NodeId, delta: f32, up: bool) -> Result<f32> {
        self.sync_from_shared_field()?;
        let node = self
            .store
            .peek(id)
            .ok_or_else(|| MindError::node_not_found(id))?;
        let now = self.now();
        let mut confidence = node.confidence;
        if up {
            confidence.strengthen(delta, now);
        } else {
            confidence.weaken(delta, now);
        }
        self.commit_confidence(id, confidence)?;
        Ok(confidence.effective())
    }

    fn commit_confidence(&mut self, id: NodeId, confidence: Confidence) -> Result<()> {
        self.wal_commit(
            RecordKind::Update,
            WalPayload::Confidence(ConfidenceDelta { id, confidence }),
        )?;
        let _ = self.store.update(id, |n| {
            if confidence.n >= n.confidence.n {
                n.confidence = confidence;
            }
        });
        Ok(())
    }

    /// Strengthen the symmetric `Similar` pair between two co-retrieved
    /// nodes, creating the edges when absent; weights saturate at 1.0
    pub fn hebbian_strengthen(&mut self, a: NodeId, b: NodeId, delta: f32) -> Result<()> {
        self.sync_from_shared_field()?;
        self.hebbian_internal(a, b, delta)
    }

    fn hebbian_internal(&mut self, a: NodeId, b: NodeId, delta: f32) -> Result<()> {
        if a == b {
            return Ok(());
        }
        let weight_ab = self
            .store
            .peek(a)
            .ok_or_else(|| MindError::node_not_found(a))?
            .edge_weight(b, EdgeType::Similar)
            .unwrap_or(0.0);
        let weight_ba = self
            .store
            .peek(b)
            .ok_or_else(|| MindError::node_not_found(b))?
            .edge_weight(a, EdgeType::Similar)
            .unwrap_or(0.0);
        self.commit_edge(a, b, EdgeType::Similar, (weight_ab + delta).min(1.0))?;
        self.commit_edge(b, a, EdgeType::Similar, (weight_ba + delta).min(1.0))?;
        Ok(())
    }

    fn commit_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        edge_type: EdgeType,
        weight: f32,
    ) -> Result<()> {
        let weight = weight.clamp(0.0, 1.0);
        self.wal_commit(
            RecordKind::EdgeAdd,
            WalPayload::Edge(EdgeDelta {
                from,
                to,
                edge_type: edge_type.wire_tag(),
                weight,
            }),
        )?;
        let _ = self.store.update(from, |n| {
            n.set_edge_weight(to, edge_type, weight);
        });
        self.reverse.set(from, to, edge_type, weight);
        Ok(())
    }

    /// Connect two existing nodes with a typed edge; duplicate
    /// (target, type) pairs merge by max weight
    pub fn connect_nodes(
        &mut self,
        from: NodeId,
        to: NodeId,
        edge_type: EdgeType,
        weight: f32,
    ) -> Result<()> {
        self.sync_from_shared_field()?;
        let existing = self
            .store
            .peek(from)
            .ok_or_else(|| MindError::node_not_found(from))?
            .edge_weight(to, edge_type)
            .unwrap_or(0.0);
        if !self.store.contains(to) {
            return Err(MindError::node_not_found(to));
        }
        self.commit_edge(from, to, edge_type, existing.max(weight))
    }

    // ==================================================================
    // TRIPLETS
    // ==================================================================

    /// Record a `(subject, predicate, object)` relation: entities come
    /// into existence on demand (zero embedding) and get bidirectional
    /// `Mentions` edges so graph traversal sees the relation
    pub fn connect(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &str,
        weight: f32,
    ) -> Result<()> {
        if subject.is_empty() || predicate.is_empty() || object.is_empty() {
            return Err(MindError::InvalidParams(
                "subject, predicate, and object must be non-empty".into(),
            ));
        }
        self.sync_from_shared_field()?;
        let subject_id = self.ensure_entity(subject)?;
        let object_id = self.ensure_entity(object)?;
        let weight = self.triplets.add(subject, predicate, object, weight);
        self.commit_edge(subject_id, object_id, EdgeType::Mentions, weight)?;
        self.commit_edge(object_id, subject_id, EdgeType::Mentions, weight)?;
        if let Err(e) = self.triplets.save(&self.config.path_of(files::TRIPLETS)) {
            warn!("triplet index save failed: {}", e);
        }
        Ok(())
    }

    /// Positional triplet query; empty strings are wildcards
    pub fn query_graph(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> Result<Vec<Triplet>> {
        self.sync_from_shared_field()?;
        Ok(self.triplets.query(subject, predicate, object))
    }

    fn ensure_entity(&mut self, name: &str) -> Result<NodeId> {
        if let Some(id) = self.triplets.entity(name) {
            if self.store.contains(id) {
                return Ok(id);
            }
        }
        let id = self.insert_node(
            NodeType::Entity,
            QuantizedVector::zero(),
            name.as_bytes().to_vec(),
            Some(0.5),
            BTreeSet::new(),
        )?;
        self.triplets.set_entity(name, id);
        Ok(id)
    }

    // ==================================================================
    // PROPAGATION AND FORGETTING
    // ==================================================================

    /// BFS a signed confidence delta outward, attenuated per hop by
    /// `decay_factor` and per edge by its weight. Dangling edge targets
    /// are skipped and flagged. Returns the applied deltas and their sum.
    pub fn propagate_confidence(
        &mut self,
        id: NodeId,
        delta: f32,
        decay_factor: f32,
        max_depth: usize,
    ) -> Result<(Vec<(NodeId, f32)>, f32)> {
        self.sync_from_shared_field()?;
        if !self.store.contains(id) {
            return Err(MindError::node_not_found(id));
        }

        let store = &self.store;
        let plan = propagation_plan(id, delta, decay_factor, max_depth, |n| {
            let Some(node) = store.peek(n) else {
                return vec![];
            };
            node.edges
                .iter()
                .filter(|e| {
                    let exists = store.contains(e.target);
                    if !exists {
                        warn!(source = %n, target = %e.target, "dangling edge skipped");
                    }
                    exists
                })
                .map(|e| (e.target, e.weight))
                .collect()
        });

        let mut applied = Vec::with_capacity(plan.len());
        let mut total = 0.0f32;
        for step in plan {
            let magnitude = step.delta.abs();
            if magnitude <= f32::EPSILON {
                continue;
            }
            self.adjust_confidence(step.id, magnitude, step.delta >= 0.0)?;
            applied.push((step.id, step.delta));
            total += step.delta;
        }
        Ok((applied, total))
    }

    /// Remove a node, optionally weakening its neighborhood and rewiring
    /// inbound sources to outbound targets. The act itself is remembered
    /// as an audit episode.
    pub fn forget(
        &mut self,
        id: NodeId,
        cascade: bool,
        rewire: bool,
        cascade_strength: f32,
    ) -> Result<()> {
        self.sync_from_shared_field()?;
        let node = self
            .store
            .peek(id)
            .ok_or_else(|| MindError::node_not_found(id))?;
        let inbound: Vec<NodeId> = self.reverse.of(id).iter().map(|(s, _, _)| *s).collect();
        let outbound: Vec<NodeId> = node.edges.iter().map(|e| e.target).collect();

        if cascade {
            for &neighbor in inbound.iter().chain(outbound.iter()) {
                if self.store.contains(neighbor) {
                    self.adjust_confidence(neighbor, cascade_strength, false)?;
                }
            }
        }
        if rewire {
            for &src in &inbound {
                for &dst in &outbound {
                    if src != dst && self.store.contains(src) && self.store.contains(dst) {
                        self.hebbian_internal(src, dst, cascade_strength)?;
                    }
                }
            }
        }

        self.remove_node(id)?;

        let audit = format!(
            "Forgot node {} (cascade: {}, rewire: {}, strength: {:.2})",
            id, cascade, rewire, cascade_strength
        );
        let mut tags = BTreeSet::new();
        tags.insert("audit".to_string());
        self.insert_node(
            NodeType::Episode,
            QuantizedVector::zero(),
            audit.into_bytes(),
            Some(0.5),
            tags,
        )?;
        Ok(())
    }

    // ==================================================================
    // RECALL SHAPES
    // ==================================================================

    /// Primed seed retrieval with inhibition; no graph phases
    pub fn recall(&mut self, query: &str, k: usize) -> Result<Vec<Recall>> {
        let vector = self.embed(query)?;
        self.run_pipeline(Some(query), &vector, PipelinePlan::recall(k), None)
    }

    /// Seed retrieval from an explicit vector (no embedder required)
    pub fn recall_with_vector(&mut self, vector: &[f32], k: usize) -> Result<Vec<Recall>> {
        if vector.len() != EMBEDDING_DIM {
            return Err(MindError::InvalidParams(format!(
                "expected {} vector components, got {}",
                EMBEDDING_DIM,
                vector.len()
            )));
        }
        self.run_pipeline(None, vector, PipelinePlan::recall(k), None)
    }

    /// The graph phases without priming boost
    pub fn resonate(&mut self, query: &str, k: usize, spread: f32) -> Result<Vec<Recall>> {
        let vector = self.embed(query)?;
        self.run_pipeline(
            Some(query),
            &vector,
            PipelinePlan::resonate(k, spread, DEFAULT_HEBBIAN_STRENGTH),
            None,
        )
    }

    /// The full nine-phase pipeline
    pub fn full_resonate(
        &mut self,
        query: &str,
        k: usize,
        spread: f32,
        hebbian: f32,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<Recall>> {
        let vector = self.embed(query)?;
        self.run_pipeline(
            Some(query),
            &vector,
            PipelinePlan::full(k, spread, hebbian),
            cancel,
        )
    }

    /// Lens-weighted re-ranked seed list
    pub fn lens_recall(&mut self, query: &str, lens: Lens, k: usize) -> Result<Vec<Recall>> {
        let vector = self.embed(query)?;
        self.run_pipeline(Some(query), &vector, PipelinePlan::lens_view(k, lens), None)
    }

    /// Exact-tag scan across all tiers, newest-accessed first
    pub fn recall_by_tag(&mut self, tag: &str, k: usize) -> Result<Vec<Recall>> {
        self.sync_from_shared_field()?;
        let realms = &self.realms;
        let mut matches: Vec<(u64, Recall)> = Vec::new();
        self.store.for_each_node(|n| {
            if n.tags.contains(tag) && realms.visible(n.realm()) {
                matches.push((
                    n.tau_accessed,
                    Recall {
                        id: n.id,
                        text: n.text(),
                        embedding: n.embedding.clone(),
                        node_type: n.node_type,
                        confidence: n.effective(),
                        similarity: 0.0,
                        relevance: n.effective(),
                    },
                ));
            }
        });
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        let recalls: Vec<Recall> = matches.into_iter().take(k).map(|(_, r)| r).collect();
        let now = self.now();
        for r in &recalls {
            self.touch(r.id, now)?;
        }
        Ok(recalls)
    }

    fn run_pipeline(
        &mut self,
        query_text: Option<&str>,
        vector: &[f32],
        plan: PipelinePlan,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<Recall>> {
        // Phase 1: sync and refresh the session context
        self.sync_from_shared_field()?;
        self.session
            .refresh(self.store.hot(), self.config.goal_basin_tau);

        let now = self.now();
        let realms = &self.realms;
        let outcome = resonance::run(
            &self.store,
            &self.reverse,
            &self.session,
            &self.config,
            vector,
            query_text,
            now,
            &plan,
            |n| realms.visible(n.realm()),
            cancel,
        )?;

        // Emitted nodes are touched reads
        for recall in &outcome.recalls {
            self.touch(recall.id, now)?;
        }

        // Phase 8: Hebbian reinforcement among the top of the list.
        // Degrades gracefully: a failed edge write warns and moves on.
        for (a, b) in &outcome.hebbian_pairs {
            if let Err(e) = self.hebbian_internal(*a, *b, plan.hebbian_strength) {
                warn!("hebbian reinforcement skipped: {}", e);
            }
        }

        // Phase 9: priming feedback
        if plan.spread {
            for recall in &outcome.recalls {
                self.session.observe(recall.id);
            }
        }
        Ok(outcome.recalls)
    }

    // ==================================================================
    // ATTRACTORS
    // ==================================================================

    /// The current retrieval centers, strongest first
    pub fn find_attractors(&mut self, max: usize) -> Result<Vec<AttractorSummary>> {
        self.sync_from_shared_field()?;
        Ok(find_attractors(
            self.store.hot(),
            &self.reverse,
            self.config.attractor_min_effective,
            max,
            self.now(),
        )
        .iter()
        .map(|a| a.summary())
        .collect())
    }

    /// Detect attractors and nudge every other embedding one bounded step
    /// toward its nearest one. Returns the attractors and how many nodes
    /// moved.
    pub fn run_attractor_dynamics(
        &mut self,
        max: usize,
        strength: f32,
    ) -> Result<(Vec<AttractorSummary>, usize)> {
        self.sync_from_shared_field()?;
        let attractors = find_attractors(
            self.store.hot(),
            &self.reverse,
            self.config.attractor_min_effective,
            max,
            self.now(),
        );
        let nudged = settle_toward_attractors(self.store.hot(), &attractors, strength);
        let settled = nudged.len();
        for (id, embedding) in nudged {
            let Some(mut node) = self.store.peek(id) else {
                continue;
            };
            node.embedding = embedding;
            self.wal_commit(RecordKind::Update, WalPayload::NodeFull(node.clone()))?;
            self.install_local(node)?;
        }
        Ok((attractors.iter().map(|a| a.summary()).collect(), settled))
    }

    // ==================================================================
    // DYNAMICS
    // ==================================================================

    /// Queue a signed adjustment for the next tick
    pub fn queue_feedback(&mut self, target: FeedbackTarget, delta: f32) {
        self.feedback.push(Feedback { target, delta });
    }

    /// One dynamics cycle: decay, prune, feedback, wisdom synthesis,
    /// settling, and (on cadence) a snapshot
    pub fn tick(&mut self) -> Result<TickReport> {
        self.sync_from_shared_field()?;
        let now = self.now();
        let mut report = TickReport::default();

        // 1. decay, emitting a confidence delta per aged node
        let decayed = apply_decay(self.store.hot_mut(), now);
        report.decayed = decayed.len();
        for (id, confidence) in decayed {
            self.wal_commit(
                RecordKind::Update,
                WalPayload::Confidence(ConfidenceDelta { id, confidence }),
            )?;
        }

        // 2. prune the faded, sparing protected types
        let victims = prune_candidates(self.store.hot(), self.config.prune_threshold);
        for id in victims {
            debug!(%id, "pruned");
            self.wal_commit(
                RecordKind::Delete,
                WalPayload::Touch(TouchDelta {
                    id,
                    tau_accessed: now,
                }),
            )?;
            let _ = self.store.remove(id);
            self.reverse.remove_node(id);
            self.session.evict(id);
            report.pruned += 1;
        }

        // 3. drain queued feedback
        report.feedback_applied = self.apply_feedback()?;

        // 4. condense clustered episodes into wisdom
        report.wisdom_created = self.synthesize_wisdom()?;

        // 5. attractor settling
        if self.config.settle_strength > 0.0 {
            let (_, settled) = self.run_attractor_dynamics(
                self.config.attractor_max,
                self.config.settle_strength,
            )?;
            report.settled = settled;
        }

        // 6. snapshot on cadence
        self.ticks = self.ticks.wrapping_add(1);
        if self.config.snapshot_every_ticks > 0
            && self.ticks % self.config.snapshot_every_ticks == 0
        {
            self.snapshot()?;
            report.snapshotted = true;
        }

        info!(
            decayed = report.decayed,
            pruned = report.pruned,
            feedback = report.feedback_applied,
            wisdom = report.wisdom_created,
            settled = report.settled,
            "tick complete"
        );
        Ok(report)
    }

    /// Drain the feedback queue, clamping every application
    pub fn apply_feedback(&mut self) -> Result<usize> {
        let entries = self.feedback.drain();
        let mut applied = 0;
        for entry in entries {
            match entry.target {
                FeedbackTarget::Confidence(id) => {
                    if self.store.contains(id) {
                        self.adjust_confidence(id, entry.delta.abs(), entry.delta >= 0.0)?;
                        applied += 1;
                    }
                }
                FeedbackTarget::Edge { from, to, edge_type } => {
                    let Some(node) = self.store.peek(from) else {
                        continue;
                    };
                    let weight = node.edge_weight(to, edge_type).unwrap_or(0.0);
                    self.commit_edge(from, to, edge_type, (weight + entry.delta).clamp(0.0, 1.0))?;
                    applied += 1;
                }
            }
        }
        Ok(applied)
    }

    /// Cluster hot episodes and promote dense clusters into wisdom nodes.
    /// Returns how many wisdom nodes were created.
    pub fn synthesize_wisdom(&mut self) -> Result<usize> {
        let now = self.now();
        let planned = synthesize_wisdom(self.store.hot(), self.config.wisdom_cluster_tau, now);
        let created = planned.len();
        for wisdom in planned {
            self.wal_commit(RecordKind::Insert, WalPayload::NodeFull(wisdom.node.clone()))?;
            self.install_local(wisdom.node)?;
            for source in wisdom.sources {
                let Some(mut episode) = self.store.peek(source) else {
                    continue;
                };
                episode.tags.insert(PROMOTED_TAG.to_string());
                self.wal_commit(RecordKind::Update, WalPayload::NodeFull(episode.clone()))?;
                self.install_local(episode)?;
            }
        }
        Ok(created)
    }

    /// Make the on-disk state self-contained: fsync the WAL, write hot
    /// through to warm, compact stale warm entries into cold, persist
    /// every index segment, and advance the snapshot cursor
    pub fn snapshot(&mut self) -> Result<()> {
        let now = self.now();
        self.wal.flush().map_err(map_wal)?;
        self.store
            .flush_hot_to_warm()
            .map_err(|e| MindError::StorageIo(e.to_string()))?;
        let horizon =
            now.saturating_sub((self.config.freshness_window_days * 86_400_000.0) as u64);
        self.store
            .compact(horizon)
            .map_err(|e| MindError::StorageIo(e.to_string()))?;
        self.store
            .flush()
            .map_err(|e| MindError::StorageIo(e.to_string()))?;

        if let Err(e) = self.store.sparse().save(&self.config.path_of(files::SPARSE)) {
            warn!("sparse segment save failed: {}", e);
        }
        if let Err(e) = self.store.dense().save(&self.config.path_of(files::DENSE)) {
            warn!("dense segment save failed: {}", e);
        }
        if let Err(e) = self.triplets.save(&self.config.path_of(files::TRIPLETS)) {
            warn!("triplet index save failed: {}", e);
        }
        if let Err(e) = self.realms.save(&self.config.path_of(files::REALM)) {
            warn!("realm state save failed: {}", e);
        }
        if let Err(e) = self.review.save(&self.config.path_of(files::REVIEW)) {
            warn!("review queue save failed: {}", e);
        }

        let meta = SnapshotMeta {
            last_seq: self.wal.last_seq(),
            saved_ms: now,
        };
        std::fs::write(
            self.config.path_of(files::HOT_IDX),
            serde_json::to_vec_pretty(&meta)?,
        )?;
        info!(last_seq = meta.last_seq, "snapshot");
        Ok(())
    }

    // ==================================================================
    // HEALTH
    // ==================================================================

    /// Coherence of the graph: local/global/temporal/structural agreement
    pub fn coherence(&mut self) -> Result<Coherence> {
        self.sync_from_shared_field()?;
        let hot = self.store.hot();
        let now = self.now();
        if hot.is_empty() {
            return Ok(Coherence::default());
        }

        // local: weighted cosine agreement with each node's top neighbors
        let mut local_sum = 0.0f64;
        let mut local_count = 0usize;
        for node in hot.iter() {
            if node.embedding.is_zero() || node.edges.is_empty() {
                continue;
            }
            let mut edges: Vec<_> = node.edges.clone();
            edges.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
            let mut agree = 0.0f64;
            let mut weight_sum = 0.0f64;
            for edge in edges.iter().take(5) {
                let Some(neighbor) = hot.get(edge.target) else {
                    continue;
                };
                if neighbor.embedding.is_zero() {
                    continue;
                }
                let cos = node.embedding.approx_cosine(&neighbor.embedding) as f64;
                agree += edge.weight as f64 * cos.max(0.0);
                weight_sum += edge.weight as f64;
            }
            if weight_sum > 0.0 {
                local_sum += agree / weight_sum;
                local_count += 1;
            }
        }
        let local = if local_count > 0 {
            (local_sum / local_count as f64) as f32
        } else {
            1.0
        };

        // global: average pairwise cosine among a confidence-ranked sample
        let mut ranked: Vec<&Node> = hot.iter().filter(|n| !n.embedding.is_zero()).collect();
        ranked.sort_by(|a, b| {
            b.effective()
                .partial_cmp(&a.effective())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(self.config.coherence_sample);
        let global = if ranked.len() < 2 {
            1.0
        } else {
            let mut sum = 0.0f64;
            let mut pairs = 0usize;
            for i in 0..ranked.len() {
                for j in (i + 1)..ranked.len() {
                    sum += ranked[i]
                        .embedding
                        .approx_cosine(&ranked[j].embedding)
                        .max(0.0) as f64;
                    pairs += 1;
                }
            }
            (sum / pairs as f64) as f32
        };

        // temporal: fraction of hot nodes touched within the window
        let window_ms = (self.config.freshness_window_days * 86_400_000.0) as u64;
        let fresh = hot
            .iter()
            .filter(|n| now.saturating_sub(n.tau_accessed) <= window_ms)
            .count();
        let temporal = fresh as f32 / hot.len() as f32;

        // structural: connectedness above the weight floor
        let floor = self.config.structural_weight_floor;
        let disconnected = hot
            .iter()
            .filter(|n| !n.edges.iter().any(|e| e.weight > floor))
            .count();
        let structural = 1.0 - disconnected as f32 / hot.len() as f32;

        Ok(Coherence {
            local,
            global,
            temporal,
            structural,
        })
    }

    /// Vitality of the store and its indices
    pub fn health(&mut self) -> Result<MindHealth> {
        self.sync_from_shared_field()?;
        let now = self.now();
        let hot = self.store.hot();

        if hot.is_empty() {
            return Ok(MindHealth {
                structural: 1.0,
                semantic: 1.0,
                temporal: 1.0,
                capacity: 1.0,
            });
        }

        // structural: edge integrity (dangling targets)
        let mut edges = 0usize;
        let mut dangling = 0usize;
        for node in hot.iter() {
            for edge in &node.edges {
                edges += 1;
                if !self.store.contains(edge.target) {
                    dangling += 1;
                }
            }
        }
        let structural = if edges == 0 {
            1.0
        } else {
            1.0 - dangling as f32 / edges as f32
        };

        // semantic: dense-index agreement with the hot tier
        let expected = hot.iter().filter(|n| !n.embedding.is_zero()).count();
        let indexed = self.store.dense().len();
        let semantic = if expected == 0 {
            1.0
        } else {
            (indexed.min(expected) as f32) / (indexed.max(expected) as f32)
        };

        // temporal: freshness of access
        let window_ms = (self.config.freshness_window_days * 86_400_000.0) as u64;
        let fresh = hot
            .iter()
            .filter(|n| now.saturating_sub(n.tau_accessed) <= window_ms)
            .count();
        let temporal = fresh as f32 / hot.len() as f32;

        // capacity: hot-tier headroom
        let capacity = 1.0 - hot.len() as f32 / hot.capacity() as f32;

        Ok(MindHealth {
            structural,
            semantic,
            temporal,
            capacity,
        })
    }

    /// Visit every node: hot, then warm, then cold. Order is unspecified
    /// but stable within a tier for the lifetime of a snapshot.
    pub fn for_each_node(&mut self, f: impl FnMut(&Node)) -> Result<()> {
        self.sync_from_shared_field()?;
        self.store.for_each_node(f);
        Ok(())
    }

    /// Store census
    pub fn state(&mut self) -> Result<MindState> {
        self.sync_from_shared_field()?;
        Ok(MindState {
            total_nodes: self.store.total_len(),
            hot: self.store.hot_len(),
            warm: self.store.warm_len(),
            cold: self.store.cold_len(),
            yantra_ready: self.embedder.is_some(),
        })
    }

    // ==================================================================
    // LEDGERS
    // ==================================================================

    /// Persist session state as a `StoryThread` tagged `ledger`; works
    /// with or without an embedder
    pub fn save_ledger(
        &mut self,
        content: &str,
        session: Option<&str>,
        project: Option<&str>,
    ) -> Result<NodeId> {
        let embedding = match self.embed(content) {
            Ok(v) => QuantizedVector::quantize(&v),
            Err(MindError::EmbedderUnavailable) => QuantizedVector::zero(),
            Err(e) => return Err(e),
        };
        let mut tags = BTreeSet::new();
        tags.insert(LEDGER_TAG.to_string());
        if let Some(s) = session {
            tags.insert(format!("session:{}", s));
        }
        if let Some(p) = project {
            tags.insert(format!("project:{}", p));
        }
        self.insert_node(
            NodeType::StoryThread,
            embedding,
            content.as_bytes().to_vec(),
            Some(0.8),
            tags,
        )
    }

    /// The newest ledger matching the filters
    pub fn load_ledger(
        &mut self,
        session: Option<&str>,
        project: Option<&str>,
    ) -> Result<Option<(NodeId, String)>> {
        self.sync_from_shared_field()?;
        let newest = self
            .collect_ledgers(session, project)
            .into_iter()
            .next()
            .map(|(node, _, _)| (node.id, node.text()));
        Ok(newest)
    }

    /// Ledger summaries, newest first
    pub fn list_ledgers(
        &mut self,
        limit: usize,
        project: Option<&str>,
    ) -> Result<Vec<LedgerSummary>> {
        self.sync_from_shared_field()?;
        Ok(self
            .collect_ledgers(None, project)
            .into_iter()
            .take(limit)
            .map(|(node, session, project)| LedgerSummary {
                id: node.id,
                session,
                project,
                saved_ms: node.tau_created,
                excerpt: node.text().chars().take(120).collect(),
            })
            .collect())
    }

    /// Matching ledger nodes sorted newest-created first
    fn collect_ledgers(
        &self,
        session: Option<&str>,
        project: Option<&str>,
    ) -> Vec<(Node, Option<String>, Option<String>)> {
        let realms = &self.realms;
        let mut found = Vec::new();
        self.store.for_each_node(|n| {
            if n.node_type != NodeType::StoryThread || !n.tags.contains(LEDGER_TAG) {
                return;
            }
            if !realms.visible(n.realm()) {
                return;
            }
            let node_session = n
                .tags
                .iter()
                .find_map(|t| t.strip_prefix("session:"))
                .map(str::to_string);
            let node_project = n
                .tags
                .iter()
                .find_map(|t| t.strip_prefix("project:"))
                .map(str::to_string);
            if let Some(s) = session {
                if node_session.as_deref() != Some(s) {
                    return;
                }
            }
            if let Some(p) = project {
                if node_project.as_deref() != Some(p) {
                    return;
                }
            }
            found.push((n.clone(), node_session, node_project));
        });
        found.sort_by(|a, b| {
            b.0.tau_created
                .cmp(&a.0.tau_created)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        found
    }

    // ==================================================================
    // REALMS
    // ==================================================================

    pub fn current_realm(&self) -> &str {
        self.realms.current()
    }

    pub fn set_realm(&mut self, name: &str) -> Result<()> {
        self.realms.set_current(name)?;
        self.realms
            .save(&self.config.path_of(files::REALM))
            .map_err(|e| MindError::StorageIo(e.to_string()))
    }

    pub fn create_realm(&mut self, name: &str, parent: &str) -> Result<()> {
        self.realms.create(name, parent)?;
        self.realms
            .save(&self.config.path_of(files::REALM))
            .map_err(|e| MindError::StorageIo(e.to_string()))
    }

    // ==================================================================
    // REVIEW
    // ==================================================================

    pub fn submit_for_review(&mut self, id: NodeId) -> Result<()> {
        self.sync_from_shared_field()?;
        if !self.store.contains(id) {
            return Err(MindError::node_not_found(id));
        }
        let now = self.now();
        let source = self.source.clone();
        self.review.submit(id, &source, now);
        self.save_review()
    }

    pub fn approve_review(&mut self, id: NodeId, quality: u8) -> Result<f32> {
        let outcome = self.review.approve(id, quality)?;
        self.apply_review_outcome(id, outcome)
    }

    pub fn reject_review(&mut self, id: NodeId, quality: u8) -> Result<f32> {
        let outcome = self.review.reject(id, quality)?;
        self.apply_review_outcome(id, outcome)
    }

    /// Rewrite a node's payload as part of review; the embedding refreshes
    /// when an embedder is available and stays put otherwise
    pub fn edit_review(&mut self, id: NodeId, new_text: &str) -> Result<()> {
        self.review.edit(id)?;
        let embedding = match self.embed(new_text) {
            Ok(v) => Some(QuantizedVector::quantize(&v)),
            Err(MindError::EmbedderUnavailable) => None,
            Err(e) => return Err(e),
        };
        let payload = new_text.as_bytes().to_vec();
        self.update_node(id, move |n| {
            n.payload = payload;
            if let Some(embedding) = embedding {
                n.embedding = embedding;
            }
        })?;
        self.save_review()
    }

    pub fn defer_review(&mut self, id: NodeId) -> Result<()> {
        self.review.defer(id)?;
        self.save_review()
    }

    pub fn review_stats(&self) -> ReviewStats {
        self.review.stats()
    }

    /// Provenance trust of a source process
    pub fn trust_of(&self, source: &str) -> f32 {
        self.review.trust_of(source)
    }

    fn apply_review_outcome(&mut self, id: NodeId, outcome: ReviewOutcome) -> Result<f32> {
        let effective = if outcome.confidence_delta > 0.0 {
            self.strengthen(id, outcome.confidence_delta)?
        } else if outcome.confidence_delta < 0.0 {
            self.weaken(id, -outcome.confidence_delta)?
        } else {
            self.store
                .peek(id)
                .map(|n| n.effective())
                .ok_or_else(|| MindError::node_not_found(id))?
        };
        self.save_review()?;
        Ok(effective)
    }

    fn save_review(&self) -> Result<()> {
        self.review
            .save(&self.config.path_of(files::REVIEW))
            .map_err(|e| MindError::StorageIo(e.to_string()))
    }
}

fn system_now() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::normalize;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    const DAY_MS: u64 = 86_400_000;

    /// Deterministic bag-of-tokens embedder: shared tokens land in shared
    /// dimensions, so related texts get related vectors
    struct MockEmbedder;

    impl Embedder for MockEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedderError> {
            let mut v = vec![0.0f32; EMBEDDING_DIM];
            for token in text
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| t.len() >= 2)
            {
                let mut h: u64 = 0xcbf2_9ce4_8422_2325;
                for b in token.bytes() {
                    h ^= b as u64;
                    h = h.wrapping_mul(0x1_0000_01b3);
                }
                v[(h % EMBEDDING_DIM as u64) as usize] += 1.0;
                v[((h >> 24) % EMBEDDING_DIM as u64) as usize] += 0.5;
            }
            if v.iter().all(|&x| x == 0.0) {
                v[0] = 1.0;
            }
            normalize(&mut v);
            Ok(v)
        }
    }

    fn fixed_clock(ms: Arc<AtomicU64>) -> Box<dyn Fn() -> u64 + Send + Sync> {
        Box::new(move || ms.load(Ordering::SeqCst))
    }

    fn open_mind(root: &std::path::Path, clock_ms: Arc<AtomicU64>) -> Mind {
        let mut cfg = MindConfig::new(root.to_path_buf());
        cfg.warm_initial_bytes = 64 * 1024;
        let mut mind = Mind::open(cfg).unwrap();
        mind.set_embedder(Box::new(MockEmbedder));
        mind.set_clock(fixed_clock(clock_ms));
        mind
    }

    fn no_tags() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_remember_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock.clone());

        let mut tags = BTreeSet::new();
        tags.insert("tested".to_string());
        let id = mind
            .remember("The cache invalidates on write.", NodeType::Wisdom, Some(0.8), tags)
            .unwrap();

        clock.store(2_000, Ordering::SeqCst);
        let node = mind.get(id).unwrap().unwrap();
        assert_eq!(node.node_type, NodeType::Wisdom);
        assert_eq!(node.text(), "The cache invalidates on write.");
        assert!(node.tags.contains("tested"));
        assert!(node.tau_created <= 2_000);
        assert_eq!(node.tau_accessed, 2_000);
        assert_eq!(mind.text(id).unwrap().unwrap(), "The cache invalidates on write.");
    }

    #[test]
    fn test_remember_without_embedder_fails_vector_path_works() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = MindConfig::new(dir.path().to_path_buf());
        cfg.warm_initial_bytes = 64 * 1024;
        let mut mind = Mind::open(cfg).unwrap();

        let err = mind
            .remember("anything", NodeType::Episode, None, no_tags())
            .unwrap_err();
        assert!(matches!(err, MindError::EmbedderUnavailable));

        let mut v = vec![0.1f32; EMBEDDING_DIM];
        normalize(&mut v);
        let id = mind
            .remember_with_vector(NodeType::Episode, &v, None, b"by vector".to_vec(), no_tags())
            .unwrap();
        assert_eq!(mind.get(id).unwrap().unwrap().text(), "by vector");

        // Wrong width rejected
        assert!(mind
            .remember_with_vector(NodeType::Episode, &[0.5; 3], None, vec![], no_tags())
            .is_err());
    }

    #[test]
    fn test_recall_finds_by_term_and_vector() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);

        let id = mind
            .remember("The cache invalidates on write.", NodeType::Wisdom, Some(0.8), no_tags())
            .unwrap();
        let recalls = mind.recall("cache", 3).unwrap();
        assert_eq!(recalls.len(), 1);
        assert_eq!(recalls[0].id, id);
        assert!(recalls[0].similarity > 0.0);
        assert!(recalls[0].relevance > 0.0);
    }

    #[test]
    fn test_removed_node_never_recalled_again() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);

        let id = mind
            .remember("ephemeral fact about llamas", NodeType::Episode, None, no_tags())
            .unwrap();
        assert!(mind.get(id).unwrap().is_some());

        mind.remove_node(id).unwrap();
        assert!(mind.get(id).unwrap().is_none());
        let recalls = mind.recall("llamas", 10).unwrap();
        assert!(recalls.iter().all(|r| r.id != id));

        // Removing again reports not found
        assert!(matches!(
            mind.remove_node(id),
            Err(MindError::NotFound(_))
        ));
    }

    #[test]
    fn test_strengthen_weaken_clamp_and_n_monotone() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);
        let id = mind
            .remember("a belief under test", NodeType::Belief, Some(0.5), no_tags())
            .unwrap();

        let before = mind.get(id).unwrap().unwrap();
        let stronger = mind.strengthen(id, 0.2).unwrap();
        assert!(stronger >= before.effective());

        let weaker = mind.weaken(id, 0.4).unwrap();
        assert!(weaker <= stronger);

        for _ in 0..10 {
            mind.weaken(id, 0.5).unwrap();
        }
        let floor = mind.get(id).unwrap().unwrap();
        assert!(floor.confidence.mu >= 0.0);
        assert!(floor.effective() >= 0.0);
        assert!(floor.confidence.n >= before.confidence.n);
    }

    #[test]
    fn test_hebbian_accumulates_and_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);
        let a = mind
            .remember("The cache invalidates on write.", NodeType::Wisdom, Some(0.8), no_tags())
            .unwrap();
        let b = mind
            .remember("Use write-through for critical data.", NodeType::Wisdom, Some(0.8), no_tags())
            .unwrap();

        mind.hebbian_strengthen(a, b, 0.3).unwrap();
        mind.hebbian_strengthen(a, b, 0.3).unwrap();
        let node_a = mind.get(a).unwrap().unwrap();
        let node_b = mind.get(b).unwrap().unwrap();
        assert!((node_a.edge_weight(b, EdgeType::Similar).unwrap() - 0.6).abs() < 0.001);
        assert!((node_b.edge_weight(a, EdgeType::Similar).unwrap() - 0.6).abs() < 0.001);

        // Repeated reinforcement saturates at exactly 1.0
        for _ in 0..3 {
            mind.hebbian_strengthen(a, b, 0.3).unwrap();
        }
        let node_a = mind.get(a).unwrap().unwrap();
        assert!((node_a.edge_weight(b, EdgeType::Similar).unwrap() - 1.0).abs() < 1e-6);

        // Self-reinforcement is a no-op
        mind.hebbian_strengthen(a, a, 0.3).unwrap();
        assert!(mind.get(a).unwrap().unwrap().edge_weight(a, EdgeType::Similar).is_none());
    }

    #[test]
    fn test_connect_creates_entities_and_mentions() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);

        mind.connect("jwt", "prevents", "session-state", 0.9).unwrap();

        let triplets = mind.query_graph("jwt", "", "").unwrap();
        assert_eq!(triplets.len(), 1);
        assert_eq!(triplets[0].predicate, "prevents");
        assert_eq!(triplets[0].object, "session-state");
        assert!(triplets[0].weight >= 0.0);

        // Entity nodes exist and mention each other
        let jwt = mind.triplets.entity("jwt").unwrap();
        let session_state = mind.triplets.entity("session-state").unwrap();
        let jwt_node = mind.get(jwt).unwrap().unwrap();
        let ss_node = mind.get(session_state).unwrap().unwrap();
        assert_eq!(jwt_node.node_type, NodeType::Entity);
        assert!(jwt_node.edge_weight(session_state, EdgeType::Mentions).is_some());
        assert!(ss_node.edge_weight(jwt, EdgeType::Mentions).is_some());

        // Wildcard queries
        assert_eq!(mind.query_graph("", "", "session-state").unwrap().len(), 1);
        assert!(mind.query_graph("nope", "", "").unwrap().is_empty());
    }

    #[test]
    fn test_two_minds_converge_through_the_wal() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut p1 = open_mind(dir.path(), clock.clone());
        let mut p2 = open_mind(dir.path(), clock.clone());

        let x = p1.remember("A", NodeType::Episode, None, no_tags()).unwrap();

        p2.sync_from_shared_field().unwrap();
        let seen = p2.get(x).unwrap().unwrap();
        assert_eq!(seen.text(), "A");
        let before = seen.effective();

        p2.weaken(x, 0.2).unwrap();
        p1.sync_from_shared_field().unwrap();
        let after = p1.get(x).unwrap().unwrap().effective();
        assert!((before - after - 0.2).abs() < 0.05, "dropped {} -> {}", before, after);
    }

    #[test]
    fn test_tick_decays_prunes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock.clone());
        // Fast-fading operation vs a protected invariant
        let fading = mind
            .remember("temporary operational note", NodeType::Operation, Some(0.3), no_tags())
            .unwrap();
        let keeper = mind
            .remember("never divide by zero", NodeType::Invariant, Some(0.3), no_tags())
            .unwrap();

        let mu_before = mind.get(fading).unwrap().unwrap().confidence.mu;

        clock.store(1_000 + 400 * DAY_MS, Ordering::SeqCst);
        let report = mind.tick().unwrap();
        assert!(report.decayed >= 2);

        // P10: decay never raises mu; a year of operation decay prunes it
        assert!(mind.get(fading).unwrap().is_none());
        let kept = mind.get(keeper).unwrap().unwrap();
        assert!(kept.confidence.mu <= mu_before);
        assert_eq!(report.pruned, 1);
    }

    #[test]
    fn test_three_episodes_condense_into_wisdom() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);

        for i in 0..3 {
            mind.remember(
                &format!("deploy failed because the api token expired (attempt {})", i),
                NodeType::Episode,
                Some(0.6),
                no_tags(),
            )
            .unwrap();
        }
        let created = mind.synthesize_wisdom().unwrap();
        assert_eq!(created, 1);

        let wisdom = mind.recall_by_tag(PROMOTED_TAG, 10).unwrap();
        assert_eq!(wisdom.len(), 3, "all three episodes tagged promoted");

        let mut found = None;
        mind.store.for_each_node(|n| {
            if n.node_type == NodeType::Wisdom {
                found = Some((n.confidence.mu, n.text()));
            }
        });
        let (mu, text) = found.expect("wisdom node created");
        assert!(text.starts_with("Pattern observed (3 occurrences):"));
        assert!(mu >= 0.6 + 0.2 - 0.01 && mu <= 0.95);

        // A second pass has nothing left to condense
        assert_eq!(mind.synthesize_wisdom().unwrap(), 0);
    }

    #[test]
    fn test_realm_scoping_gates_recall() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);

        mind.create_realm("work", ROOT_REALM).unwrap();
        mind.create_realm("home", ROOT_REALM).unwrap();

        mind.set_realm("work").unwrap();
        let work_note = mind
            .remember("quarterly cache budget planning", NodeType::Episode, None, no_tags())
            .unwrap();
        assert_eq!(
            mind.get(work_note).unwrap().unwrap().realm(),
            Some("work")
        );

        // Visible inside its own realm
        let seen = mind.recall("cache budget", 5).unwrap();
        assert!(seen.iter().any(|r| r.id == work_note));

        // Invisible from a sibling realm: `work` is not an ancestor of `home`
        mind.set_realm("home").unwrap();
        let hidden = mind.recall("cache budget", 5).unwrap();
        assert!(hidden.iter().all(|r| r.id != work_note));
        assert!(mind.recall_by_tag("realm:work", 5).unwrap().is_empty());

        mind.set_realm("work").unwrap();
        assert_eq!(mind.current_realm(), "work");
        assert!(!mind.recall_by_tag("realm:work", 5).unwrap().is_empty());
    }

    #[test]
    fn test_ledger_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock.clone());

        let first = mind
            .save_ledger("state: midway through refactor", Some("s1"), Some("alpha"))
            .unwrap();
        clock.store(2_000, Ordering::SeqCst);
        let second = mind
            .save_ledger("state: refactor complete", Some("s2"), Some("alpha"))
            .unwrap();
        mind.save_ledger("other project notes", None, Some("beta"))
            .unwrap();

        // Newest first, filtered by project
        let (id, text) = mind.load_ledger(None, Some("alpha")).unwrap().unwrap();
        assert_eq!(id, second);
        assert_eq!(text, "state: refactor complete");

        let (id, _) = mind.load_ledger(Some("s1"), None).unwrap().unwrap();
        assert_eq!(id, first);

        let listed = mind.list_ledgers(10, Some("alpha")).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[0].project.as_deref(), Some("alpha"));

        assert!(mind.load_ledger(Some("missing"), None).unwrap().is_none());
    }

    #[test]
    fn test_review_flow_adjusts_confidence_and_trust() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);
        let id = mind
            .remember("untrusted claim", NodeType::Belief, Some(0.5), no_tags())
            .unwrap();
        let source = mind.source.clone();

        mind.submit_for_review(id).unwrap();
        assert_eq!(mind.review_stats().pending, 1);

        let before = mind.get(id).unwrap().unwrap().effective();
        mind.approve_review(id, 5).unwrap();
        let after = mind.get(id).unwrap().unwrap().effective();
        assert!(after > before);
        assert!(mind.trust_of(&source) > 0.5);

        // Reject drives confidence and trust back down
        mind.submit_for_review(id).unwrap();
        mind.reject_review(id, 1).unwrap();
        let rejected = mind.get(id).unwrap().unwrap().effective();
        assert!(rejected < after);
    }

    #[test]
    fn test_propagate_confidence_chain() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);
        let a = mind.remember("root of the chain", NodeType::Belief, Some(0.5), no_tags()).unwrap();
        let b = mind.remember("middle of the chain", NodeType::Belief, Some(0.5), no_tags()).unwrap();
        let c = mind.remember("end of the chain", NodeType::Belief, Some(0.5), no_tags()).unwrap();
        mind.connect_nodes(a, b, EdgeType::Supports, 1.0).unwrap();
        mind.connect_nodes(b, c, EdgeType::Supports, 1.0).unwrap();

        let (applied, total) = mind.propagate_confidence(a, 0.4, 0.5, 3).unwrap();
        assert_eq!(applied.len(), 2);
        assert!((applied[0].1 - 0.2).abs() < 1e-6);
        assert!((applied[1].1 - 0.1).abs() < 1e-6);
        assert!((total - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_forget_cascades_and_rewires() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);
        let upstream = mind.remember("upstream neighbor", NodeType::Belief, Some(0.8), no_tags()).unwrap();
        let center = mind.remember("about to be forgotten", NodeType::Episode, Some(0.8), no_tags()).unwrap();
        let downstream = mind.remember("downstream neighbor", NodeType::Belief, Some(0.8), no_tags()).unwrap();
        mind.connect_nodes(upstream, center, EdgeType::Supports, 0.9).unwrap();
        mind.connect_nodes(center, downstream, EdgeType::Supports, 0.9).unwrap();

        let up_before = mind.get(upstream).unwrap().unwrap().effective();
        mind.forget(center, true, true, 0.1).unwrap();

        assert!(mind.get(center).unwrap().is_none());
        // Cascade weakened the neighborhood
        assert!(mind.get(upstream).unwrap().unwrap().effective() < up_before);
        // Rewire bridged upstream to downstream
        let bridged = mind.get(upstream).unwrap().unwrap();
        assert!(bridged.edge_weight(downstream, EdgeType::Similar).is_some());
        // The act left an audit trail
        let audits = mind.recall_by_tag("audit", 5).unwrap();
        assert_eq!(audits.len(), 1);
        assert!(audits[0].text.contains("Forgot node"));
    }

    #[test]
    fn test_state_health_coherence_report() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);

        // Empty store reads as fully healthy
        let health = mind.health().unwrap();
        assert!((health.psi() - 1.0).abs() < 1e-6);
        assert_eq!(health.status(), crate::types::HealthStatus::Vital);

        mind.remember("a first memory", NodeType::Episode, None, no_tags()).unwrap();
        let state = mind.state().unwrap();
        assert_eq!(state.total_nodes, 1);
        assert_eq!(state.hot, 1);
        assert!(state.yantra_ready);

        let coherence = mind.coherence().unwrap();
        assert!(coherence.tau() >= 0.0 && coherence.tau() <= 1.0);
    }

    #[test]
    fn test_reopen_replays_into_same_state() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let (id, effective) = {
            let mut mind = open_mind(dir.path(), clock.clone());
            let id = mind
                .remember("durable wisdom about caches", NodeType::Wisdom, Some(0.8), no_tags())
                .unwrap();
            mind.strengthen(id, 0.1).unwrap();
            (id, mind.get(id).unwrap().unwrap().effective())
        };

        let mut reopened = open_mind(dir.path(), clock);
        let node = reopened.get(id).unwrap().unwrap();
        assert_eq!(node.text(), "durable wisdom about caches");
        assert!((node.effective() - effective).abs() < 1e-4);
        // And it is searchable again
        let recalls = reopened.recall("caches", 3).unwrap();
        assert_eq!(recalls[0].id, id);
    }

    #[test]
    fn test_snapshot_then_reopen_uses_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let id = {
            let mut mind = open_mind(dir.path(), clock.clone());
            let id = mind
                .remember("snapshotted memory", NodeType::Wisdom, Some(0.8), no_tags())
                .unwrap();
            mind.snapshot().unwrap();
            // Post-snapshot write rides the WAL tail
            mind.weaken(id, 0.1).unwrap();
            id
        };

        let meta: super::SnapshotMeta = serde_json::from_slice(
            &std::fs::read(dir.path().join(files::HOT_IDX)).unwrap(),
        )
        .unwrap();
        assert!(meta.last_seq > 0);

        let mut reopened = open_mind(dir.path(), clock);
        let node = reopened.get(id).unwrap().unwrap();
        assert_eq!(node.text(), "snapshotted memory");
        // The tail weaken survived the restart
        assert!(node.confidence.n >= 2);
    }

    #[test]
    fn test_full_resonate_observes_results_for_priming() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut mind = open_mind(dir.path(), clock);
        let id = mind
            .remember("the resonant memory of caching", NodeType::Wisdom, Some(0.8), no_tags())
            .unwrap();

        let recalls = mind.full_resonate("caching", 3, 0.5, 0.2, None).unwrap();
        assert!(recalls.iter().any(|r| r.id == id));
        assert!(mind.session.is_recent(id));

        // Cancellation short-circuits with no partial results
        let cancel = AtomicBool::new(true);
        let err = mind
            .full_resonate("caching", 3, 0.5, 0.2, Some(&cancel))
            .unwrap_err();
        assert!(matches!(err, MindError::Cancelled));
    }
}
