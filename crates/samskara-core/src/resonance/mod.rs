//! Resonance engine
//!
//! The retrieval pipeline. One pass over the indices and the graph:
//!
//! 1. session refresh (done by the caller, which owns the context)
//! 2. seed retrieval from the dense and sparse indices, primed
//! 3. attractor discovery
//! 4. spreading activation outward from the seeds
//! 5. attractor basin boost
//! 6. lateral inhibition of near-duplicates
//! 7. truncate and emit
//! 8. Hebbian reinforcement pairs for the top of the list
//! 9. priming feedback into the recent-observations ring
//!
//! The engine itself is read-only: it returns the ranked recalls plus the
//! Hebbian pairs, and the Mind facade applies touches, edge writes, and
//! priming feedback (so cancellation can never leave state half-mutated).

mod attractor;
mod inhibition;
mod lens;
mod session;

pub use attractor::{find_attractors, Attractor, AttractorSummary, BASIN_HOPS, MIN_DEGREE};
pub use inhibition::{lateral_inhibition, sort_candidates, Candidate};
pub use lens::Lens;
pub use session::{SessionContext, RECENT_CAPACITY};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::MindConfig;
use crate::error::{MindError, Result};
use crate::graph::ReverseEdgeIndex;
use crate::store::TieredStore;
use crate::types::{Node, NodeId, NodeType, QuantizedVector};

/// How many emitted results participate in Hebbian reinforcement
pub const HEBBIAN_TOP: usize = 5;

/// One ranked result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recall {
    pub id: NodeId,
    pub text: String,
    pub embedding: QuantizedVector,
    pub node_type: NodeType,
    /// Effective confidence at emission time
    pub confidence: f32,
    /// Phase-2 similarity; zero when the node arrived via spread only
    pub similarity: f32,
    /// Final pipeline score
    pub relevance: f32,
}

/// Which phases a particular recall shape runs
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    pub k: usize,
    pub spread_strength: f32,
    pub hebbian_strength: f32,
    /// Apply priming boosts during seed scoring
    pub primed: bool,
    /// Run spreading activation (phase 4)
    pub spread: bool,
    /// Run attractor discovery and boost (phases 3 and 5)
    pub attractors: bool,
    /// Run lateral inhibition (phase 6)
    pub inhibit: bool,
    /// Produce Hebbian pairs (phase 8)
    pub hebbian: bool,
    /// Replace the type-boost table with lens weights
    pub lens: Option<Lens>,
}

impl PipelinePlan {
    /// `recall(q, k)`: primed seeds, inhibition, truncation
    pub fn recall(k: usize) -> Self {
        Self {
            k,
            spread_strength: 0.0,
            hebbian_strength: 0.0,
            primed: true,
            spread: false,
            attractors: false,
            inhibit: true,
            hebbian: false,
            lens: None,
        }
    }

    /// `resonate(q, k, spread)`: the graph phases without priming boost
    pub fn resonate(k: usize, spread_strength: f32, hebbian_strength: f32) -> Self {
        Self {
            k,
            spread_strength,
            hebbian_strength,
            primed: false,
            spread: true,
            attractors: true,
            inhibit: true,
            hebbian: true,
            lens: None,
        }
    }

    /// `full_resonate(q, k, spread, hebbian)`: everything
    pub fn full(k: usize, spread_strength: f32, hebbian_strength: f32) -> Self {
        Self {
            k,
            spread_strength,
            hebbian_strength,
            primed: true,
            spread: true,
            attractors: true,
            inhibit: true,
            hebbian: true,
            lens: None,
        }
    }

    /// `lens(q, lens, k)`: the re-ranked seed list only
    pub fn lens_view(k: usize, lens: Lens) -> Self {
        Self {
            k,
            spread_strength: 0.0,
            hebbian_strength: 0.0,
            primed: false,
            spread: false,
            attractors: false,
            inhibit: false,
            hebbian: false,
            lens: Some(lens),
        }
    }
}

/// What the pipeline hands back to the facade
#[derive(Debug, Default)]
pub struct ResonanceOutcome {
    pub recalls: Vec<Recall>,
    /// Pairs among the top of the list to reinforce with `Similar` edges
    pub hebbian_pairs: Vec<(NodeId, NodeId)>,
}

fn check_cancel(cancel: Option<&AtomicBool>) -> Result<()> {
    if let Some(flag) = cancel {
        if flag.load(Ordering::Relaxed) {
            return Err(MindError::Cancelled);
        }
    }
    Ok(())
}

/// Run phases 2-8 against a query vector (plus the raw query text for the
/// sparse channel; explicit-vector callers pass `None` and the sparse
/// channel stays silent). Realm gating is injected via `realm_pass`;
/// phase 1 (session refresh) and phase 9 (priming feedback) belong to the
/// caller, which owns the mutable session.
#[allow(clippy::too_many_arguments)]
pub fn run(
    store: &TieredStore,
    reverse: &ReverseEdgeIndex,
    session: &SessionContext,
    config: &MindConfig,
    query: &[f32],
    query_text: Option<&str>,
    now_ms: u64,
    plan: &PipelinePlan,
    realm_pass: impl Fn(&Node) -> bool,
    cancel: Option<&AtomicBool>,
) -> Result<ResonanceOutcome> {
    if plan.k == 0 {
        return Ok(ResonanceOutcome::default());
    }

    // ---- phase 2: seed retrieval --------------------------------------
    check_cancel(cancel)?;
    let pool = (plan.k * config.seed_multiplier).max(plan.k);
    let mut candidates = seed_candidates(
        store, session, config, query, query_text, now_ms, plan, &realm_pass, pool,
    );

    // ---- phase 3: attractor discovery ---------------------------------
    check_cancel(cancel)?;
    let attractors = if plan.attractors {
        find_attractors(
            store.hot(),
            reverse,
            config.attractor_min_effective,
            config.attractor_max,
            now_ms,
        )
    } else {
        Vec::new()
    };

    // ---- phase 4: spreading activation --------------------------------
    check_cancel(cancel)?;
    if plan.spread && plan.spread_strength > 0.0 {
        spread_activation(store, config, plan, &realm_pass, &mut candidates);
    }

    // ---- phase 5: attractor boost -------------------------------------
    check_cancel(cancel)?;
    for attractor in &attractors {
        let factor = 1.0 + 0.2 * attractor.strength as f64;
        for c in candidates.iter_mut() {
            if attractor.basin.contains(&c.id) {
                c.score *= factor;
            }
        }
    }

    // ---- phase 6: lateral inhibition ----------------------------------
    check_cancel(cancel)?;
    if plan.inhibit {
        lateral_inhibition(
            &mut candidates,
            config.inhibition_threshold,
            config.inhibition_strength,
            config.inhibition_hard,
            |a, b| cosine_between(store, a, b),
        );
    } else {
        sort_candidates(&mut candidates);
    }

    // ---- phase 7: truncate and emit -----------------------------------
    candidates.truncate(plan.k);
    let recalls: Vec<Recall> = candidates
        .iter()
        .filter_map(|c| {
            store.hot().get(c.id).map(|n| Recall {
                id: n.id,
                text: n.text(),
                embedding: n.embedding.clone(),
                node_type: n.node_type,
                confidence: n.effective(),
                similarity: c.similarity,
                relevance: c.score as f32,
            })
        })
        .collect();

    // ---- phase 8: Hebbian pairs ---------------------------------------
    check_cancel(cancel)?;
    let mut hebbian_pairs = Vec::new();
    if plan.hebbian && plan.hebbian_strength > 0.0 {
        let top: Vec<NodeId> = recalls.iter().take(HEBBIAN_TOP).map(|r| r.id).collect();
        for i in 0..top.len() {
            for j in (i + 1)..top.len() {
                hebbian_pairs.push((top[i], top[j]));
            }
        }
    }

    Ok(ResonanceOutcome {
        recalls,
        hebbian_pairs,
    })
}

/// Phase 2: fuse dense and sparse hits into scored seed candidates.
/// The sparse channel is rank-normalized into similarity space before
/// fusion; a node present in both keeps the larger similarity.
#[allow(clippy::too_many_arguments)]
fn seed_candidates(
    store: &TieredStore,
    session: &SessionContext,
    config: &MindConfig,
    query: &[f32],
    query_text: Option<&str>,
    now_ms: u64,
    plan: &PipelinePlan,
    realm_pass: &impl Fn(&Node) -> bool,
    pool: usize,
) -> Vec<Candidate> {
    let dense_hits = store.dense_search(query, pool);
    let sparse_hits = match query_text {
        Some(text) => store.sparse_search(text, pool),
        None => vec![],
    };

    let mut similarity: HashMap<NodeId, f32> = HashMap::new();
    for (id, sim) in dense_hits {
        similarity.insert(id, sim);
    }
    let max_sparse = sparse_hits.first().map(|(_, s)| *s).unwrap_or(0.0).max(f32::EPSILON);
    for (id, score) in sparse_hits {
        let normalized = score / max_sparse;
        similarity
            .entry(id)
            .and_modify(|s| *s = s.max(normalized))
            .or_insert(normalized);
    }

    let mut candidates: Vec<Candidate> = similarity
        .into_iter()
        .filter_map(|(id, sim)| {
            let node = store.hot().get(id)?;
            if !realm_pass(node) {
                return None;
            }
            let score = seed_score(node, sim, session, config, now_ms, plan);
            Some(Candidate::new(id, score, sim))
        })
        .collect();
    sort_candidates(&mut candidates);
    candidates.truncate(pool);
    candidates
}

/// `s = sim * conf_factor * recency_factor * type_boost`, then priming
fn seed_score(
    node: &Node,
    similarity: f32,
    session: &SessionContext,
    config: &MindConfig,
    now_ms: u64,
    plan: &PipelinePlan,
) -> f64 {
    let conf_w = match &plan.lens {
        Some(lens) => (config.confidence_weight + lens.bias).clamp(0.0, 1.0),
        None => config.confidence_weight,
    };
    let conf_factor = (1.0 - conf_w) + conf_w * node.effective();

    let days = now_ms.saturating_sub(node.tau_accessed) as f32 / 86_400_000.0;
    let recency_factor = 1.0
        + config.recency_weight
            * (-std::f32::consts::LN_2 * days / config.recency_half_life_days).exp();

    let type_boost = match &plan.lens {
        Some(lens) => lens.attention_for(node.node_type),
        None => node.node_type.retrieval_boost(),
    };

    let mut score = similarity as f64
        * conf_factor as f64
        * recency_factor as f64
        * type_boost as f64;

    if plan.primed {
        let mut boost = 0.0f64;
        if session.is_recent(node.id) {
            boost += config.priming_recent_boost as f64;
        }
        if session.is_intention(node.id) {
            boost += config.priming_intention_boost as f64;
        }
        if session.in_goal_basin(node.id) {
            boost += config.priming_basin_boost as f64;
        }
        score *= 1.0 + boost;
    }
    score
}

/// Phase 4: BFS from every seed through outgoing edges. The activation
/// handed to a neighbor is `parent * spread_strength * edge_weight`
/// (times the lens edge preference when a lens is set); propagation halts
/// below the configured floor, and each seed visits a node at most once.
fn spread_activation(
    store: &TieredStore,
    config: &MindConfig,
    plan: &PipelinePlan,
    realm_pass: &impl Fn(&Node) -> bool,
    candidates: &mut Vec<Candidate>,
) {
    let mut spread_sum: HashMap<NodeId, f64> = HashMap::new();

    for seed in candidates.iter() {
        let mut visited: std::collections::HashSet<NodeId> =
            std::collections::HashSet::from([seed.id]);
        let mut frontier: std::collections::VecDeque<(NodeId, f64, usize)> =
            std::collections::VecDeque::from([(seed.id, seed.score, 0)]);

        while let Some((current, activation, depth)) = frontier.pop_front() {
            if depth >= config.spread_max_hops {
                continue;
            }
            let Some(node) = store.hot().get(current) else {
                continue;
            };
            for edge in &node.edges {
                if !visited.insert(edge.target) {
                    continue;
                }
                let preference = plan
                    .lens
                    .as_ref()
                    .map(|l| l.edge_preference(edge.edge_type))
                    .unwrap_or(1.0);
                let next = activation
                    * plan.spread_strength as f64
                    * edge.weight as f64
                    * preference as f64;
                if next < config.spread_floor as f64 {
                    continue;
                }
                *spread_sum.entry(edge.target).or_default() += next;
                frontier.push_back((edge.target, next, depth + 1));
            }
        }
    }

    // Fold spread activation into existing candidates; nodes reached only
    // via spread join the pool with the spread sum as their whole score
    for c in candidates.iter_mut() {
        if let Some(sum) = spread_sum.remove(&c.id) {
            c.score += sum;
        }
    }
    for (id, sum) in spread_sum {
        let Some(node) = store.hot().get(id) else {
            continue;
        };
        if !realm_pass(node) {
            continue;
        }
        candidates.push(Candidate::new(id, sum, 0.0));
    }
}

/// Approximate cosine between two hot nodes' stored embeddings
fn cosine_between(store: &TieredStore, a: NodeId, b: NodeId) -> f32 {
    match (store.hot().get(a), store.hot().get(b)) {
        (Some(na), Some(nb)) => na.embedding.approx_cosine(&nb.embedding),
        _ => 0.0,
    }
}

// ============================================================================
// TESTS
// ============================================================================
