//! Dynamics
//!
//! The periodic processes that keep the graph alive: confidence decay and
//! pruning, queued feedback, wisdom synthesis out of clustered episodes,
//! and attractor settling. Everything here plans or applies mutations on
//! the hot tier; the Mind facade owns the tick ordering, the WAL deltas,
//! and the snapshot.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::resonance::Attractor;
use crate::store::HotStore;
use crate::types::{
    Confidence, EdgeType, Node, NodeId, NodeType, QuantizedVector,
};

// ============================================================================
// FEEDBACK QUEUE
// ============================================================================

/// Where a feedback delta lands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackTarget {
    Confidence(NodeId),
    Edge {
        from: NodeId,
        to: NodeId,
        edge_type: EdgeType,
    },
}

/// A queued signed adjustment, drained by the tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub target: FeedbackTarget,
    pub delta: f32,
}

/// FIFO of pending feedback
#[derive(Debug, Default)]
pub struct FeedbackQueue {
    entries: VecDeque<Feedback>,
}

impl FeedbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feedback: Feedback) {
        self.entries.push_back(feedback);
    }

    pub fn drain(&mut self) -> Vec<Feedback> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// DECAY AND PRUNING
// ============================================================================

/// Apply exponential decay to every hot node whose posterior has aged:
/// `mu *= exp(-decay_rate * dt_days)` with `dt` measured from the last
/// confidence update. `tau_accessed` is untouched. Returns the new
/// posteriors for WAL emission.
pub fn apply_decay(hot: &mut HotStore, now_ms: u64) -> Vec<(NodeId, Confidence)> {
    let ids: Vec<NodeId> = hot.ids().collect();
    let mut deltas = Vec::new();
    for id in ids {
        let Some(node) = hot.get_mut(id) else { continue };
        let dt_days = now_ms.saturating_sub(node.confidence.tau) as f32 / 86_400_000.0;
        if dt_days <= 0.0 {
            continue;
        }
        node.confidence.decay(node.decay_rate, dt_days, now_ms);
        deltas.push((id, node.confidence));
    }
    deltas
}

/// Hot nodes whose post-decay effective confidence fell below the prune
/// threshold, excluding the protected types
pub fn prune_candidates(hot: &HotStore, threshold: f32) -> Vec<NodeId> {
    let mut victims: Vec<NodeId> = hot
        .iter()
        .filter(|n| !n.node_type.prune_protected() && n.effective() < threshold)
        .map(|n| n.id)
        .collect();
    victims.sort();
    victims
}

// ============================================================================
// WISDOM SYNTHESIS
// ============================================================================

/// Tag marking an episode that already fed a wisdom node
pub const PROMOTED_TAG: &str = "promoted";

/// A planned wisdom node and the episodes that back it
#[derive(Debug, Clone)]
pub struct SynthesizedWisdom {
    pub node: Node,
    pub sources: Vec<NodeId>,
}

/// Cluster unpromoted hot episodes by pairwise cosine above `cluster_tau`
/// (single link); clusters of three or more condense into a Wisdom node
/// whose embedding is the cluster centroid and whose confidence mean is
/// the episode average plus 0.2, clamped at 0.95.
pub fn synthesize_wisdom(
    hot: &HotStore,
    cluster_tau: f32,
    now_ms: u64,
) -> Vec<SynthesizedWisdom> {
    let episodes: Vec<&Node> = hot
        .iter()
        .filter(|n| {
            n.node_type == NodeType::Episode
                && !n.tags.contains(PROMOTED_TAG)
                && !n.embedding.is_zero()
        })
        .collect();
    if episodes.len() < 3 {
        return Vec::new();
    }

    // Single-link clustering via union-find over the cosine graph
    let mut parent: Vec<usize> = (0..episodes.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    for i in 0..episodes.len() {
        for j in (i + 1)..episodes.len() {
            if episodes[i].embedding.approx_cosine(&episodes[j].embedding) > cluster_tau {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut clusters: std::collections::HashMap<usize, Vec<usize>> =
        std::collections::HashMap::new();
    for i in 0..episodes.len() {
        let root = find(&mut parent, i);
        clusters.entry(root).or_default().push(i);
    }

    let mut planned: Vec<SynthesizedWisdom> = clusters
        .into_values()
        .filter(|members| members.len() >= 3)
        .map(|members| {
            let mut centroid = vec![0.0f32; crate::types::EMBEDDING_DIM];
            let mut mu_sum = 0.0f32;
            for &m in &members {
                let v = episodes[m].embedding.dequantize();
                for (c, x) in centroid.iter_mut().zip(v.iter()) {
                    *c += x;
                }
                mu_sum += episodes[m].confidence.mu;
            }
            let count = members.len() as f32;
            for c in centroid.iter_mut() {
                *c /= count;
            }
            let mu = (mu_sum / count + 0.2).min(0.95);

            // Oldest member supplies the excerpt
            let lead = members
                .iter()
                .copied()
                .min_by_key(|&m| (episodes[m].tau_created, episodes[m].id))
                .unwrap_or(members[0]);
            let excerpt: String = episodes[lead].text().chars().take(80).collect();
            let payload = format!(
                "Pattern observed ({} occurrences): {}",
                members.len(),
                excerpt
            );

            let mut node = Node::new(
                NodeType::Wisdom,
                QuantizedVector::quantize(&centroid),
                payload.into_bytes(),
                mu,
                now_ms,
            );
            let sources: Vec<NodeId> = members.iter().map(|&m| episodes[m].id).collect();
            for &src in &sources {
                node.put_edge(src, EdgeType::EvolvedFrom, 0.8);
            }
            SynthesizedWisdom { node, sources }
        })
        .collect();
    planned.sort_by_key(|w| w.sources.iter().copied().min());
    planned
}

// ============================================================================
// ATTRACTOR SETTLING
// ============================================================================

/// One bounded embedding nudge toward the nearest attractor:
/// `e' = e + strength * (attractor_e - e)`. Returns the new embeddings;
/// the facade writes them back and emits full-node WAL updates.
pub fn settle_toward_attractors(
    hot: &HotStore,
    attractors: &[Attractor],
    strength: f32,
) -> Vec<(NodeId, QuantizedVector)> {
    if attractors.is_empty() || strength <= 0.0 {
        return Vec::new();
    }
    let attractor_embeddings: Vec<(NodeId, Vec<f32>)> = attractors
        .iter()
        .filter_map(|a| {
            hot.get(a.id)
                .filter(|n| !n.embedding.is_zero())
                .map(|n| (a.id, n.embedding.dequantize()))
        })
        .collect();
    if attractor_embeddings.is_empty() {
        return Vec::new();
    }

    let mut nudged = Vec::new();
    for node in hot.iter() {
        if node.embedding.is_zero() || attractors.iter().any(|a| a.id == node.id) {
            continue;
        }
        let own = node.embedding.dequantize();
        let nearest = attractor_embeddings
            .iter()
            .max_by(|(_, a), (_, b)| {
                let ca = crate::types::cosine_similarity(&own, a);
                let cb = crate::types::cosine_similarity(&own, b);
                ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(_, e)| e);
        let Some(target) = nearest else { continue };
        let settled: Vec<f32> = own
            .iter()
            .zip(target.iter())
            .map(|(o, t)| o + strength * (t - o))
            .collect();
        nudged.push((node.id, QuantizedVector::quantize(&settled)));
    }
    nudged
}

// ============================================================================
// TESTS
// ============================================================================
