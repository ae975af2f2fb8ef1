//! Attractors
//!
//! High-confidence, well-connected nodes acting as retrieval centers.
//! An attractor's basin is everything reachable within two hops, following
//! edges in either direction; candidates landing in a basin get boosted
//! during phase 5 and nudged toward the attractor during settling.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::{neighborhood, ReverseEdgeIndex};
use crate::store::HotStore;
use crate::types::NodeId;

/// Minimum degree (in + out) for attractor candidacy
pub const MIN_DEGREE: usize = 2;

/// Basin radius in hops
pub const BASIN_HOPS: usize = 2;

/// A retrieval center and its gravitational basin
#[derive(Debug, Clone)]
pub struct Attractor {
    pub id: NodeId,
    /// `0.4*effective + 0.3*ln(1+degree) + 0.3*age_score`
    pub strength: f32,
    pub basin: HashSet<NodeId>,
}

/// Serializable summary for the API surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttractorSummary {
    pub id: NodeId,
    pub strength: f32,
    pub basin_size: usize,
}

impl Attractor {
    pub fn summary(&self) -> AttractorSummary {
        AttractorSummary {
            id: self.id,
            strength: self.strength,
            basin_size: self.basin.len(),
        }
    }
}

/// Age factor: saturates toward 1.0 as a node matures past ~a month
fn age_score(created_ms: u64, now_ms: u64) -> f32 {
    let age_days = (now_ms.saturating_sub(created_ms)) as f32 / 86_400_000.0;
    age_days / (age_days + 30.0)
}

/// Identify up to `max` attractors in the hot tier: nodes with effective
/// confidence at least `min_effective` and at least two edges counting
/// both directions, scored and returned strongest first.
pub fn find_attractors(
    hot: &HotStore,
    reverse: &ReverseEdgeIndex,
    min_effective: f32,
    max: usize,
    now_ms: u64,
) -> Vec<Attractor> {
    let mut scored: Vec<(NodeId, f32)> = hot
        .iter()
        .filter_map(|n| {
            let effective = n.effective();
            if effective < min_effective {
                return None;
            }
            let degree = n.edges.len() + reverse.of(n.id).len();
            if degree < MIN_DEGREE {
                return None;
            }
            let strength = 0.4 * effective
                + 0.3 * (1.0 + degree as f32).ln()
                + 0.3 * age_score(n.tau_created, now_ms);
            Some((n.id, strength))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(max);

    scored
        .into_iter()
        .map(|(id, strength)| {
            let basin = neighborhood(
                id,
                BASIN_HOPS,
                |n| {
                    hot.get(n)
                        .map(|node| node.edges.iter().map(|e| e.target).collect())
                        .unwrap_or_default()
                },
                |n| reverse.of(n).iter().map(|(s, _, _)| *s).collect(),
            );
            Attractor {
                id,
                strength,
                basin,
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
