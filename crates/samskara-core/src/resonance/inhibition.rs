//! Lateral inhibition
//!
//! Post-ranking suppression of near-duplicates. Candidates are walked in
//! score order; the first candidate of a cluster wins and suppresses every
//! later candidate whose embedding cosine exceeds the threshold. Soft mode
//! multiplies a loser's score by `1 - strength`; hard mode removes it.
//!
//! Suppressed losers are reinserted directly after their winner rather
//! than re-sorted by their reduced score: a loser can never drift away
//! from its winner, so equal-content twins stay adjacent no matter what
//! the rest of the pool scores. A candidate is only ever suppressed once;
//! on a repeat pass marked losers are reattached unreduced, which makes
//! the phase idempotent in both order and score.

use crate::types::NodeId;

/// A ranked candidate flowing through phases 2-7
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: NodeId,
    /// Running score; becomes `relevance` on emission
    pub score: f64,
    /// Phase-2 similarity; zero for spread-only candidates
    pub similarity: f32,
    /// Set once by inhibition; re-running the phase skips marked losers
    pub inhibited: bool,
}

impl Candidate {
    pub fn new(id: NodeId, score: f64, similarity: f32) -> Self {
        Self {
            id,
            score,
            similarity,
            inhibited: false,
        }
    }
}

/// Sort candidates by descending score (ids ascending on ties), then
/// apply winner-takes-most suppression. The emitted order is winners in
/// score order, each immediately followed by its suppressed losers.
/// `cosine_of` compares two candidates' embeddings.
pub fn lateral_inhibition(
    candidates: &mut Vec<Candidate>,
    threshold: f32,
    strength: f32,
    hard: bool,
    mut cosine_of: impl FnMut(NodeId, NodeId) -> f32,
) {
    sort_candidates(candidates);

    let mut winners: Vec<Candidate> = Vec::new();
    // Losers attached to each winner, parallel to `winners`
    let mut attached: Vec<Vec<Candidate>> = Vec::new();

    'walk: for candidate in candidates.drain(..) {
        if candidate.inhibited {
            // Already suppressed on an earlier pass: reattach behind the
            // same winner without reducing again
            for (winner, losers) in winners.iter().zip(attached.iter_mut()) {
                if cosine_of(winner.id, candidate.id) > threshold {
                    losers.push(candidate);
                    continue 'walk;
                }
            }
            // Its winner is not in this pool; it stands alone
            winners.push(candidate);
            attached.push(Vec::new());
            continue;
        }

        for (winner, losers) in winners.iter().zip(attached.iter_mut()) {
            if cosine_of(winner.id, candidate.id) > threshold {
                if !hard {
                    let mut loser = candidate;
                    loser.score *= (1.0 - strength) as f64;
                    loser.inhibited = true;
                    losers.push(loser);
                }
                continue 'walk;
            }
        }
        winners.push(candidate);
        attached.push(Vec::new());
    }

    for (winner, mut losers) in winners.into_iter().zip(attached) {
        candidates.push(winner);
        sort_candidates(&mut losers);
        candidates.append(&mut losers);
    }
}

/// Deterministic ranking: score descending, ids ascending on ties
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ============================================================================
// TESTS
// ============================================================================
