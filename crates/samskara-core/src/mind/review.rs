//! Review queue
//!
//! Human-in-the-loop quality control. Submitted nodes wait for a verdict;
//! approve/reject translate quality (1-5) into a confidence delta, and
//! half of every delta flows into a provenance trust score for the node's
//! source (usually a process id).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MindError, Result};
use crate::types::NodeId;

/// Verdict state of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Edited,
    Deferred,
}

/// A node awaiting (or past) review
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub id: NodeId,
    pub source: String,
    pub submitted_ms: u64,
    pub status: ReviewStatus,
}

/// Aggregate counts for the stats surface
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub edited: usize,
    pub deferred: usize,
}

/// Outcome of a review action: the confidence delta the facade applies
/// to the node (positive = strengthen)
#[derive(Debug, Clone, Copy)]
pub struct ReviewOutcome {
    pub confidence_delta: f32,
}

/// Persisted queue plus per-source trust
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReviewQueue {
    entries: Vec<ReviewEntry>,
    /// Source -> trust in [0, 1]; fresh sources start at 0.5
    trust: HashMap<String, f32>,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a node for review; re-submitting a pending node is a no-op
    pub fn submit(&mut self, id: NodeId, source: &str, now_ms: u64) {
        if self
            .entries
            .iter()
            .any(|e| e.id == id && e.status == ReviewStatus::Pending)
        {
            return;
        }
        self.entries.push(ReviewEntry {
            id,
            source: source.to_string(),
            submitted_ms: now_ms,
            status: ReviewStatus::Pending,
        });
    }

    /// Approve with quality 1-5: confidence rises by `0.05 * max(q-3, 0)`
    pub fn approve(&mut self, id: NodeId, quality: u8) -> Result<ReviewOutcome> {
        let delta = 0.05 * (quality.clamp(1, 5) as f32 - 3.0).max(0.0);
        self.resolve(id, ReviewStatus::Approved, delta)
    }

    /// Reject with quality 1-5: confidence falls by
    /// `max(0.1, 0.07 * (3-q))`
    pub fn reject(&mut self, id: NodeId, quality: u8) -> Result<ReviewOutcome> {
        let drop = (0.07 * (3.0 - quality.clamp(1, 5) as f32)).max(0.1);
        self.resolve(id, ReviewStatus::Rejected, -drop)
    }

    /// Mark edited; the facade rewrites the payload, confidence holds
    pub fn edit(&mut self, id: NodeId) -> Result<ReviewOutcome> {
        self.resolve(id, ReviewStatus::Edited, 0.0)
    }

    /// Push back onto the queue for later
    pub fn defer(&mut self, id: NodeId) -> Result<ReviewOutcome> {
        self.resolve(id, ReviewStatus::Deferred, 0.0)
    }

    /// Trust score of a source; unseen sources sit at 0.5
    pub fn trust_of(&self, source: &str) -> f32 {
        self.trust.get(source).copied().unwrap_or(0.5)
    }

    pub fn stats(&self) -> ReviewStats {
        let mut stats = ReviewStats::default();
        for e in &self.entries {
            match e.status {
                ReviewStatus::Pending => stats.pending += 1,
                ReviewStatus::Approved => stats.approved += 1,
                ReviewStatus::Rejected => stats.rejected += 1,
                ReviewStatus::Edited => stats.edited += 1,
                ReviewStatus::Deferred => stats.deferred += 1,
            }
        }
        stats
    }

    pub fn pending(&self) -> impl Iterator<Item = &ReviewEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == ReviewStatus::Pending)
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, body)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let body = std::fs::read(path)?;
        serde_json::from_slice(&body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn resolve(
        &mut self,
        id: NodeId,
        status: ReviewStatus,
        confidence_delta: f32,
    ) -> Result<ReviewOutcome> {
        let entry = self
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.id == id && matches!(e.status, ReviewStatus::Pending | ReviewStatus::Deferred))
            .ok_or_else(|| MindError::NotFound(format!("review entry for node {}", id)))?;
        entry.status = status;
        let source = entry.source.clone();

        // Provenance trust moves by half the confidence delta
        let trust = self.trust.entry(source).or_insert(0.5);
        *trust = (*trust + confidence_delta / 2.0).clamp(0.0, 1.0);

        Ok(ReviewOutcome { confidence_delta })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_dedupes_pending() {
        let mut q = ReviewQueue::new();
        let id = NodeId::generate(1);
        q.submit(id, "proc-1", 10);
        q.submit(id, "proc-1", 20);
        assert_eq!(q.stats().pending, 1);
    }

    #[test]
    fn test_approve_quality_deltas() {
        let mut q = ReviewQueue::new();
        let id = NodeId::generate(1);

        // Quality 5 -> +0.1; quality 3 -> 0; quality 1 -> 0 (clamped)
        q.submit(id, "proc-1", 0);
        let outcome = q.approve(id, 5).unwrap();
        assert!((outcome.confidence_delta - 0.1).abs() < 1e-6);

        q.submit(id, "proc-1", 1);
        let outcome = q.approve(id, 3).unwrap();
        assert!(outcome.confidence_delta.abs() < 1e-6);
    }

    #[test]
    fn test_reject_quality_deltas() {
        let mut q = ReviewQueue::new();
        let id = NodeId::generate(1);

        // Quality 1 -> -0.14; quality 3 -> floor at -0.1
        q.submit(id, "proc-1", 0);
        let outcome = q.reject(id, 1).unwrap();
        assert!((outcome.confidence_delta + 0.14).abs() < 1e-6);

        q.submit(id, "proc-1", 1);
        let outcome = q.reject(id, 3).unwrap();
        assert!((outcome.confidence_delta + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_trust_moves_by_half_delta() {
        let mut q = ReviewQueue::new();
        let id = NodeId::generate(1);
        assert!((q.trust_of("proc-1") - 0.5).abs() < 1e-6);

        q.submit(id, "proc-1", 0);
        q.approve(id, 5).unwrap();
        assert!((q.trust_of("proc-1") - 0.55).abs() < 1e-6);

        q.submit(id, "proc-1", 1);
        q.reject(id, 1).unwrap();
        assert!((q.trust_of("proc-1") - 0.48).abs() < 1e-6);
    }

    #[test]
    fn test_deferred_can_be_resolved_later() {
        let mut q = ReviewQueue::new();
        let id = NodeId::generate(1);
        q.submit(id, "proc-1", 0);
        q.defer(id).unwrap();
        assert_eq!(q.stats().deferred, 1);
        // A deferred entry still accepts a final verdict
        q.approve(id, 4).unwrap();
        assert_eq!(q.stats().approved, 1);
        assert_eq!(q.stats().deferred, 0);
    }

    #[test]
    fn test_resolving_unknown_entry_errors() {
        let mut q = ReviewQueue::new();
        assert!(q.approve(NodeId::generate(1), 4).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.queue");
        let mut q = ReviewQueue::new();
        let id = NodeId::generate(1);
        q.submit(id, "proc-1", 0);
        q.approve(id, 5).unwrap();
        q.save(&path).unwrap();

        let loaded = ReviewQueue::load(&path).unwrap();
        assert_eq!(loaded.stats().approved, 1);
        assert!((loaded.trust_of("proc-1") - 0.55).abs() < 1e-6);
    }
}
