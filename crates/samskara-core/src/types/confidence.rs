//! Bayesian confidence
//!
//! Confidence is a value, not behavior: the posterior `{mu, sigma_sq, n, tau}`
//! lives on the node and the update law is a pure function applied by
//! whoever observed the evidence. Ranking always consumes the conservative
//! `effective` estimate `mu - sqrt(sigma_sq)`.

use serde::{Deserialize, Serialize};

/// Initial posterior variance for a freshly observed node
pub const DEFAULT_SIGMA_SQ: f32 = 0.01;

/// Bayesian confidence posterior carried on every node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confidence {
    /// Posterior mean in [0, 1]
    pub mu: f32,
    /// Posterior variance
    pub sigma_sq: f32,
    /// Evidence count; monotone non-decreasing over a node's lifetime
    pub n: u32,
    /// Millisecond timestamp of the last update
    pub tau: u64,
}

impl Confidence {
    /// A posterior seeded from a caller-supplied prior mean
    pub fn new(mu: f32, now_ms: u64) -> Self {
        Self {
            mu: mu.clamp(0.0, 1.0),
            sigma_sq: DEFAULT_SIGMA_SQ,
            n: 1,
            tau: now_ms,
        }
    }

    /// Conservative estimate used everywhere ranking needs a scalar
    pub fn effective(&self) -> f32 {
        (self.mu - self.sigma_sq.sqrt()).clamp(0.0, 1.0)
    }

    /// Update on evidence `positive` with weight `w` in [0, 1]:
    /// `n += 1; a = 1/n; mu += a*w*(e - mu); sigma_sq *= 1 - a; tau = now`
    pub fn update(&mut self, positive: bool, w: f32, now_ms: u64) {
        let e: f32 = if positive { 1.0 } else { 0.0 };
        self.n = self.n.saturating_add(1);
        let alpha = 1.0 / self.n as f32;
        self.mu = (self.mu + alpha * w * (e - self.mu)).clamp(0.0, 1.0);
        self.sigma_sq *= 1.0 - alpha;
        self.tau = now_ms;
    }

    /// Raise `mu` by an absolute `delta`, narrowing the posterior.
    /// Clamps so `effective` stays within [0, 1].
    pub fn strengthen(&mut self, delta: f32, now_ms: u64) {
        self.n = self.n.saturating_add(1);
        self.mu = (self.mu + delta.max(0.0)).clamp(0.0, 1.0);
        self.sigma_sq *= 1.0 - 1.0 / self.n as f32;
        self.tau = now_ms;
    }

    /// Lower `mu` by an absolute `delta`, narrowing the posterior
    pub fn weaken(&mut self, delta: f32, now_ms: u64) {
        self.n = self.n.saturating_add(1);
        self.mu = (self.mu - delta.max(0.0)).clamp(0.0, 1.0);
        self.sigma_sq *= 1.0 - 1.0 / self.n as f32;
        self.tau = now_ms;
    }

    /// Exponential decay of the mean: `mu *= exp(-rate * dt_days)`.
    /// Applied only by the dynamics tick so multi-process observations
    /// stay deterministic under WAL replay.
    pub fn decay(&mut self, rate: f32, dt_days: f32, now_ms: u64) {
        self.mu *= (-rate * dt_days.max(0.0)).exp();
        self.tau = now_ms;
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self {
            mu: 0.5,
            sigma_sq: DEFAULT_SIGMA_SQ,
            n: 1,
            tau: 0,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_is_conservative() {
        let c = Confidence::new(0.8, 0);
        assert!(c.effective() < c.mu);
        assert!((c.effective() - (0.8 - 0.1)).abs() < 1e-6);
    }

    #[test]
    fn test_update_moves_toward_evidence() {
        let mut c = Confidence::new(0.5, 0);
        let before = c.mu;
        c.update(true, 1.0, 10);
        assert!(c.mu > before);
        assert_eq!(c.n, 2);
        assert_eq!(c.tau, 10);

        let before = c.mu;
        c.update(false, 1.0, 20);
        assert!(c.mu < before);
        assert_eq!(c.n, 3);
    }

    #[test]
    fn test_n_is_monotone() {
        let mut c = Confidence::new(0.5, 0);
        let mut last = c.n;
        for i in 0..50 {
            if i % 3 == 0 {
                c.strengthen(0.1, i);
            } else if i % 3 == 1 {
                c.weaken(0.1, i);
            } else {
                c.update(i % 2 == 0, 0.5, i);
            }
            assert!(c.n >= last);
            last = c.n;
        }
    }

    #[test]
    fn test_strengthen_never_decreases_effective() {
        let mut c = Confidence::new(0.3, 0);
        let before = c.effective();
        c.strengthen(0.2, 1);
        assert!(c.effective() >= before);
        // Saturation clamps at 1.0
        for _ in 0..20 {
            c.strengthen(0.3, 2);
        }
        assert!(c.mu <= 1.0);
        assert!(c.effective() <= 1.0);
    }

    #[test]
    fn test_weaken_never_increases_effective() {
        let mut c = Confidence::new(0.9, 0);
        let before = c.effective();
        c.weaken(0.2, 1);
        assert!(c.effective() <= before);
        for _ in 0..20 {
            c.weaken(0.3, 2);
        }
        assert!(c.mu >= 0.0);
    }

    #[test]
    fn test_decay_shrinks_mu() {
        let mut c = Confidence::new(0.8, 0);
        let before = c.mu;
        c.decay(0.05, 10.0, 1);
        assert!(c.mu < before);
        c.decay(0.05, 0.0, 2);
        // Zero elapsed time is a no-op on mu
        let held = c.mu;
        c.decay(0.05, 0.0, 3);
        assert!((c.mu - held).abs() < 1e-7);
    }
}
