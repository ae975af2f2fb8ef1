//! Graph coherence and store health
//!
//! Two scalar health readings: coherence `tau` measures how much the graph
//! agrees with itself, vitality `psi` measures how well the store and its
//! indices are doing. Both decompose into four [0,1] components.

use serde::{Deserialize, Serialize};

/// Internal agreement of the memory graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coherence {
    /// Average cosine agreement between nodes and their top neighbors,
    /// weighted by edge weight
    pub local: f32,
    /// Average pairwise cosine among a sample of highest-confidence nodes
    pub global: f32,
    /// Fraction of hot nodes accessed within the freshness window
    pub temporal: f32,
    /// 1 - fraction of nodes with no outgoing edge above the weight threshold
    pub structural: f32,
}

impl Coherence {
    /// Scalar coherence: geometric mean of the four components
    pub fn tau(&self) -> f32 {
        let product = self.local.clamp(0.0, 1.0)
            * self.global.clamp(0.0, 1.0)
            * self.temporal.clamp(0.0, 1.0)
            * self.structural.clamp(0.0, 1.0);
        product.powf(0.25)
    }
}

impl Default for Coherence {
    fn default() -> Self {
        Self {
            local: 1.0,
            global: 1.0,
            temporal: 1.0,
            structural: 1.0,
        }
    }
}

/// Derived status for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Vital,
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Vital => "vital",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Critical => "critical",
        }
    }
}

/// Health of the store and its indices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindHealth {
    /// Edge integrity: 1 - fraction of dangling edge targets
    pub structural: f32,
    /// Dense-index agreement with the hot store
    pub semantic: f32,
    /// Fraction of nodes touched within the freshness window
    pub temporal: f32,
    /// Remaining hot-tier headroom
    pub capacity: f32,
}

impl MindHealth {
    /// Scalar vitality: arithmetic mean of the four components
    pub fn psi(&self) -> f32 {
        (self.structural + self.semantic + self.temporal + self.capacity) / 4.0
    }

    /// Status thresholds at 0.8 / 0.6 / 0.4
    pub fn status(&self) -> HealthStatus {
        let psi = self.psi();
        if psi >= 0.8 {
            HealthStatus::Vital
        } else if psi >= 0.6 {
            HealthStatus::Healthy
        } else if psi >= 0.4 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Critical
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
