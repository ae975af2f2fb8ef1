//! Node identifiers
//!
//! A `NodeId` is 128 bits: the high 64 encode the creation millisecond,
//! the low 64 are random. Ids therefore sort by creation time first,
//! which keeps tie-breaks deterministic and WAL scans roughly temporal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// 128-bit node identifier: `(creation_ms << 64) | random`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(u128);

impl NodeId {
    /// Generate a fresh id for a node created at `now_ms`
    pub fn generate(now_ms: u64) -> Self {
        // UUID v4 supplies the 64 random low bits
        let random = Uuid::new_v4().as_u128() as u64;
        Self(((now_ms as u128) << 64) | random as u128)
    }

    /// Reconstruct from the raw 128-bit value (WAL decode path)
    pub fn from_u128(raw: u128) -> Self {
        Self(raw)
    }

    /// The raw 128-bit value (WAL encode path)
    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Creation timestamp encoded in the high 64 bits, in milliseconds
    pub fn created_ms(&self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// The nil id, used as a sentinel in tests and defaults
    pub fn nil() -> Self {
        Self(0)
    }
}

impl fmt::Display for NodeId {
    /// Canonical form: 32 hex digits grouped 8-4-4-4-12 with dashes
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = format!("{:032x}", self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

/// Error parsing a `NodeId` from its canonical string form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node id: {0}")]
pub struct ParseNodeIdError(pub String);

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return Err(ParseNodeIdError(s.to_string()));
        }
        u128::from_str_radix(&hex, 16)
            .map(NodeId)
            .map_err(|_| ParseNodeIdError(s.to_string()))
    }
}

// Human-readable formats (JSON) carry the canonical string; binary formats
// (bincode in the WAL and warm tier) carry the raw u128.
impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            Ok(NodeId(u128::deserialize(deserializer)?))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
