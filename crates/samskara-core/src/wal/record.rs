//! WAL record layout
//!
//! Fixed 30-byte header followed by a bincode payload. The `fmt` byte
//! selects the payload encoding; delta formats keep routine updates small:
//!
//! | fmt | payload |
//! |-----|---------|
//! | V0  | full node, float32 embedding (legacy, decode + replay only) |
//! | V1  | full node, int8 quantized embedding |
//! | V2  | touch delta `(id, tau_accessed)` |
//! | V3  | confidence delta `(id, {mu, sigma_sq, n, tau})` |
//! | V4  | edge delta `(from, to, edge_type, weight)` |

use serde::{Deserialize, Serialize};

use crate::types::{Confidence, Node, NodeId, NodeType, QuantizedVector};

use super::WalError;

/// `WALE` in big-endian byte order
pub const WAL_MAGIC: u32 = 0x5741_4C45;

/// Header size on disk
pub const HEADER_LEN: usize = 30;

// ============================================================================
// KINDS AND FORMATS
// ============================================================================

/// What a record does to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Insert = 0,
    Update = 1,
    Delete = 2,
    EdgeAdd = 3,
    EdgeRemove = 4,
}

impl RecordKind {
    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(RecordKind::Insert),
            1 => Some(RecordKind::Update),
            2 => Some(RecordKind::Delete),
            3 => Some(RecordKind::EdgeAdd),
            4 => Some(RecordKind::EdgeRemove),
            _ => None,
        }
    }
}

/// Payload encoding selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadFmt {
    V0 = 0,
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
}

impl PayloadFmt {
    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PayloadFmt::V0),
            1 => Some(PayloadFmt::V1),
            2 => Some(PayloadFmt::V2),
            3 => Some(PayloadFmt::V3),
            4 => Some(PayloadFmt::V4),
            _ => None,
        }
    }
}

// ============================================================================
// HEADER
// ============================================================================

/// `{magic, seq, ts_ms, kind, fmt, len, crc32}`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordHeader {
    pub seq: u64,
    pub ts_ms: u64,
    pub kind: RecordKind,
    pub fmt: PayloadFmt,
    pub len: u32,
    pub crc32: u32,
}

impl RecordHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&WAL_MAGIC.to_le_bytes());
        buf[4..12].copy_from_slice(&self.seq.to_le_bytes());
        buf[12..20].copy_from_slice(&self.ts_ms.to_le_bytes());
        buf[20] = self.kind as u8;
        buf[21] = self.fmt as u8;
        buf[22..26].copy_from_slice(&self.len.to_le_bytes());
        buf[26..30].copy_from_slice(&self.crc32.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, WalError> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap_or_default());
        if magic != WAL_MAGIC {
            return Err(WalError::Corrupt(format!("bad magic {:#010x}", magic)));
        }
        let kind = RecordKind::from_wire(buf[20])
            .ok_or_else(|| WalError::Corrupt(format!("unknown record kind {}", buf[20])))?;
        let fmt = PayloadFmt::from_wire(buf[21])
            .ok_or_else(|| WalError::Corrupt(format!("unknown payload fmt {}", buf[21])))?;
        Ok(Self {
            seq: u64::from_le_bytes(buf[4..12].try_into().unwrap_or_default()),
            ts_ms: u64::from_le_bytes(buf[12..20].try_into().unwrap_or_default()),
            kind,
            fmt,
            len: u32::from_le_bytes(buf[22..26].try_into().unwrap_or_default()),
            crc32: u32::from_le_bytes(buf[26..30].try_into().unwrap_or_default()),
        })
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// V0 wire node: same shape as `Node` but with a float32 embedding.
/// Only ever read back; new records always write V1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeF32 {
    pub id: NodeId,
    pub node_type: NodeType,
    pub embedding: Vec<f32>,
    pub payload: Vec<u8>,
    pub confidence: Confidence,
    pub tau_created: u64,
    pub tau_accessed: u64,
    pub decay_rate: f32,
    pub epsilon: f32,
    pub edges: Vec<crate::types::Edge>,
    pub tags: std::collections::BTreeSet<String>,
}

impl From<NodeF32> for Node {
    fn from(w: NodeF32) -> Self {
        Node {
            id: w.id,
            node_type: w.node_type,
            embedding: QuantizedVector::quantize(&w.embedding),
            payload: w.payload,
            confidence: w.confidence,
            tau_created: w.tau_created,
            tau_accessed: w.tau_accessed,
            decay_rate: w.decay_rate,
            epsilon: w.epsilon,
            edges: w.edges,
            tags: w.tags,
        }
    }
}

impl From<&Node> for NodeF32 {
    fn from(n: &Node) -> Self {
        NodeF32 {
            id: n.id,
            node_type: n.node_type,
            embedding: n.embedding.dequantize(),
            payload: n.payload.clone(),
            confidence: n.confidence,
            tau_created: n.tau_created,
            tau_accessed: n.tau_accessed,
            decay_rate: n.decay_rate,
            epsilon: n.epsilon,
            edges: n.edges.clone(),
            tags: n.tags.clone(),
        }
    }
}

/// V2: `(id, new tau_accessed)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TouchDelta {
    pub id: NodeId,
    pub tau_accessed: u64,
}

/// V3: `(id, full confidence posterior)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceDelta {
    pub id: NodeId,
    pub confidence: Confidence,
}

/// V4: `(from, to, edge_type, weight)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EdgeDelta {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: u8,
    pub weight: f32,
}

/// A decoded payload, ready to apply
#[derive(Debug, Clone)]
pub enum WalPayload {
    /// V0 or V1 full node
    NodeFull(Node),
    Touch(TouchDelta),
    Confidence(ConfidenceDelta),
    Edge(EdgeDelta),
}

impl WalPayload {
    /// The format this payload encodes as when written
    pub fn fmt(&self) -> PayloadFmt {
        match self {
            WalPayload::NodeFull(_) => PayloadFmt::V1,
            WalPayload::Touch(_) => PayloadFmt::V2,
            WalPayload::Confidence(_) => PayloadFmt::V3,
            WalPayload::Edge(_) => PayloadFmt::V4,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WalError> {
        let bytes = match self {
            WalPayload::NodeFull(n) => bincode::serialize(n),
            WalPayload::Touch(d) => bincode::serialize(d),
            WalPayload::Confidence(d) => bincode::serialize(d),
            WalPayload::Edge(d) => bincode::serialize(d),
        };
        bytes.map_err(|e| WalError::Codec(e.to_string()))
    }

    pub fn decode(fmt: PayloadFmt, bytes: &[u8]) -> Result<Self, WalError> {
        let codec = |e: bincode::Error| WalError::Codec(e.to_string());
        Ok(match fmt {
            PayloadFmt::V0 => {
                let wire: NodeF32 = bincode::deserialize(bytes).map_err(codec)?;
                WalPayload::NodeFull(wire.into())
            }
            PayloadFmt::V1 => WalPayload::NodeFull(bincode::deserialize(bytes).map_err(codec)?),
            PayloadFmt::V2 => WalPayload::Touch(bincode::deserialize(bytes).map_err(codec)?),
            PayloadFmt::V3 => WalPayload::Confidence(bincode::deserialize(bytes).map_err(codec)?),
            PayloadFmt::V4 => WalPayload::Edge(bincode::deserialize(bytes).map_err(codec)?),
        })
    }
}

/// A fully decoded record
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub header: RecordHeader,
    pub payload: WalPayload,
}

// ============================================================================
// TESTS
// ============================================================================
