//! Quantized embedding vectors
//!
//! Embeddings are stored as 384 int8 components plus a per-vector
//! scale/offset, reconstructing `f = offset + scale * q`. Similarity is
//! approximated as a scaled integer dot product; when both source vectors
//! are L2-normalized the error against true cosine is bounded by the
//! quantization step.

use serde::{Deserialize, Serialize};

/// Embedding width. Matches all-MiniLM-L6-v2 and every index in the engine.
pub const EMBEDDING_DIM: usize = 384;

/// An int8-quantized embedding with per-vector dequantization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizedVector {
    /// 384 int8 components
    pub data: Vec<i8>,
    /// Dequantization scale
    pub scale: f32,
    /// Dequantization offset
    pub offset: f32,
}

impl QuantizedVector {
    /// Quantize a float vector with per-vector min/max scaling into int8
    pub fn quantize(v: &[f32]) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &x in v {
            min = min.min(x);
            max = max.max(x);
        }
        if !min.is_finite() || !max.is_finite() || (max - min) < f32::EPSILON {
            // Degenerate vector (constant or empty): store zeros with the
            // constant as offset so dequantization reproduces it
            return Self {
                data: vec![0i8; v.len()],
                scale: 0.0,
                offset: if min.is_finite() { (min + max) / 2.0 } else { 0.0 },
            };
        }
        let offset = (max + min) / 2.0;
        let scale = (max - min) / 254.0;
        let data = v
            .iter()
            .map(|&x| (((x - offset) / scale).round().clamp(-127.0, 127.0)) as i8)
            .collect();
        Self { data, scale, offset }
    }

    /// The all-zero vector (entities created on demand carry one)
    pub fn zero() -> Self {
        Self {
            data: vec![0i8; EMBEDDING_DIM],
            scale: 0.0,
            offset: 0.0,
        }
    }

    /// True when every component is zero and the offset carries no signal
    pub fn is_zero(&self) -> bool {
        self.offset == 0.0 && self.data.iter().all(|&q| q == 0)
    }

    /// Reconstruct the float vector
    pub fn dequantize(&self) -> Vec<f32> {
        self.data
            .iter()
            .map(|&q| self.offset + self.scale * q as f32)
            .collect()
    }

    /// Cosine approximation from the integer representation. The heavy
    /// lifting is three integer accumulators (dot product, component sums,
    /// squared sums); the per-vector scale/offset then reconstructs the
    /// cosine of the dequantized vectors. Error against true cosine is
    /// bounded by the quantization step when both sources were normalized.
    pub fn approx_cosine(&self, other: &QuantizedVector) -> f32 {
        let d = self.data.len();
        if d == 0 || d != other.data.len() {
            return 0.0;
        }
        let mut dot: i64 = 0;
        let mut sum_a: i64 = 0;
        let mut sum_b: i64 = 0;
        let mut sq_a: i64 = 0;
        let mut sq_b: i64 = 0;
        for (&qa, &qb) in self.data.iter().zip(other.data.iter()) {
            let (qa, qb) = (qa as i64, qb as i64);
            dot += qa * qb;
            sum_a += qa;
            sum_b += qb;
            sq_a += qa * qa;
            sq_b += qb * qb;
        }

        let d = d as f64;
        let (sa, oa) = (self.scale as f64, self.offset as f64);
        let (sb, ob) = (other.scale as f64, other.offset as f64);

        // dot(f_a, f_b) with f = offset + scale * q, expanded
        let dequantized_dot =
            d * oa * ob + oa * sb * sum_b as f64 + ob * sa * sum_a as f64 + sa * sb * dot as f64;
        let norm_a = (d * oa * oa + 2.0 * oa * sa * sum_a as f64 + sa * sa * sq_a as f64).sqrt();
        let norm_b = (d * ob * ob + 2.0 * ob * sb * sum_b as f64 + sb * sb * sq_b as f64).sqrt();
        if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
            return 0.0;
        }
        ((dequantized_dot / (norm_a * norm_b)).clamp(-1.0, 1.0)) as f32
    }
}

/// Exact cosine similarity between float vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        na += x as f64 * x as f64;
        nb += y as f64 * y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())) as f32
}

/// L2-normalize in place; leaves the zero vector untouched
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
