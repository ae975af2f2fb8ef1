//! Mock embedder
//!
//! Deterministic embeddings with just enough semantics for the
//! scenarios: a small topic lexicon maps related words onto shared
//! dimensions, and every token also contributes hashed components so
//! unrelated texts stay distinguishable.

use samskara_core::{normalize, Embedder, EmbedderError, EMBEDDING_DIM};

/// Topic groups; every member of a group projects onto the same axis
const TOPICS: &[&[&str]] = &[
    &[
        "cache", "caches", "caching", "invalidate", "invalidates", "write", "writes",
        "through", "data", "critical", "strategy", "strategies",
    ],
    &[
        "deploy", "deployed", "deployment", "release", "rollback", "pipeline", "failed",
        "token", "expired",
    ],
    &[
        "jwt", "auth", "session", "signature", "login", "credential",
    ],
];

/// Weight of the shared topic axes relative to per-token hash components
const TOPIC_WEIGHT: f32 = 1.0;
const HASH_WEIGHT: f32 = 0.3;

/// Deterministic bag-of-tokens embedder with a topic lexicon
#[derive(Debug, Default)]
pub struct LexiconEmbedder;

impl LexiconEmbedder {
    pub fn new() -> Self {
        Self
    }
}

fn fnv(token: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in token.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

impl Embedder for LexiconEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        let mut any = false;
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 2)
        {
            any = true;
            for (axis, members) in TOPICS.iter().enumerate() {
                if members.contains(&token) {
                    v[axis] += TOPIC_WEIGHT;
                }
            }
            let h = fnv(token);
            // Hash components land past the topic axes
            let base = TOPICS.len() as u64;
            let span = (EMBEDDING_DIM as u64) - base;
            v[(base + h % span) as usize] += HASH_WEIGHT;
            v[(base + (h >> 24) % span) as usize] += HASH_WEIGHT * 0.5;
        }
        if !any {
            v[EMBEDDING_DIM - 1] = 1.0;
        }
        normalize(&mut v);
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samskara_core::cosine_similarity;

    #[test]
    fn test_topic_words_correlate() {
        let e = LexiconEmbedder::new();
        let a = e.embed("The cache invalidates on write.").unwrap();
        let b = e.embed("Use write-through for critical data.").unwrap();
        let q = e.embed("caching strategy").unwrap();
        assert!(cosine_similarity(&q, &a) > 0.5);
        assert!(cosine_similarity(&q, &b) > 0.5);

        let unrelated = e.embed("jwt login credential").unwrap();
        assert!(cosine_similarity(&q, &unrelated) < 0.3);
    }

    #[test]
    fn test_deterministic() {
        let e = LexiconEmbedder::new();
        assert_eq!(e.embed("same text").unwrap(), e.embed("same text").unwrap());
    }
}
