//! Offline embedding provider based on feature hashing.
//!
//! [`HashingEmbeddingProvider`] needs no network or model weights. Each
//! lower-cased word is hashed into one of `dimensions` buckets and the
//! resulting count vector is L2-normalized. Texts that share words end up
//! close under cosine similarity, which is enough for local runs and tests.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// Default bucket count for [`HashingEmbeddingProvider`].
pub const DEFAULT_HASHING_DIMENSIONS: usize = 256;

/// A deterministic bag-of-words embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Create a provider producing vectors with `dimensions` buckets (at least one).
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    /// Embed synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let bucket = (fnv1a(&token) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

// FNV-1a keeps bucket assignment stable across processes, unlike `DefaultHasher`.
fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
