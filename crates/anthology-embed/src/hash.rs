use std::hash::{Hash, Hasher};

use anthology_core::traits::Embedder;
use anthology_core::types::EmbedderIdentity;
use twox_hash::XxHash64;

use crate::l2_normalize;

pub const HASH_MODEL_NAME: &str = "hash/xxh64-bag-of-words";

/// Deterministic bag-of-words embedder.
///
/// Each lowercased alphanumeric token is hashed into one of `dim` buckets.
/// Texts sharing vocabulary score higher against each other, which is enough
/// for offline development and tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let mut any = false;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let h = hash_token(&token);
            let idx = (h as usize) % self.dim;
            // Upper bits give each token a stable weight in (0.5, 1].
            let weight = 0.5 + 0.5 * (((h >> 32) as u32) as f32 / u32::MAX as f32);
            v[idx] += weight;
            any = true;
        }
        if !any {
            let idx = (hash_token(text) as usize) % self.dim;
            v[idx] = 1.0;
        }
        l2_normalize(&mut v);
        v
    }
}

fn hash_token(token: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    token.hash(&mut hasher);
    hasher.finish()
}

impl Embedder for HashEmbedder {
    fn identity(&self) -> EmbedderIdentity {
        EmbedderIdentity::new(HASH_MODEL_NAME, self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
