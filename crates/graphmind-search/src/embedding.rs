use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use graphmind_core::{similarity::tokenize, EmbeddingClient, Result};

/// Deterministic, dependency-free reference embedding client: a hashed
/// bag-of-words projection into a fixed-size unit vector.
///
/// This is not meant to produce semantically meaningful vectors across
/// unrelated corpora; it exists so the rest of the search/reasoning stack
/// can be built and tested against a real `EmbeddingClient` without a
/// network call, and so the availability-toggled fallback path has
/// something concrete to flip.
pub struct HashEmbeddingClient {
    dimension: usize,
    available: AtomicBool,
}

impl HashEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates an outage (or restores service) for boundary-behavior
    /// tests that exercise the text-similarity fallback path.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    fn hash_token(&self, token: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let digest = hasher.finish();
        let index = (digest as usize) % self.dimension;
        // top bit of the hash picks the sign, giving the projection some
        // cancellation instead of an all-positive vector.
        let sign = if digest & (1 << 63) == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(vector);
        }
        for token in &tokens {
            let (index, sign) = self.hash_token(token);
            vector[index] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in vector.iter_mut() {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}
