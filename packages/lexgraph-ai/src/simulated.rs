//! Deterministic embedding backend for stress tests and cost-free runs.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::error::Result;
use crate::provider::EmbeddingBackend;

/// Produces pseudo-random unit vectors seeded from the input text, so the
/// same text always maps to the same vector without any network call.
pub struct SimulatedBackend {
    config: EmbeddingConfig,
}

impl SimulatedBackend {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let seed = u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"));
        let mut rng = StdRng::seed_from_u64(seed);

        let mut vector: Vec<f32> = (0..self.config.dimensions)
            .map(|_| rng.gen_range(-1.0f32..1.0f32))
            .collect();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn max_batch_size(&self) -> usize {
        512
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}
