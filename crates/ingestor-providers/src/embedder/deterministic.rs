//! Reference embedder: a fixed, model-free projection into a 128-dimensional vector.
//! Deterministic in both the code-point-to-bucket mapping and the normalization, so
//! the same text always yields the same vector.

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::traits::{Embedder, Embedding};

const DIMENSIONS: usize = 128;

pub struct DeterministicEmbedder;

impl DeterministicEmbedder {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn embed_text(text: &str) -> Vec<f64> {
    let mut vector = vec![0.0_f64; DIMENSIONS];
    for (i, ch) in text.chars().enumerate() {
        let bucket = i % DIMENSIONS;
        let code = ch as u32;
        vector[bucket] += f64::from(code % 31) / 31.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt().max(1.0);
    for v in &mut vector {
        *v /= norm;
    }
    vector
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    async fn embed(&self, text: &str) -> ProviderResult<Embedding> {
        Ok(Embedding {
            model: "deterministic".to_string(),
            dimensions: DIMENSIONS,
            vector: embed_text(text),
        })
    }

    fn id(&self) -> &str {
        "deterministic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let embedder = DeterministicEmbedder::new();
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a.vector, b.vector);
        assert_eq!(a.dimensions, DIMENSIONS);
    }

    #[tokio::test]
    async fn vector_is_l2_normalized() {
        let embedder = DeterministicEmbedder::new();
        let result = embedder.embed("some reasonably long sentence of text").await.unwrap();
        let norm: f64 = result.vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9 || norm == 0.0);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let embedder = DeterministicEmbedder::new();
        let result = embedder.embed("").await.unwrap();
        assert!(result.vector.iter().all(|v| *v == 0.0));
    }
}
