//! Text-to-vector embedding.
//!
//! [`EmbeddingProvider`] turns article text into 384-dimensional L2-normalized
//! vectors. The similarity index owns a provider and never sees the model.

pub mod local;

use anyhow::Result;

/// Number of dimensions in the embedding vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Synchronous text embedder. Callers in async contexts go through
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Only `"local"` exists (ONNX Runtime + all-MiniLM-L6-v2). Fails if the model
/// files are missing; run `feedmesh model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(local::OnnxEmbedder::new(config)?)),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// Reinterpret a vector as the little-endian byte blob sqlite-vec expects.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity of two unit vectors from the L2 distance sqlite-vec reports.
pub fn l2_to_cosine(distance: f64) -> f64 {
    1.0 - (distance * distance) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_conversion_preserves_values() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(bytes_to_embedding(embedding_to_bytes(&v)), v);
    }

    #[test]
    fn unit_distance_maps_to_cosine() {
        assert!((l2_to_cosine(0.0) - 1.0).abs() < 1e-9);
        // orthogonal unit vectors sit sqrt(2) apart
        assert!(l2_to_cosine(2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = crate::config::EmbeddingConfig {
            provider: "remote".into(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider"));
    }
}
