//! ONNX Runtime embedder for all-MiniLM-L6-v2.
//!
//! Tokenizes with `tokenizers`, runs the model through `ort`, mean-pools the
//! token embeddings under the attention mask and L2-normalizes the result.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// all-MiniLM-L6-v2 was trained on 256-token windows; article bodies are cut there.
const MAX_SEQ_LEN: usize = 256;

pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync and the Session is only touched behind the Mutex.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl OnnxEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        for (what, path) in [("ONNX model", &model_path), ("tokenizer", &tokenizer_path)] {
            anyhow::ensure!(
                path.exists(),
                "{what} not found at {}. Run `feedmesh model download` first.",
                path.display()
            );
        }

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            model = %config.model,
            path = %model_path.display(),
            "embedding model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

/// Flattened `[batch, seq]` model inputs.
struct BatchInputs {
    batch: usize,
    seq: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
}

impl BatchInputs {
    fn from_encodings(encodings: &[Encoding]) -> Self {
        let batch = encodings.len();
        let seq = encodings.first().map_or(0, |e| e.get_ids().len());
        let mut ids = Vec::with_capacity(batch * seq);
        let mut mask = Vec::with_capacity(batch * seq);
        for enc in encodings {
            ids.extend(enc.get_ids().iter().map(|&id| id as i64));
            mask.extend(enc.get_attention_mask().iter().map(|&m| m as i64));
        }
        Self { batch, seq, ids, mask }
    }
}

impl EmbeddingProvider for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .context("embedder returned no vector")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        let inputs = BatchInputs::from_encodings(&encodings);

        let shape = vec![inputs.batch as i64, inputs.seq as i64];
        let ids = Tensor::from_array((shape.clone(), inputs.ids.clone().into_boxed_slice()))?;
        let mask = Tensor::from_array((shape.clone(), inputs.mask.clone().into_boxed_slice()))?;
        let segments = Tensor::from_array((
            shape,
            vec![0i64; inputs.batch * inputs.seq].into_boxed_slice(),
        ))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "input_ids" => ids,
            "attention_mask" => mask,
            "token_type_ids" => segments,
        })?;

        // Export name differs between conversions.
        let hidden = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);
        let (dims, data) = hidden
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings")?;
        let dims: &[i64] = &dims;
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == EMBEDDING_DIM as i64,
            "unexpected token embedding shape {dims:?}"
        );

        let out_seq = dims[1] as usize;
        Ok((0..inputs.batch)
            .map(|b| {
                let tokens = &data[b * out_seq * EMBEDDING_DIM..(b + 1) * out_seq * EMBEDDING_DIM];
                let mask = &inputs.mask[b * inputs.seq..b * inputs.seq + out_seq.min(inputs.seq)];
                l2_normalize(mean_pool(tokens, mask, EMBEDDING_DIM))
            })
            .collect())
    }
}

/// Average the token rows whose mask entry is set.
fn mean_pool(tokens: &[f32], mask: &[i64], dim: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; dim];
    let mut count = 0.0f32;
    for (row, &m) in tokens.chunks_exact(dim).zip(mask) {
        if m > 0 {
            for (acc, v) in sum.iter_mut().zip(row) {
                *acc += v;
            }
            count += 1.0;
        }
    }
    if count > 0.0 {
        sum.iter_mut().for_each(|x| *x /= count);
    }
    sum
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
