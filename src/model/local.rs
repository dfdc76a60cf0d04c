//! Local ONNX Runtime encoder.
//!
//! Implements [`TextEncoder`] with all-MiniLM-L6-v2 via `ort`: tokenization,
//! inference, attention-masked mean pooling, and L2 normalization.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{TextEncoder, EMBEDDING_DIM};
use crate::config::ModelConfig;
use crate::error::Error;
use crate::vector;

/// Maximum sequence length for all-MiniLM-L6-v2 (trained at 256).
const MAX_SEQ_LEN: usize = 256;

/// ONNX-based encoder using all-MiniLM-L6-v2.
pub struct LocalEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_name: String,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex, which
// guarantees exclusive access during run().
unsafe impl Send for LocalEncoder {}
unsafe impl Sync for LocalEncoder {}

impl LocalEncoder {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let model_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `lumara model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `lumara model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow::anyhow!("failed to set optimization level: {e}"))?
            .with_intra_threads(4)
            .map_err(|e| anyhow::anyhow!("failed to set intra threads: {e}"))?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

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

        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_name: config.name.clone(),
        })
    }

    fn run_batch(&self, texts: &[&str]) -> crate::Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::Inference(format!("tokenization failed: {e}")))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        // Flat i64 input tensors, one row per text.
        let mut input_ids = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))
                .map_err(|e| Error::Inference(e.to_string()))?;
        let attention_tensor =
            Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))
                .map_err(|e| Error::Inference(e.to_string()))?;
        // token_type_ids: all zeros (single sentence, no segment B)
        let token_types = vec![0i64; batch_size * seq_len];
        let token_types_tensor = Tensor::from_array((shape, token_types.into_boxed_slice()))
            .map_err(|e| Error::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| Error::Inference(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_tensor,
                "token_type_ids" => token_types_tensor,
            })
            .map_err(|e| Error::Inference(e.to_string()))?;

        // Token embeddings, shape [batch, seq_len, 384]. The output name
        // varies by ONNX export — try common names, fall back to index 0.
        let token_emb = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (out_shape, data) = token_emb
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("failed to extract tensor: {e}")))?;

        let dims: &[i64] = &out_shape;
        if dims.len() != 3 || dims[2] != EMBEDDING_DIM as i64 {
            return Err(Error::Inference(format!(
                "unexpected output shape {dims:?}, expected [batch, seq, {EMBEDDING_DIM}]"
            )));
        }
        let hidden_dim = dims[2] as usize;
        let actual_seq_len = dims[1] as usize;

        let mut vectors = Vec::with_capacity(batch_size);
        for b in 0..batch_size {
            let mask_row = &attention_mask[b * seq_len..(b + 1) * seq_len];
            let pooled = mean_pool(data, b, actual_seq_len, hidden_dim, mask_row);
            vectors.push(vector::normalize(&pooled));
        }

        Ok(vectors)
    }
}

impl TextEncoder for LocalEncoder {
    fn encode(&self, text: &str) -> crate::Result<Vec<f32>> {
        let mut results = self.encode_batch(&[text])?;
        Ok(results.remove(0))
    }

    fn encode_batch(&self, texts: &[&str]) -> crate::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        for text in texts {
            if text.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "cannot embed empty or whitespace-only text".into(),
                ));
            }
        }
        self.run_batch(texts)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Attention-masked mean pooling over one batch row of token embeddings.
fn mean_pool(
    data: &[f32],
    batch_index: usize,
    seq_len: usize,
    hidden_dim: usize,
    mask: &[i64],
) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (s, &m) in mask.iter().enumerate().take(seq_len) {
        if m > 0 {
            let offset = (batch_index * seq_len + s) * hidden_dim;
            for (d, acc) in sum.iter_mut().enumerate() {
                *acc += data[offset + d];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for acc in &mut sum {
            *acc /= count;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{cosine_similarity, magnitude};

    #[test]
    fn mean_pool_respects_mask() {
        // Two tokens of dim 2; second token masked out.
        let data = vec![1.0, 3.0, 100.0, 100.0];
        let pooled = mean_pool(&data, 0, 2, 2, &[1, 0]);
        assert_eq!(pooled, vec![1.0, 3.0]);
    }

    #[test]
    fn mean_pool_averages_unmasked_tokens() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let pooled = mean_pool(&data, 0, 2, 2, &[1, 1]);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn mean_pool_all_masked_is_zero() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let pooled = mean_pool(&data, 0, 2, 2, &[0, 0]);
        assert_eq!(pooled, vec![0.0, 0.0]);
    }

    fn test_config() -> ModelConfig {
        ModelConfig {
            provider: "local".into(),
            name: "all-MiniLM-L6-v2".into(),
            cache_dir: dirs::home_dir()
                .expect("home dir")
                .join(".lumara/models")
                .to_string_lossy()
                .into_owned(),
            auto_fetch: false,
        }
    }

    #[test]
    #[ignore] // Requires model files — run with: cargo test -- --ignored
    fn encode_produces_384_dims() {
        let encoder = LocalEncoder::new(&test_config()).unwrap();
        let embedding = encoder.encode("Hello world").unwrap();
        assert_eq!(embedding.len(), EMBEDDING_DIM);
    }

    #[test]
    #[ignore]
    fn encode_is_l2_normalized() {
        let encoder = LocalEncoder::new(&test_config()).unwrap();
        let embedding = encoder.encode("Test sentence for normalization").unwrap();
        let norm = magnitude(&embedding);
        assert!((norm - 1.0).abs() < 1e-4, "L2 norm should be ~1.0, got {norm}");
    }

    #[test]
    #[ignore]
    fn encode_is_deterministic() {
        let encoder = LocalEncoder::new(&test_config()).unwrap();
        let a = encoder.encode("Rust is a systems programming language").unwrap();
        let b = encoder.encode("Rust is a systems programming language").unwrap();
        assert_eq!(a, b, "same input must produce identical output");
    }

    #[test]
    #[ignore]
    fn encode_batch_preserves_order_and_dims() {
        let encoder = LocalEncoder::new(&test_config()).unwrap();
        let texts = vec!["First sentence", "Second sentence", "Third sentence"];
        let embeddings = encoder.encode_batch(&texts).unwrap();
        assert_eq!(embeddings.len(), 3);
        for emb in &embeddings {
            assert_eq!(emb.len(), EMBEDDING_DIM);
            assert!((magnitude(emb) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    #[ignore]
    fn similar_texts_score_high() {
        let encoder = LocalEncoder::new(&test_config()).unwrap();
        let a = encoder.encode("The cat sat on the mat").unwrap();
        let b = encoder.encode("A cat was sitting on a mat").unwrap();
        let c = encoder.encode("Quantum computing uses qubits").unwrap();

        let near = cosine_similarity(&a, &b).unwrap();
        let far = cosine_similarity(&a, &c).unwrap();
        assert!(near > 0.7, "similar texts should score high, got {near}");
        assert!(far < near, "unrelated texts should score lower");
    }
}
