//! Text-to-vector embedding model adapter.
//!
//! Provides the [`TextEncoder`] trait and a local implementation using
//! all-MiniLM-L6-v2 (384 dimensions, L2-normalized) via ONNX Runtime, plus
//! model-file fetching with progress reporting. Encoders are created via
//! [`create_encoder`] from configuration.

pub mod fetch;
pub mod local;

use anyhow::Result;

/// Number of dimensions in the embedding vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Progress of a cold-start model load, broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct ModelProgress {
    /// 0–100.
    pub percent: u8,
    pub message: String,
}

impl ModelProgress {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Trait for embedding text into fixed-length vectors.
///
/// Implementations produce L2-normalized vectors of exactly
/// [`EMBEDDING_DIM`] dimensions and are deterministic for identical input.
/// All methods are synchronous — callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait TextEncoder: Send + Sync {
    /// Encode a single text string into a vector.
    fn encode(&self, text: &str) -> crate::Result<Vec<f32>>;

    /// Encode a batch of text strings. Output order matches input order.
    /// Implementations may override for batched inference.
    fn encode_batch(&self, texts: &[&str]) -> crate::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }

    /// Number of dimensions this encoder produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Model identifier, e.g. `"all-MiniLM-L6-v2"`.
    fn model_name(&self) -> &str;
}

/// Create an encoder from config.
///
/// Currently only `"local"` is supported (ONNX Runtime + all-MiniLM-L6-v2).
/// Returns an error if model files are not found — run `lumara model download`
/// first, or enable `model.auto_fetch`.
pub fn create_encoder(config: &crate::config::ModelConfig) -> Result<Box<dyn TextEncoder>> {
    match config.provider.as_str() {
        "local" => {
            let encoder = local::LocalEncoder::new(config)?;
            Ok(Box::new(encoder))
        }
        other => anyhow::bail!("unknown model provider: {other}. Supported: local"),
    }
}
