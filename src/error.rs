//! Error types for the embedding and similarity layer.
//!
//! Cache-tier storage failures never appear here: the cache absorbs them
//! internally (logged, treated as a miss) because caching is an optimization,
//! not a correctness requirement.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the embedding service and similarity engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Empty or whitespace-only text passed to embedding generation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Embedding requested before the model finished loading. The built-in
    /// service initializes lazily ahead of its first encode and so never
    /// constructs this; it is part of the public taxonomy for host-supplied
    /// [`TextEncoder`](crate::model::TextEncoder) implementations whose
    /// runtime has an explicit load lifecycle.
    #[error("embedding model not initialized")]
    NotInitialized,

    /// The model could not be fetched or instantiated. Not retried
    /// internally — the caller decides whether to retry.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Comparing vectors of different lengths. Always a programming or
    /// data error, never recovered silently.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An operation exceeded its caller-supplied deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Model inference failed after successful initialization.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl Error {
    /// Wrap an arbitrary load-path failure, preserving the cause chain text.
    pub fn model_load(err: impl std::fmt::Display) -> Self {
        Error::ModelLoad(err.to_string())
    }
}
