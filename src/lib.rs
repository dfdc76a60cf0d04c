//! Local-first semantic layer for personal knowledge capture.
//!
//! Lumara turns text into fixed-length sentence embeddings with an on-device
//! model, caches them across two tiers, and runs similarity comparisons for
//! duplicate and contradiction-candidate detection. Everything is
//! client-local; there is no server component.
//!
//! # Architecture
//!
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384
//!   dimensions, L2-normalized)
//! - **Cache**: bounded in-memory LRU tier over a durable SQLite tier;
//!   durable failures degrade silently to memory-only operation
//! - **Similarity**: pure in-memory cosine ranking, single-link duplicate
//!   grouping, and contradiction-candidate filtering
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files and environment variables
//! - [`model`] - Text-to-vector encoder, model-file fetching with progress
//! - [`cache`] - Two-tier embedding cache with eviction, retention, and stats
//! - [`service`] - Cache-or-generate orchestration with request coalescing
//! - [`similarity`] - Ranked search, duplicate grouping, contradiction candidates
//! - [`insight`] - Chat-backed contradiction explanation over flagged candidates
//! - [`vector`] - Cosine similarity and other vector primitives

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod insight;
pub mod model;
pub mod service;
pub mod similarity;
pub mod vector;

pub use error::{Error, Result};
