#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lumara::cache::EmbeddingCache;
use lumara::config::ModelConfig;
use lumara::model::TextEncoder;
use lumara::service::EmbeddingService;

/// Generate a deterministic 384-dim embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal-ish vector.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; 384];
    v[seed % 384] = 1.0;
    v
}

/// Generate an embedding similar to `base` with small perturbation.
/// The result will have high cosine similarity to `base`.
pub fn similar_embedding(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    for i in 0..5 {
        v[(i * 37) % 384] += 0.05;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Deterministic embedding for a text: a unit spike keyed off the bytes.
/// Identical texts map to identical vectors.
pub fn embedding_for(text: &str) -> Vec<f32> {
    let seed: usize = text.bytes().map(usize::from).sum();
    let mut v = vec![0.0f32; 384];
    v[seed % 384] = 1.0;
    v
}

/// Encoder that counts invocations and optionally sleeps to widen the
/// window for concurrent callers.
pub struct CountingEncoder {
    pub single_calls: Arc<AtomicUsize>,
    pub batch_calls: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl CountingEncoder {
    pub fn new() -> Self {
        Self {
            single_calls: Arc::new(AtomicUsize::new(0)),
            batch_calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }
}

impl TextEncoder for CountingEncoder {
    fn encode(&self, text: &str) -> lumara::Result<Vec<f32>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(embedding_for(text))
    }

    fn encode_batch(&self, texts: &[&str]) -> lumara::Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(texts.iter().map(|t| embedding_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "counting"
    }
}

pub fn test_model_config() -> ModelConfig {
    ModelConfig {
        provider: "local".into(),
        name: "counting".into(),
        cache_dir: "/nonexistent".into(),
        auto_fetch: false,
    }
}

/// Counters for a service built by [`counting_service`].
pub struct EncoderCalls {
    pub single: Arc<AtomicUsize>,
    pub batch: Arc<AtomicUsize>,
}

/// Service over the given cache, backed by a [`CountingEncoder`] factory.
pub fn counting_service(cache: EmbeddingCache, delay: Duration) -> (EmbeddingService, EncoderCalls) {
    let single = Arc::new(AtomicUsize::new(0));
    let batch = Arc::new(AtomicUsize::new(0));
    let calls = EncoderCalls {
        single: single.clone(),
        batch: batch.clone(),
    };
    let service = EmbeddingService::with_encoder_factory(
        test_model_config(),
        cache,
        Arc::new(move || {
            Ok(Box::new(CountingEncoder {
                single_calls: single.clone(),
                batch_calls: batch.clone(),
                delay,
            }) as Box<dyn TextEncoder>)
        }),
    );
    (service, calls)
}

/// On-disk cache in a temp directory; the directory must outlive the cache.
pub fn disk_cache(dir: &tempfile::TempDir, capacity: usize) -> EmbeddingCache {
    EmbeddingCache::open(dir.path().join("cache.db"), capacity, "counting")
}
