//! Embedding service — cache-or-generate orchestration.
//!
//! Sits between callers and the encoder: looks up the two-tier cache first,
//! lazily initializes the model exactly once (concurrent initializers share
//! the same in-flight load), coalesces concurrent requests for identical
//! text, and broadcasts [`ModelProgress`] to subscribers during cold-start
//! loading. Inference runs on a blocking thread via `spawn_blocking`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::cache::EmbeddingCache;
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::model::{self, fetch, ModelProgress, TextEncoder, EMBEDDING_DIM};

/// Progress subscriber callback.
pub type ProgressFn = Arc<dyn Fn(ModelProgress) + Send + Sync>;

/// Alternate encoder constructor, used by tests and embedders other than the
/// built-in local ONNX one. Invoked at most once per successful load.
pub type EncoderFactory = Arc<dyn Fn() -> Result<Box<dyn TextEncoder>> + Send + Sync>;

/// Per-call options.
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Look up and write through the cache (default true).
    pub use_cache: bool,
    /// Caller-supplied deadline for the whole operation, including any
    /// cold-start model load.
    pub timeout: Option<Duration>,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            timeout: None,
        }
    }
}

/// Observability snapshot, side-effect free.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub model_name: String,
    pub dimension: usize,
    pub ready: bool,
    pub loading: bool,
}

/// Orchestrates cache lookups and model generation for single and batch
/// embedding requests.
pub struct EmbeddingService {
    cache: EmbeddingCache,
    model_config: ModelConfig,
    encoder: OnceCell<Arc<dyn TextEncoder>>,
    factory: Option<EncoderFactory>,
    inflight: Mutex<HashMap<String, Arc<OnceCell<Vec<f32>>>>>,
    subscribers: Mutex<Vec<ProgressFn>>,
    loading: AtomicBool,
}

impl EmbeddingService {
    /// Service over the given cache, loading the configured local encoder on
    /// first use.
    pub fn new(model_config: ModelConfig, cache: EmbeddingCache) -> Self {
        Self {
            cache,
            model_config,
            encoder: OnceCell::new(),
            factory: None,
            inflight: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            loading: AtomicBool::new(false),
        }
    }

    /// Service with a caller-supplied encoder constructor instead of the
    /// local ONNX load path. The factory is not called until first use.
    pub fn with_encoder_factory(
        model_config: ModelConfig,
        cache: EmbeddingCache,
        factory: EncoderFactory,
    ) -> Self {
        let mut service = Self::new(model_config, cache);
        service.factory = Some(factory);
        service
    }

    /// Register a progress subscriber for cold-start model loading.
    pub fn subscribe_progress(&self, f: impl Fn(ModelProgress) + Send + Sync + 'static) {
        self.subscribers
            .lock()
            .expect("subscriber lock")
            .push(Arc::new(f));
    }

    fn notify(&self, progress: ModelProgress) {
        let subscribers = self.subscribers.lock().expect("subscriber lock").clone();
        for subscriber in subscribers {
            subscriber(progress.clone());
        }
    }

    /// True once the model has finished loading.
    pub fn is_ready(&self) -> bool {
        self.encoder.initialized()
    }

    /// Model name, dimension, and lifecycle flags. No side effects.
    pub fn info(&self) -> ServiceInfo {
        let dimension = self
            .encoder
            .get()
            .map(|e| e.dimensions())
            .unwrap_or(EMBEDDING_DIM);
        ServiceInfo {
            model_name: self.model_config.name.clone(),
            dimension,
            ready: self.is_ready(),
            loading: self.loading.load(Ordering::SeqCst),
        }
    }

    /// The underlying cache, for stats, preload, sweep, and clear.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Eagerly initialize the model. Idempotent: a no-op when already
    /// initialized; concurrent callers await the same underlying load.
    /// A failed load is surfaced as [`Error::ModelLoad`] and not retried
    /// here — retry policy belongs to the caller.
    pub async fn init(&self) -> Result<()> {
        self.ensure_encoder().await.map(|_| ())
    }

    /// Generate an embedding for `text`, consulting the cache first.
    ///
    /// Concurrent calls for the same normalized text while a generation is
    /// in flight share one underlying computation. A timeout rejects with
    /// [`Error::Timeout`] and leaves the cache unmodified.
    pub async fn generate(&self, text: &str, options: &EmbedOptions) -> Result<Vec<f32>> {
        let key = text.trim();
        if key.is_empty() {
            return Err(Error::InvalidInput(
                "cannot embed empty or whitespace-only text".into(),
            ));
        }

        match options.timeout {
            Some(deadline) => tokio::time::timeout(deadline, self.generate_inner(key, options))
                .await
                .map_err(|_| Error::Timeout(deadline))?,
            None => self.generate_inner(key, options).await,
        }
    }

    /// Generate embeddings for many texts. Cache hits are served directly;
    /// all misses go to the encoder as a single batch call. Result order
    /// matches input order regardless of internal completion order.
    pub async fn generate_batch(
        &self,
        texts: &[impl AsRef<str>],
        options: &EmbedOptions,
    ) -> Result<Vec<Vec<f32>>> {
        let mut keys = Vec::with_capacity(texts.len());
        for text in texts {
            let key = text.as_ref().trim();
            if key.is_empty() {
                return Err(Error::InvalidInput(
                    "cannot embed empty or whitespace-only text".into(),
                ));
            }
            keys.push(key);
        }

        match options.timeout {
            Some(deadline) => {
                tokio::time::timeout(deadline, self.generate_batch_inner(&keys, options))
                    .await
                    .map_err(|_| Error::Timeout(deadline))?
            }
            None => self.generate_batch_inner(&keys, options).await,
        }
    }

    async fn generate_inner(&self, key: &str, options: &EmbedOptions) -> Result<Vec<f32>> {
        if options.use_cache {
            if let Some(vector) = self.cache.get(key).await {
                return Ok(vector);
            }
        }

        // Request coalescing: late arrivals attach to the same cell instead
        // of issuing a duplicate computation. A failed or cancelled
        // initializer leaves the cell unset, so the next waiter runs its own
        // attempt — errors are per-caller, never cached.
        let cell = {
            let mut inflight = self.inflight.lock().expect("inflight lock");
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        // Removes this call's map entry on every exit path, including
        // cancellation mid-await. Identity-checked so a slow exit cannot
        // evict a cell a later caller has already replaced it with.
        let _guard = InflightGuard {
            inflight: &self.inflight,
            key,
            cell: cell.clone(),
        };

        cell.get_or_try_init(|| async {
            let encoder = self.ensure_encoder().await?;
            let text = key.to_string();
            let vector = tokio::task::spawn_blocking(move || encoder.encode(&text))
                .await
                .map_err(|e| Error::Inference(e.to_string()))??;
            if options.use_cache {
                self.cache.set(key, &vector).await;
            }
            Ok::<_, Error>(vector)
        })
        .await
        .cloned()
    }

    async fn generate_batch_inner(
        &self,
        keys: &[&str],
        options: &EmbedOptions,
    ) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; keys.len()];
        let mut missing: Vec<usize> = Vec::new();

        if options.use_cache {
            for (i, key) in keys.iter().enumerate() {
                match self.cache.get(key).await {
                    Some(vector) => results[i] = Some(vector),
                    None => missing.push(i),
                }
            }
        } else {
            missing.extend(0..keys.len());
        }

        if !missing.is_empty() {
            let encoder = self.ensure_encoder().await?;
            let texts: Vec<String> = missing.iter().map(|&i| keys[i].to_string()).collect();
            let vectors = tokio::task::spawn_blocking(move || {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                encoder.encode_batch(&refs)
            })
            .await
            .map_err(|e| Error::Inference(e.to_string()))??;

            if vectors.len() != missing.len() {
                return Err(Error::Inference(format!(
                    "encoder returned {} vectors for {} inputs",
                    vectors.len(),
                    missing.len()
                )));
            }

            for (&i, vector) in missing.iter().zip(vectors) {
                if options.use_cache {
                    self.cache.set(keys[i], &vector).await;
                }
                results[i] = Some(vector);
            }
        }

        Ok(results
            .into_iter()
            .map(|slot| slot.expect("every index filled by hit or batch"))
            .collect())
    }

    async fn ensure_encoder(&self) -> Result<Arc<dyn TextEncoder>> {
        if let Some(encoder) = self.encoder.get() {
            return Ok(encoder.clone());
        }

        self.encoder
            .get_or_try_init(|| async {
                self.loading.store(true, Ordering::SeqCst);
                let result = self.load_encoder().await;
                self.loading.store(false, Ordering::SeqCst);
                result
            })
            .await
            .cloned()
    }

    async fn load_encoder(&self) -> Result<Arc<dyn TextEncoder>> {
        self.notify(ModelProgress::new(0, "preparing model"));

        if let Some(factory) = &self.factory {
            let factory = factory.clone();
            let encoder = tokio::task::spawn_blocking(move || factory())
                .await
                .map_err(|e| Error::ModelLoad(e.to_string()))??;
            self.notify(ModelProgress::new(100, "model ready"));
            return Ok(Arc::from(encoder));
        }

        if !fetch::model_files_present(&self.model_config) {
            if !self.model_config.auto_fetch {
                return Err(Error::ModelLoad(
                    "model files missing; run `lumara model download` or enable model.auto_fetch"
                        .into(),
                ));
            }
            // Download bytes map to 0–90; session load takes 90–100.
            fetch::ensure_model_files(&self.model_config, &|label, done, total| {
                let percent = total
                    .map(|t| ((done as f64 / t.max(1) as f64) * 90.0) as u8)
                    .unwrap_or(45);
                self.notify(ModelProgress::new(percent, format!("downloading {label}")));
            })
            .await
            .map_err(|e| Error::model_load(format!("{e:#}")))?;
        }

        self.notify(ModelProgress::new(90, "loading model"));
        let config = self.model_config.clone();
        let encoder = tokio::task::spawn_blocking(move || model::create_encoder(&config))
            .await
            .map_err(|e| Error::ModelLoad(e.to_string()))?
            .map_err(|e| Error::model_load(format!("{e:#}")))?;

        self.notify(ModelProgress::new(100, "model ready"));
        tracing::info!(model = %self.model_config.name, "embedding model initialized");
        Ok(Arc::from(encoder))
    }
}

struct InflightGuard<'a> {
    inflight: &'a Mutex<HashMap<String, Arc<OnceCell<Vec<f32>>>>>,
    key: &'a str,
    cell: Arc<OnceCell<Vec<f32>>>,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inflight) = self.inflight.lock() {
            if inflight
                .get(self.key)
                .is_some_and(|c| Arc::ptr_eq(c, &self.cell))
            {
                inflight.remove(self.key);
            }
        }
    }
}
