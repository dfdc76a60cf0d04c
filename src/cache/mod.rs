//! Two-tier embedding cache.
//!
//! Lookup order is memory → durable → miss; a durable hit is promoted into
//! the memory tier before the call returns. Storage failures in the durable
//! tier are absorbed at this boundary: they are logged and degrade the cache
//! to memory-only operation, never failing the caller's primary operation.

pub mod durable;
pub mod memory;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

pub use durable::{DurableEntry, DurableTier};
use memory::MemoryTier;

/// Abstraction over the durable tier so hosts can supply their own
/// persistence layer. [`DurableTier`] is the SQLite implementation.
pub trait VectorStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<DurableEntry>>;
    fn put(&self, key: &str, vector: &[f32], model: &str) -> anyhow::Result<()>;
    fn contains(&self, key: &str) -> anyhow::Result<bool>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
    fn sweep(&self, retention_days: u64, dry_run: bool) -> anyhow::Result<usize>;
    fn recent(&self, limit: usize) -> anyhow::Result<Vec<DurableEntry>>;
    fn count(&self) -> anyhow::Result<u64>;
    fn time_range(&self) -> anyhow::Result<(Option<String>, Option<String>)>;
}

impl VectorStore for DurableTier {
    fn get(&self, key: &str) -> anyhow::Result<Option<DurableEntry>> {
        DurableTier::get(self, key)
    }
    fn put(&self, key: &str, vector: &[f32], model: &str) -> anyhow::Result<()> {
        DurableTier::put(self, key, vector, model)
    }
    fn contains(&self, key: &str) -> anyhow::Result<bool> {
        DurableTier::contains(self, key)
    }
    fn delete(&self, key: &str) -> anyhow::Result<()> {
        DurableTier::delete(self, key)
    }
    fn clear(&self) -> anyhow::Result<()> {
        DurableTier::clear(self)
    }
    fn sweep(&self, retention_days: u64, dry_run: bool) -> anyhow::Result<usize> {
        DurableTier::sweep(self, retention_days, dry_run)
    }
    fn recent(&self, limit: usize) -> anyhow::Result<Vec<DurableEntry>> {
        DurableTier::recent(self, limit)
    }
    fn count(&self) -> anyhow::Result<u64> {
        DurableTier::count(self)
    }
    fn time_range(&self) -> anyhow::Result<(Option<String>, Option<String>)> {
        DurableTier::time_range(self)
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub durable_entries: u64,
    pub memory_bytes_estimate: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<String>,
    pub hits: u64,
    pub misses: u64,
    /// False when the durable tier is absent or has been degraded away.
    pub persistent: bool,
}

/// Two-tier cache from normalized text to embedding vector.
pub struct EmbeddingCache {
    mem: Mutex<MemoryTier>,
    store: Option<Box<dyn VectorStore>>,
    model: String,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// Open a cache with a SQLite durable tier at `db_path`.
    ///
    /// If the database cannot be opened, the failure is logged and the cache
    /// runs memory-only — a broken persistence layer must not break
    /// embedding generation.
    pub fn open(db_path: impl AsRef<Path>, capacity: usize, model: &str) -> Self {
        let store: Option<Box<dyn VectorStore>> = match DurableTier::open(db_path) {
            Ok(tier) => Some(Box::new(tier)),
            Err(e) => {
                tracing::warn!(error = %e, "durable cache unavailable, running memory-only");
                None
            }
        };
        Self::with_store(store, capacity, model)
    }

    /// Memory-only cache (no persistence across restarts).
    pub fn memory_only(capacity: usize, model: &str) -> Self {
        Self::with_store(None, capacity, model)
    }

    /// Cache over a caller-supplied durable store.
    pub fn with_store(
        store: Option<Box<dyn VectorStore>>,
        capacity: usize,
        model: &str,
    ) -> Self {
        Self {
            mem: Mutex::new(MemoryTier::new(capacity)),
            store,
            model: model.to_string(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Keys are the trimmed text, case preserved — embeddings are
    /// case-sensitive, so the cache must be too.
    fn key(text: &str) -> &str {
        text.trim()
    }

    /// Look up a vector. Never fails: a storage error degrades to a miss.
    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = Self::key(text);

        if let Some(vector) = self.mem.lock().expect("memory tier lock").get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(vector);
        }

        if let Some(store) = &self.store {
            match store.get(key) {
                Ok(Some(entry)) => {
                    // Promote before returning so an immediate re-read hits
                    // the memory tier.
                    self.mem.lock().expect("memory tier lock").insert(
                        key.to_string(),
                        entry.vector.clone(),
                        entry.created_at,
                    );
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.vector);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "durable cache read failed, treating as miss");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Write a vector to both tiers. A durable-tier failure is logged, not
    /// propagated — the in-memory write still succeeds, preserving
    /// same-session performance even if persistence is broken.
    pub async fn set(&self, text: &str, vector: &[f32]) {
        let key = Self::key(text);
        let created_at = chrono::Utc::now().to_rfc3339();

        self.mem.lock().expect("memory tier lock").insert(
            key.to_string(),
            vector.to_vec(),
            created_at,
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.put(key, vector, &self.model) {
                tracing::warn!(error = %e, "durable cache write failed, entry kept in memory only");
            }
        }
    }

    /// Existence check without paying for vector retrieval on the durable
    /// tier. Storage errors degrade to `false`.
    pub async fn has(&self, text: &str) -> bool {
        let key = Self::key(text);
        if self.mem.lock().expect("memory tier lock").contains(key) {
            return true;
        }
        match &self.store {
            Some(store) => store.contains(key).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "durable cache existence check failed");
                false
            }),
            None => false,
        }
    }

    /// Drop a single entry from both tiers.
    pub async fn remove(&self, text: &str) {
        let key = Self::key(text);
        self.mem.lock().expect("memory tier lock").remove(key);
        if let Some(store) = &self.store {
            if let Err(e) = store.delete(key) {
                tracing::warn!(error = %e, "durable cache delete failed");
            }
        }
    }

    /// Clear both tiers and reset counters.
    pub async fn clear(&self) {
        self.mem.lock().expect("memory tier lock").clear();
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                tracing::warn!(error = %e, "durable cache clear failed");
            }
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        tracing::info!("embedding cache cleared");
    }

    /// Load the `limit` most recently used durable entries into the memory
    /// tier, avoiding cold-cache latency spikes after a restart. Returns the
    /// number of entries loaded.
    pub async fn preload(&self, limit: usize) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let entries = match store.recent(limit) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "cache preload failed");
                return 0;
            }
        };

        let mut mem = self.mem.lock().expect("memory tier lock");
        let count = entries.len();
        // Iterate oldest-first so the most recently used entries end up
        // warmest in the LRU order.
        for entry in entries.into_iter().rev() {
            mem.insert(entry.key, entry.vector, entry.created_at);
        }
        tracing::debug!(count, "preloaded cache entries");
        count
    }

    /// Age-based durable sweep: remove entries unused for longer than
    /// `retention_days`. Applied lazily (startup or maintenance command),
    /// never synchronously per write.
    pub async fn sweep(&self, retention_days: u64, dry_run: bool) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        match store.sweep(retention_days, dry_run) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "cache sweep failed");
                0
            }
        }
    }

    /// Statistics snapshot across both tiers.
    pub async fn stats(&self) -> CacheStats {
        let (memory_entries, memory_bytes_estimate, mem_range) = {
            let mem = self.mem.lock().expect("memory tier lock");
            (mem.len(), mem.bytes_estimate(), mem.time_range())
        };

        let (durable_entries, durable_range, persistent) = match &self.store {
            Some(store) => {
                let count = store.count().unwrap_or(0);
                let range = store.time_range().unwrap_or((None, None));
                (count, range, true)
            }
            None => (0, (None, None), false),
        };

        // The durable tier is the superset when present; fall back to the
        // memory tier's range otherwise.
        let (oldest_entry, newest_entry) = if persistent && durable_entries > 0 {
            durable_range
        } else {
            mem_range
        };

        CacheStats {
            memory_entries,
            durable_entries,
            memory_bytes_estimate,
            oldest_entry,
            newest_entry,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            persistent,
        }
    }
}
