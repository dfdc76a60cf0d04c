use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LumaraConfig {
    pub runtime: RuntimeConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub cache: CacheConfig,
    pub similarity: SimilarityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: String,
    pub name: String,
    pub cache_dir: String,
    /// Download missing model files automatically on first use.
    pub auto_fetch: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Memory-tier capacity in entries (LRU eviction past this).
    pub memory_capacity: usize,
    /// Durable entries unused for longer than this are swept.
    pub retention_days: u64,
    /// How many recently used durable entries to warm into memory at startup.
    pub preload_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimilarityConfig {
    pub duplicate_threshold: f32,
    pub contradiction_threshold: f32,
    pub default_top_k: usize,
    pub min_score: f32,
}

impl Default for LumaraConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            storage: StorageConfig::default(),
            model: ModelConfig::default(),
            cache: CacheConfig::default(),
            similarity: SimilarityConfig::default(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_lumara_dir()
            .join("cache.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let cache_dir = default_lumara_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            name: "all-MiniLM-L6-v2".into(),
            cache_dir,
            auto_fetch: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 1000,
            retention_days: 30,
            preload_limit: 256,
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: crate::similarity::DUPLICATE_THRESHOLD,
            contradiction_threshold: crate::similarity::CONTRADICTION_THRESHOLD,
            default_top_k: 5,
            min_score: 0.3,
        }
    }
}

/// Returns `~/.lumara/`
pub fn default_lumara_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".lumara")
}

/// Returns the default config file path: `~/.lumara/config.toml`
pub fn default_config_path() -> PathBuf {
    default_lumara_dir().join("config.toml")
}

impl LumaraConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LumaraConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (LUMARA_DB, LUMARA_MODEL_DIR,
    /// LUMARA_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LUMARA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("LUMARA_MODEL_DIR") {
            self.model.cache_dir = val;
        }
        if let Ok(val) = std::env::var("LUMARA_LOG_LEVEL") {
            self.runtime.log_level = val;
        }
    }

    /// Resolve the cache database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
