//! Durable on-device cache tier backed by SQLite.
//!
//! A plain key-value table: normalized text → vector blob plus timestamps.
//! `last_accessed_at` is bumped on every hit and drives both memory-tier
//! preloading (most recently used first) and the lazy age-based sweep.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// A row fetched from the durable tier.
pub struct DurableEntry {
    pub key: String,
    pub vector: Vec<f32>,
    pub created_at: String,
}

/// SQLite-backed cache tier. The connection is serialized behind a mutex;
/// single-record read/write atomicity comes from SQLite itself.
pub struct DurableTier {
    conn: Mutex<Connection>,
}

impl DurableTier {
    /// Open (or create) the cache database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open cache database at {}", path.display()))?;
        Self::init(&conn)?;

        tracing::info!(path = %path.display(), "cache database initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        // WAL for concurrent read performance; busy_timeout so a second
        // process backs off instead of failing immediately.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", "5000")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embedding_cache (
                key              TEXT PRIMARY KEY,
                vector           BLOB NOT NULL,
                dim              INTEGER NOT NULL,
                model            TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                last_accessed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cache_last_accessed
                ON embedding_cache(last_accessed_at);",
        )
        .context("failed to initialize cache schema")?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("cache connection lock poisoned: {e}"))
    }

    /// Fetch a vector by key, bumping `last_accessed_at` on hit.
    pub fn get(&self, key: &str) -> Result<Option<DurableEntry>> {
        let conn = self.lock()?;
        let row: Option<(Vec<u8>, i64, String)> = conn
            .query_row(
                "SELECT vector, dim, created_at FROM embedding_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((blob, dim, created_at)) = row else {
            return Ok(None);
        };

        let vector = bytes_to_vector(&blob, dim as usize)?;
        conn.execute(
            "UPDATE embedding_cache SET last_accessed_at = ?1 WHERE key = ?2",
            params![now(), key],
        )?;

        Ok(Some(DurableEntry {
            key: key.to_string(),
            vector,
            created_at,
        }))
    }

    /// Insert or replace a vector. `created_at` is preserved on replace.
    pub fn put(&self, key: &str, vector: &[f32], model: &str) -> Result<()> {
        let conn = self.lock()?;
        let ts = now();
        conn.execute(
            "INSERT INTO embedding_cache (key, vector, dim, model, created_at, last_accessed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(key) DO UPDATE SET
                vector = excluded.vector,
                dim = excluded.dim,
                model = excluded.model,
                last_accessed_at = excluded.last_accessed_at",
            params![key, vector_to_bytes(vector), vector.len() as i64, model, ts],
        )?;
        Ok(())
    }

    /// Existence check without materializing the vector.
    pub fn contains(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM embedding_cache WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM embedding_cache WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM embedding_cache", [])?;
        Ok(())
    }

    /// Delete (or count, when `dry_run`) entries not accessed within
    /// `retention_days`. Returns the number of affected rows.
    pub fn sweep(&self, retention_days: u64, dry_run: bool) -> Result<usize> {
        let cutoff = (chrono::Utc::now()
            - chrono::Duration::days(retention_days as i64))
        .to_rfc3339();

        let conn = self.lock()?;
        let affected = if dry_run {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM embedding_cache WHERE last_accessed_at < ?1",
                params![cutoff],
                |row| row.get(0),
            )?;
            count as usize
        } else {
            conn.execute(
                "DELETE FROM embedding_cache WHERE last_accessed_at < ?1",
                params![cutoff],
            )?
        };
        Ok(affected)
    }

    /// The `limit` most recently used entries, for memory-tier preloading.
    pub fn recent(&self, limit: usize) -> Result<Vec<DurableEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, vector, dim, created_at FROM embedding_cache
             ORDER BY last_accessed_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, blob, dim, created_at)| {
                Ok(DurableEntry {
                    key,
                    vector: bytes_to_vector(&blob, dim as usize)?,
                    created_at,
                })
            })
            .collect()
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embedding_cache", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Oldest and newest `created_at` timestamps.
    pub fn time_range(&self) -> Result<(Option<String>, Option<String>)> {
        let conn = self.lock()?;
        let range = conn.query_row(
            "SELECT MIN(created_at), MAX(created_at) FROM embedding_cache",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(range)
    }

    /// PRAGMA integrity_check, for the doctor command.
    pub fn integrity_check(&self) -> Result<bool> {
        let conn = self.lock()?;
        let verdict: String =
            conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(verdict == "ok")
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Little-endian f32 blob encoding for the vector column.
fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_vector(bytes: &[u8], dim: usize) -> Result<Vec<f32>> {
    anyhow::ensure!(
        bytes.len() == dim * 4,
        "corrupt vector blob: {} bytes for dim {dim}",
        bytes.len()
    );
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_blob_round_trip() {
        let v = vec![1.5f32, -2.25, 0.0, 384.0];
        let bytes = vector_to_bytes(&v);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_vector(&bytes, 4).unwrap(), v);
    }

    #[test]
    fn corrupt_blob_is_rejected() {
        let bytes = vec![0u8; 7];
        assert!(bytes_to_vector(&bytes, 2).is_err());
    }

    #[test]
    fn put_get_round_trip() {
        let tier = DurableTier::open_in_memory().unwrap();
        let v = vec![0.25f32; 8];
        tier.put("hello world", &v, "all-MiniLM-L6-v2").unwrap();

        let entry = tier.get("hello world").unwrap().unwrap();
        assert_eq!(entry.vector, v);
        assert!(tier.get("missing").unwrap().is_none());
    }

    #[test]
    fn put_is_upsert() {
        let tier = DurableTier::open_in_memory().unwrap();
        tier.put("k", &[1.0], "m").unwrap();
        tier.put("k", &[2.0, 3.0], "m").unwrap();

        let entry = tier.get("k").unwrap().unwrap();
        assert_eq!(entry.vector, vec![2.0, 3.0]);
        assert_eq!(tier.count().unwrap(), 1);
    }

    #[test]
    fn contains_without_fetch() {
        let tier = DurableTier::open_in_memory().unwrap();
        tier.put("k", &[1.0], "m").unwrap();
        assert!(tier.contains("k").unwrap());
        assert!(!tier.contains("other").unwrap());
    }

    #[test]
    fn get_bumps_last_accessed() {
        let tier = DurableTier::open_in_memory().unwrap();
        tier.put("a", &[1.0], "m").unwrap();
        tier.put("b", &[2.0], "m").unwrap();

        // Touch "a" so it becomes the most recently used.
        tier.get("a").unwrap();

        let recent = tier.recent(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].key, "a");
    }

    #[test]
    fn sweep_removes_stale_entries() {
        let tier = DurableTier::open_in_memory().unwrap();
        tier.put("old", &[1.0], "m").unwrap();
        tier.put("fresh", &[2.0], "m").unwrap();

        // Backdate one entry past the retention window.
        {
            let conn = tier.conn.lock().unwrap();
            let stale = (chrono::Utc::now() - chrono::Duration::days(45)).to_rfc3339();
            conn.execute(
                "UPDATE embedding_cache SET last_accessed_at = ?1 WHERE key = 'old'",
                params![stale],
            )
            .unwrap();
        }

        assert_eq!(tier.sweep(30, true).unwrap(), 1); // dry run counts only
        assert_eq!(tier.count().unwrap(), 2);

        assert_eq!(tier.sweep(30, false).unwrap(), 1);
        assert_eq!(tier.count().unwrap(), 1);
        assert!(tier.get("old").unwrap().is_none());
        assert!(tier.get("fresh").unwrap().is_some());
    }

    #[test]
    fn clear_and_stats() {
        let tier = DurableTier::open_in_memory().unwrap();
        assert_eq!(tier.time_range().unwrap(), (None, None));

        tier.put("a", &[1.0], "m").unwrap();
        tier.put("b", &[2.0], "m").unwrap();
        let (oldest, newest) = tier.time_range().unwrap();
        assert!(oldest.is_some());
        assert!(newest.is_some());
        assert!(oldest <= newest);

        tier.clear().unwrap();
        assert_eq!(tier.count().unwrap(), 0);
    }

    #[test]
    fn integrity_check_passes() {
        let tier = DurableTier::open_in_memory().unwrap();
        assert!(tier.integrity_check().unwrap());
    }
}
