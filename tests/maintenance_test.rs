mod helpers;

use chrono::{Duration, Utc};
use rusqlite::Connection;

use helpers::{disk_cache, test_embedding};

/// Backdate an entry's last access so it falls outside the retention window.
fn backdate(dir: &tempfile::TempDir, key: &str, days: i64) {
    let conn = Connection::open(dir.path().join("cache.db")).unwrap();
    let stale = (Utc::now() - Duration::days(days)).to_rfc3339();
    let updated = conn
        .execute(
            "UPDATE embedding_cache SET last_accessed_at = ?1 WHERE key = ?2",
            rusqlite::params![stale, key],
        )
        .unwrap();
    assert_eq!(updated, 1, "backdate must match exactly one row");
}

#[tokio::test]
async fn sweep_removes_entries_past_retention() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = disk_cache(&dir, 16);
        cache.set("stale", &test_embedding(1)).await;
        cache.set("fresh", &test_embedding(2)).await;
    }
    backdate(&dir, "stale", 45);

    let cache = disk_cache(&dir, 16);
    let removed = cache.sweep(30, false).await;
    assert_eq!(removed, 1);
    assert_eq!(cache.get("stale").await, None);
    assert!(cache.get("fresh").await.is_some());
}

#[tokio::test]
async fn sweep_dry_run_counts_without_deleting() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = disk_cache(&dir, 16);
        cache.set("stale", &test_embedding(1)).await;
    }
    backdate(&dir, "stale", 45);

    let cache = disk_cache(&dir, 16);
    let would_remove = cache.sweep(30, true).await;
    assert_eq!(would_remove, 1);
    assert!(cache.get("stale").await.is_some());
}

#[tokio::test]
async fn sweep_keeps_recently_accessed_entries() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = disk_cache(&dir, 16);
        cache.set("stale", &test_embedding(1)).await;
    }
    backdate(&dir, "stale", 45);

    // A read bumps last_accessed_at, pulling the entry back inside the
    // retention window.
    let cache = disk_cache(&dir, 16);
    assert!(cache.get("stale").await.is_some());

    let cache = disk_cache(&dir, 16);
    assert_eq!(cache.sweep(30, false).await, 0);
}

#[tokio::test]
async fn preload_warms_most_recently_used() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = disk_cache(&dir, 16);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.set(key, &test_embedding(i)).await;
        }
    }

    let cache = disk_cache(&dir, 16);
    let loaded = cache.preload(3).await;
    assert_eq!(loaded, 3);

    let stats = cache.stats().await;
    assert_eq!(stats.memory_entries, 3);

    // Preloaded entries are served from memory; only one durable row exists
    // outside the warm set.
    cache.get("d").await;
    assert_eq!(cache.stats().await.hits, 1);
}

#[tokio::test]
async fn preload_respects_limit_larger_than_population() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = disk_cache(&dir, 16);
        cache.set("only", &test_embedding(1)).await;
    }

    let cache = disk_cache(&dir, 16);
    assert_eq!(cache.preload(100).await, 1);
}
