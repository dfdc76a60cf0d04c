use anyhow::Result;

use crate::config::LumaraConfig;

/// Remove durable entries not accessed within the retention window.
pub async fn sweep(config: &LumaraConfig, dry_run: bool) -> Result<()> {
    let service = super::build_service(config);
    let retention = config.cache.retention_days;

    let removed = service.cache().sweep(retention, dry_run).await;
    if dry_run {
        println!("Would remove {removed} entries not accessed in the last {retention} days.");
    } else {
        println!("Removed {removed} entries not accessed in the last {retention} days.");
    }
    Ok(())
}

/// Warm the memory tier with the most recently used durable entries.
pub async fn preload(config: &LumaraConfig) -> Result<()> {
    let service = super::build_service(config);
    let limit = config.cache.preload_limit;

    let loaded = service.cache().preload(limit).await;
    println!("Preloaded {loaded} entries into memory (limit {limit}).");
    Ok(())
}
