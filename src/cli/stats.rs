use anyhow::Result;

use crate::config::LumaraConfig;

pub async fn run(config: &LumaraConfig, json: bool) -> Result<()> {
    let service = super::build_service(config);
    let stats = service.cache().stats().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Embedding Cache");
    println!("===============");
    println!("Model:            {}", config.model.name);
    println!("Memory entries:   {}", stats.memory_entries);
    println!(
        "Memory footprint: ~{:.1} KB",
        stats.memory_bytes_estimate as f64 / 1024.0
    );
    if stats.persistent {
        println!("Durable entries:  {}", stats.durable_entries);
        println!("Database:         {}", config.resolved_db_path().display());
    } else {
        println!("Durable entries:  (memory-only, no database)");
    }
    println!("Hits / misses:    {} / {}", stats.hits, stats.misses);
    let total = stats.hits + stats.misses;
    if total > 0 {
        println!(
            "Hit rate:         {:.1}%",
            stats.hits as f64 / total as f64 * 100.0
        );
    }
    if let (Some(oldest), Some(newest)) = (&stats.oldest_entry, &stats.newest_entry) {
        println!("Oldest entry:     {oldest}");
        println!("Newest entry:     {newest}");
    }
    Ok(())
}
