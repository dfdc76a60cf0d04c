use anyhow::Result;

use crate::cache::durable::DurableTier;
use crate::config::LumaraConfig;
use crate::model::fetch;

pub fn run(config: &LumaraConfig) -> Result<()> {
    println!("Lumara Doctor");
    println!("=============");
    let mut healthy = true;

    // Model files
    let (model_path, tokenizer_path) = fetch::model_paths(&config.model);
    println!();
    println!("Model ({}):", config.model.name);
    for (label, path) in [("model.onnx", &model_path), ("tokenizer.json", &tokenizer_path)] {
        match std::fs::metadata(path) {
            Ok(meta) => println!(
                "  [ok]      {label} ({:.1} MB)",
                meta.len() as f64 / (1024.0 * 1024.0)
            ),
            Err(_) => {
                println!("  [missing] {label} at {}", path.display());
                healthy = false;
            }
        }
    }
    if !fetch::model_files_present(&config.model) {
        println!("  Run `lumara model download` to fetch the model files.");
    }

    // Cache database
    let db_path = config.resolved_db_path();
    println!();
    println!("Cache database ({}):", db_path.display());
    if db_path.exists() {
        match DurableTier::open(&db_path) {
            Ok(tier) => {
                match tier.integrity_check() {
                    Ok(true) => println!("  [ok]      integrity check passed"),
                    Ok(false) => {
                        println!("  [error]   integrity check FAILED");
                        healthy = false;
                    }
                    Err(e) => {
                        println!("  [error]   integrity check: {e}");
                        healthy = false;
                    }
                }
                match tier.count() {
                    Ok(n) => println!("  [ok]      {n} cached embeddings"),
                    Err(e) => println!("  [warn]    count failed: {e}"),
                }
                if let Ok((Some(oldest), Some(newest))) = tier.time_range() {
                    println!("  [ok]      entries from {oldest} to {newest}");
                }
            }
            Err(e) => {
                println!("  [error]   cannot open: {e}");
                healthy = false;
            }
        }
    } else {
        println!("  [note]    no database yet (created on first embed)");
    }

    println!();
    if healthy {
        println!("All checks passed.");
    } else {
        println!("Problems found; see above.");
        std::process::exit(1);
    }
    Ok(())
}
