pub mod check;
pub mod doctor;
pub mod duplicates;
pub mod embed;
pub mod maintenance;
pub mod reset;
pub mod similar;
pub mod stats;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cache::EmbeddingCache;
use crate::config::LumaraConfig;
use crate::service::EmbeddingService;

/// Download the ONNX embedding model and tokenizer to the model directory.
pub async fn model_download(config: &crate::config::ModelConfig) -> Result<()> {
    if crate::model::fetch::model_files_present(config) {
        let dir = crate::config::expand_tilde(&config.cache_dir);
        println!("Model files already present in {}", dir.display());
        return Ok(());
    }

    println!("Downloading {} (~90MB)...", config.name);
    let bar = byte_progress_bar();
    crate::model::fetch::ensure_model_files(config, &|label, done, total| {
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_message(label.to_string());
        bar.set_position(done);
    })
    .await?;
    bar.finish_and_clear();

    println!("Model download complete. Ready for use.");
    Ok(())
}

fn byte_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {msg:<16} {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );
    bar
}

/// Build a service over the configured cache, with a terminal progress bar
/// subscribed for cold-start model loading.
pub fn build_service(config: &LumaraConfig) -> EmbeddingService {
    let cache = EmbeddingCache::open(
        config.resolved_db_path(),
        config.cache.memory_capacity,
        &config.model.name,
    );
    let service = EmbeddingService::new(config.model.clone(), cache);

    let bar = ProgressBar::hidden();
    service.subscribe_progress(move |p| {
        if bar.is_hidden() && p.percent < 100 {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {msg:<24} {bar:40.cyan/blue} {pos}%")
                    .expect("valid template")
                    .progress_chars("##-"),
            );
            bar.set_length(100);
            bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
        bar.set_message(p.message.clone());
        bar.set_position(p.percent as u64);
        if p.percent >= 100 {
            bar.finish_and_clear();
        }
    });

    service
}

/// Read candidate texts from a file: one text per line, blank lines skipped.
pub fn read_candidates(path: &std::path::Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let lines: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    anyhow::ensure!(!lines.is_empty(), "no candidate texts in {}", path.display());
    Ok(lines)
}

/// Truncate content to max_chars, appending "..." if truncated.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        content.to_string()
    } else {
        let end = content
            .char_indices()
            .take_while(|(i, _)| *i < max_chars)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_chars);
        format!("{}...", &content[..end])
    }
}
