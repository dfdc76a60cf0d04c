use std::path::Path;

use anyhow::Result;

use crate::config::LumaraConfig;
use crate::service::EmbedOptions;
use crate::similarity;

pub async fn run(config: &LumaraConfig, candidates_file: &Path, threshold: Option<f32>) -> Result<()> {
    let candidates = super::read_candidates(candidates_file)?;
    let service = super::build_service(config);

    let vectors = service
        .generate_batch(&candidates, &EmbedOptions::default())
        .await?;

    let threshold = threshold.unwrap_or(config.similarity.duplicate_threshold);
    let groups = similarity::find_similar_groups(&vectors, threshold)?;

    if groups.is_empty() {
        println!(
            "No duplicate groups among {} candidates at threshold {threshold:.2}.",
            candidates.len()
        );
        return Ok(());
    }

    println!(
        "{} duplicate group(s) among {} candidates (threshold {threshold:.2}):",
        groups.len(),
        candidates.len()
    );
    for (n, group) in groups.iter().enumerate() {
        println!();
        println!("Group {}:", n + 1);
        for &idx in group {
            println!(
                "  line {:>3}: {}",
                idx + 1,
                super::truncate_preview(&candidates[idx], 72)
            );
        }
    }
    Ok(())
}
