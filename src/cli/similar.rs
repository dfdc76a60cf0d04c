use std::path::Path;

use anyhow::Result;

use crate::config::LumaraConfig;
use crate::service::EmbedOptions;
use crate::similarity;

pub async fn run(
    config: &LumaraConfig,
    query: &str,
    candidates_file: &Path,
    top_k: Option<usize>,
    min_score: Option<f32>,
) -> Result<()> {
    let candidates = super::read_candidates(candidates_file)?;
    let service = super::build_service(config);

    let opts = EmbedOptions::default();
    let query_vec = service.generate(query, &opts).await?;
    let candidate_vecs = service.generate_batch(&candidates, &opts).await?;

    let top_k = top_k.unwrap_or(config.similarity.default_top_k);
    let min_score = min_score.unwrap_or(config.similarity.min_score);
    let matches = similarity::find_similar(&query_vec, &candidate_vecs, top_k, min_score)?;

    if matches.is_empty() {
        println!(
            "No candidates scored at or above {min_score:.2} for: {}",
            super::truncate_preview(query.trim(), 60)
        );
        return Ok(());
    }

    println!(
        "Top {} of {} candidates for: {}",
        matches.len(),
        candidates.len(),
        super::truncate_preview(query.trim(), 60)
    );
    println!();
    for (rank, m) in matches.iter().enumerate() {
        println!(
            "{:>3}. [{:.3}] {}",
            rank + 1,
            m.score,
            super::truncate_preview(&candidates[m.index], 72)
        );
    }
    Ok(())
}
