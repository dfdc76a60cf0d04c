use std::path::Path;

use anyhow::Result;

use crate::config::LumaraConfig;
use crate::service::EmbedOptions;
use crate::similarity;

/// List statements semantically close enough to warrant a contradiction
/// review against the given statement.
pub async fn run(config: &LumaraConfig, statement: &str, against_file: &Path) -> Result<()> {
    let existing = super::read_candidates(against_file)?;
    let service = super::build_service(config);

    let opts = EmbedOptions::default();
    let statement_vec = service.generate(statement, &opts).await?;
    let existing_vecs = service.generate_batch(&existing, &opts).await?;

    let threshold = config.similarity.contradiction_threshold;
    let candidates =
        similarity::contradiction_candidates(&statement_vec, &existing_vecs, threshold)?;

    if candidates.is_empty() {
        println!(
            "No statements scored at or above {threshold:.2}; nothing to review against: {}",
            super::truncate_preview(statement.trim(), 60)
        );
        return Ok(());
    }

    println!(
        "{} statement(s) close enough to review against: {}",
        candidates.len(),
        super::truncate_preview(statement.trim(), 60)
    );
    println!();
    for m in &candidates {
        println!(
            "  [{:.3}] line {:>3}: {}",
            m.score,
            m.index + 1,
            super::truncate_preview(&existing[m.index], 72)
        );
    }
    println!();
    println!("Similarity flags topical overlap only; read each pair to judge contradiction.");
    Ok(())
}
