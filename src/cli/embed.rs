use anyhow::Result;

use crate::config::LumaraConfig;
use crate::service::EmbedOptions;

pub async fn run(config: &LumaraConfig, text: &str, no_cache: bool) -> Result<()> {
    let service = super::build_service(config);

    let cached_before = service.cache().has(text).await;
    let start = std::time::Instant::now();
    let opts = EmbedOptions {
        use_cache: !no_cache,
        ..Default::default()
    };
    let vector = service.generate(text, &opts).await?;
    let elapsed = start.elapsed();

    let preview: Vec<String> = vector.iter().take(8).map(|v| format!("{v:.4}")).collect();
    println!("Text:      {}", super::truncate_preview(text.trim(), 60));
    println!("Model:     {}", config.model.name);
    println!("Dimension: {}", vector.len());
    println!("Vector:    [{}, ...]", preview.join(", "));
    println!(
        "Source:    {} ({:.1}ms)",
        if cached_before && !no_cache { "cache" } else { "model" },
        elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}
