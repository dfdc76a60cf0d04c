//! Model-file fetching with progress reporting.
//!
//! Downloads the ONNX weights and tokenizer into the model cache directory,
//! reporting byte-level progress through a callback so callers can drive a
//! terminal bar or broadcast [`super::ModelProgress`] to subscribers. Writes
//! are atomic (tmp + rename).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::config::ModelConfig;

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Byte-level progress: (file label, bytes downloaded, total bytes if known).
pub type FetchProgress<'a> = &'a (dyn Fn(&str, u64, Option<u64>) + Send + Sync);

/// Paths to the model files for a given config.
pub fn model_paths(config: &ModelConfig) -> (PathBuf, PathBuf) {
    let dir = crate::config::expand_tilde(&config.cache_dir);
    (dir.join("model.onnx"), dir.join("tokenizer.json"))
}

/// True if both the ONNX model and tokenizer are already on disk.
pub fn model_files_present(config: &ModelConfig) -> bool {
    let (model, tokenizer) = model_paths(config);
    model.exists() && tokenizer.exists()
}

/// Ensure model files exist, downloading any that are missing.
///
/// Idempotent: files already on disk are left untouched. Progress is reported
/// per file; the model weights dominate (~90MB vs a few hundred KB).
pub async fn ensure_model_files(
    config: &ModelConfig,
    on_progress: FetchProgress<'_>,
) -> Result<()> {
    let dir = crate::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create model dir: {}", dir.display()))?;

    let (model_path, tokenizer_path) = model_paths(config);

    if !model_path.exists() {
        tracing::info!(dest = %model_path.display(), "downloading model weights");
        download_file(MODEL_URL, &model_path, "model.onnx", on_progress).await?;
    }
    if !tokenizer_path.exists() {
        tracing::info!(dest = %tokenizer_path.display(), "downloading tokenizer");
        download_file(TOKENIZER_URL, &tokenizer_path, "tokenizer.json", on_progress).await?;
    }

    Ok(())
}

/// Download a single file, streaming chunks to a temp file then renaming.
async fn download_file(
    url: &str,
    dest: &Path,
    label: &str,
    on_progress: FetchProgress<'_>,
) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let total = response.content_length();
    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    let mut downloaded = 0u64;
    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk).await.context("error writing to file")?;
        downloaded += chunk.len() as u64;
        on_progress(label, downloaded, total);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    Ok(())
}
