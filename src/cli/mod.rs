pub mod collections;
pub mod files;
pub mod index;
pub mod inspect;
pub mod search;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::embedding;

/// Download the ONNX model and tokenizer for the configured short name into
/// the cache directory, under a per-model subdirectory.
pub async fn model_download(config: &crate::config::EmbeddingConfig) -> Result<()> {
    let spec = embedding::model_spec(&config.model)
        .with_context(|| format!("unknown embedding model: {}", config.model))?;

    let model_dir = crate::config::expand_tilde(&config.cache_dir).join(spec.short_name);
    std::fs::create_dir_all(&model_dir)
        .with_context(|| format!("failed to create cache dir: {}", model_dir.display()))?;

    let model_url = format!(
        "https://huggingface.co/{}/resolve/main/onnx/model.onnx",
        spec.hf_repo
    );
    let tokenizer_url = format!(
        "https://huggingface.co/{}/resolve/main/tokenizer.json",
        spec.hf_repo
    );

    let model_path = model_dir.join("model.onnx");
    let tokenizer_path = model_dir.join("tokenizer.json");

    if model_path.exists() {
        println!("Model already exists at {}", model_path.display());
    } else {
        println!("Downloading model.onnx for {} ...", spec.short_name);
        download_file(&model_url, &model_path).await?;
        println!("Model saved to {}", model_path.display());
    }

    if tokenizer_path.exists() {
        println!("Tokenizer already exists at {}", tokenizer_path.display());
    } else {
        println!("Downloading tokenizer.json ...");
        download_file(&tokenizer_url, &tokenizer_path).await?;
        println!("Tokenizer saved to {}", tokenizer_path.display());
    }

    println!("Model download complete ({} dims).", spec.dimensions);
    Ok(())
}

/// Download a file from a URL with a progress bar. Atomic write (tmp + rename).
async fn download_file(url: &str, dest: &PathBuf) -> Result<()> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let total_size = response.content_length();
    let pb = if let Some(size) = total_size {
        let pb = ProgressBar::new(size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                .expect("valid template")
                .progress_chars("##-"),
        );
        pb
    } else {
        ProgressBar::new_spinner()
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    let bytes = response.bytes().await.context("error reading response")?;
    pb.inc(bytes.len() as u64);
    file.write_all(&bytes)
        .await
        .context("error writing to file")?;

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}
