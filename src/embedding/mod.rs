pub mod local;

use crate::config::EmbeddingConfig;
use crate::error::{RecallError, Result};

/// A sentence-encoder model the service knows how to load.
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    /// Short name used in config and request payloads.
    pub short_name: &'static str,
    pub hf_repo: &'static str,
    /// Fixed output dimensionality.
    pub dimensions: usize,
    /// Token truncation length for inference.
    pub max_seq_len: usize,
}

/// Supported sentence-encoder models.
pub const MODELS: &[ModelSpec] = &[
    ModelSpec {
        short_name: "minilm",
        hf_repo: "sentence-transformers/all-MiniLM-L6-v2",
        dimensions: 384,
        max_seq_len: 256,
    },
    ModelSpec {
        short_name: "mpnet",
        hf_repo: "sentence-transformers/all-mpnet-base-v2",
        dimensions: 768,
        max_seq_len: 384,
    },
];

/// Look up a model by its short name.
pub fn model_spec(name: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.short_name == name)
}

/// Trait for embedding text into unit-normalized vectors.
///
/// Implementations produce L2-normalized vectors of exactly
/// [`dimensions`](Self::dimensions) length, deterministically for a fixed
/// input. All methods are synchronous — callers in async contexts should use
/// `tokio::task::spawn_blocking`. First use may block on model acquisition.
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for
    /// batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The vector length this provider produces.
    fn dimensions(&self) -> usize;
}

/// Create the embedding provider configured by `config.model`.
///
/// Returns an error if the model name is unknown or its files are not in
/// the cache directory — run `aifbin-recall model download` first.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let spec = model_spec(&config.model).ok_or_else(|| {
        RecallError::Embedder(format!(
            "unknown embedding model: {}. Supported: {}",
            config.model,
            MODELS
                .iter()
                .map(|m| m.short_name)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;
    let provider = local::LocalEmbeddingProvider::new(config, spec)?;
    Ok(Box::new(provider))
}
