//! Local ONNX Runtime embedding provider.
//!
//! Implements [`EmbeddingProvider`] over `ort` for the registered sentence
//! encoders. Tokenizes a batch, runs the encoder, then masked-mean-pools
//! each sequence's token vectors down to one unit-length embedding.

use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};

use super::{EmbeddingProvider, ModelSpec};
use crate::config::EmbeddingConfig;
use crate::error::{RecallError, Result};

fn embed_err(e: impl std::fmt::Display) -> RecallError {
    RecallError::Embedder(e.to_string())
}

/// Local ONNX-based embedding provider.
///
/// The session sits behind a mutex: inference calls are serialized, which
/// keeps the provider re-entrant under concurrent readers.
pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    spec: &'static ModelSpec,
}

impl std::fmt::Debug for LocalEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbeddingProvider")
            .field("spec", &self.spec)
            .finish()
    }
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex, which
// guarantees exclusive access during run().
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig, spec: &'static ModelSpec) -> Result<Self> {
        let model_dir = crate::config::expand_tilde(&config.cache_dir).join(spec.short_name);
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(RecallError::Embedder(format!(
                "ONNX model not found at {}. Run `aifbin-recall model download` first.",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(RecallError::Embedder(format!(
                "tokenizer not found at {}. Run `aifbin-recall model download` first.",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(embed_err)?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(embed_err)?
            .with_intra_threads(4)
            .map_err(embed_err)?
            .commit_from_file(&model_path)
            .map_err(embed_err)?;

        tracing::info!(model = %model_path.display(), dims = spec.dimensions, "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RecallError::Embedder(format!("failed to load tokenizer: {e}")))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: spec.max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| RecallError::Embedder(format!("failed to set truncation: {e}")))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            spec,
        })
    }
}

/// A tokenized batch flattened for the encoder: `rows` sequences padded to a
/// common `width`, with token ids and the attention mask side by side.
struct TokenBatch {
    rows: usize,
    width: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
}

impl TokenBatch {
    fn from_encodings(encodings: &[Encoding]) -> Self {
        let rows = encodings.len();
        let width = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
        let mut ids = Vec::with_capacity(rows * width);
        let mut mask = Vec::with_capacity(rows * width);
        for encoding in encodings {
            ids.extend(encoding.get_ids().iter().map(|&t| t as i64));
            mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }
        Self {
            rows,
            width,
            ids,
            mask,
        }
    }

    /// Shape a flat i64 buffer as a `[rows, width]` tensor.
    fn tensor(&self, values: Vec<i64>) -> Result<Tensor<i64>> {
        Tensor::from_array((
            vec![self.rows as i64, self.width as i64],
            values.into_boxed_slice(),
        ))
        .map_err(embed_err)
    }

    /// The attention mask of one row.
    fn row_mask(&self, row: usize) -> &[i64] {
        &self.mask[row * self.width..(row + 1) * self.width]
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(&[text])?;
        results
            .pop()
            .ok_or_else(|| RecallError::Embedder("batch of one returned no output".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| RecallError::Embedder(format!("tokenization failed: {e}")))?;
        let batch = TokenBatch::from_encodings(&encodings);

        let mut session = self
            .session
            .lock()
            .map_err(|e| RecallError::Embedder(format!("session lock poisoned: {e}")))?;

        // token_type_ids are all zero: single-sentence input, no segment B.
        let outputs = session
            .run(ort::inputs! {
                "input_ids" => batch.tensor(batch.ids.clone())?,
                "attention_mask" => batch.tensor(batch.mask.clone())?,
                "token_type_ids" => batch.tensor(vec![0i64; batch.ids.len()])?,
            })
            .map_err(embed_err)?;

        // Exports name the per-token output differently; fall back to the
        // first output when neither common name is present.
        let token_output = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (out_shape, flat) = token_output
            .try_extract_tensor::<f32>()
            .map_err(embed_err)?;

        let dims: &[i64] = &out_shape;
        let dim = self.spec.dimensions;
        if dims.len() != 3 || dims[0] as usize != batch.rows || dims[2] as usize != dim {
            return Err(RecallError::Embedder(format!(
                "unexpected encoder output shape {dims:?}, expected [{}, seq, {dim}]",
                batch.rows
            )));
        }
        let seq = dims[1] as usize;

        let vectors = (0..batch.rows)
            .map(|row| {
                let slab = &flat[row * seq * dim..(row + 1) * seq * dim];
                pool_sequence(slab, batch.row_mask(row), dim)
            })
            .collect();
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.spec.dimensions
    }
}

/// Collapse one sequence's token vectors into a single unit-length
/// embedding: average the vectors of attended tokens (padding positions
/// have mask 0 and are skipped), then scale to unit L2 norm.
fn pool_sequence(token_slab: &[f32], mask: &[i64], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut attended = 0.0f32;

    for (token, &m) in token_slab.chunks_exact(dim).zip(mask) {
        if m == 0 {
            continue;
        }
        for (acc, &x) in pooled.iter_mut().zip(token) {
            *acc += x;
        }
        attended += 1.0;
    }

    if attended > 0.0 {
        let inv = 1.0 / attended;
        for acc in pooled.iter_mut() {
            *acc *= inv;
        }
    }
    scale_to_unit(&mut pooled);
    pooled
}

/// Scale a vector to unit L2 length in place. A zero vector stays zero.
fn scale_to_unit(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
