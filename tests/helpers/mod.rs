#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aifbin_recall::config::RecallConfig;
use aifbin_recall::embedding::EmbeddingProvider;
use aifbin_recall::error::Result;
use aifbin_recall::service::RecallService;
use aifbin_recall::store::Store;

/// Magic prefix of the memory file format.
const MAGIC: [u8; 8] = [0x41, 0x49, 0x46, 0x42, 0x49, 0x4E, 0x00, 0x01];
const HEADER_LEN: usize = 64;
const SECTION_ABSENT: u64 = u64::MAX;

/// One chunk record for a test fixture file.
pub struct FixtureChunk {
    pub type_tag: u32,
    pub id: Option<String>,
    pub embedding: Vec<f32>,
    pub data: Vec<u8>,
}

impl FixtureChunk {
    pub fn text(id: &str, text: &str, embedding: Vec<f32>) -> Self {
        Self {
            type_tag: 1,
            id: Some(id.to_string()),
            embedding,
            data: text.as_bytes().to_vec(),
        }
    }
}

/// Encode a complete `.aif-bin` image with a metadata section and a
/// content-chunks section.
pub fn encode_memory_file(metadata: &serde_json::Value, chunks: &[FixtureChunk]) -> Vec<u8> {
    let metadata_payload = serde_json::to_vec(metadata).unwrap();

    let mut chunk_payload = (chunks.len() as u32).to_le_bytes().to_vec();
    for chunk in chunks {
        let mut meta = serde_json::Map::new();
        if let Some(id) = &chunk.id {
            meta.insert("id".into(), serde_json::json!(id));
        }
        if !chunk.embedding.is_empty() {
            meta.insert("embedding".into(), serde_json::json!(chunk.embedding));
        }
        let meta_bytes = serde_json::to_vec(&serde_json::Value::Object(meta)).unwrap();

        chunk_payload.extend_from_slice(&chunk.type_tag.to_le_bytes());
        chunk_payload.extend_from_slice(&(chunk.data.len() as u64).to_le_bytes());
        chunk_payload.extend_from_slice(&(meta_bytes.len() as u64).to_le_bytes());
        chunk_payload.extend_from_slice(&meta_bytes);
        chunk_payload.extend_from_slice(&chunk.data);
    }

    let mut offsets = [SECTION_ABSENT; 6];
    let mut body = Vec::new();

    offsets[0] = (HEADER_LEN + body.len()) as u64; // metadata
    body.extend_from_slice(&(metadata_payload.len() as u64).to_le_bytes());
    body.extend_from_slice(&metadata_payload);

    offsets[2] = (HEADER_LEN + body.len()) as u64; // content-chunks
    body.extend_from_slice(&(chunk_payload.len() as u64).to_le_bytes());
    body.extend_from_slice(&chunk_payload);

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    for off in offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(&body);
    out
}

/// Write a fixture file into `dir` and return its path.
pub fn write_fixture(
    dir: &Path,
    name: &str,
    metadata: &serde_json::Value,
    chunks: &[FixtureChunk],
) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, encode_memory_file(metadata, chunks)).unwrap();
    path
}

/// Deterministic embedding: a unit spike at `index` in a `dim`-sized vector.
pub fn spike(dim: usize, index: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    v[index % dim] = 1.0;
    v
}

/// Deterministic stub embedder: folds the text's bytes into a spike index,
/// so a fixed string always embeds to the same fixed vector.
#[derive(Debug)]
pub struct StubEmbedder {
    pub dims: usize,
}

impl EmbeddingProvider for StubEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let index = text.bytes().fold(0usize, |acc, b| (acc + b as usize) % self.dims);
        Ok(spike(self.dims, index))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Service over a fresh in-memory store with a stub embedder.
pub fn test_service(dims: usize) -> RecallService {
    RecallService::with_embedder(
        Store::open_in_memory().unwrap(),
        Arc::new(StubEmbedder { dims }),
        RecallConfig::default(),
    )
}
