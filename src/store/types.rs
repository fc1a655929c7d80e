//! Record types for the persistent index.

use serde::{Deserialize, Serialize};

/// A named bucket of chunks. Counts are derived and refreshed by
/// [`Store::update_collection_stats`](crate::store::Store::update_collection_stats).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub file_count: u64,
    pub chunk_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// A retrievable unit of content: text, embedding, and opaque metadata.
///
/// Chunks are never mutated in place; re-ingesting a source file deletes and
/// re-inserts them. The embedding is excluded from serialization — transports
/// that need it read it through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryChunk {
    pub id: String,
    pub collection_id: String,
    /// Absolute path of the originating `.aif-bin` file at ingestion time.
    pub source_file: String,
    pub chunk_index: u32,
    pub text: String,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// One entry from [`Store::list_files`](crate::store::Store::list_files).
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub source_file: String,
    pub chunk_count: u64,
}
