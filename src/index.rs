//! Directory ingestion: walk for `.aif-bin` files, parse each one, and
//! replace its chunks in the store.
//!
//! Failure isolation: one unreadable or malformed file never corrupts the
//! batch — it is logged and skipped. Each file's chunks are committed in a
//! single transaction after the prior chunks for that source are deleted,
//! so re-ingesting a file is idempotent.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::format::{self, ParsedChunk};
use crate::store::{now_rfc3339, MemoryChunk, Store};

/// Outcome of [`index_directory`].
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct IndexReport {
    /// Files that contributed at least one chunk.
    pub files_indexed: usize,
    pub chunks_indexed: usize,
}

/// Ingest every `.aif-bin` file under `dir` into the named collection,
/// creating it on demand. `recursive` walks the whole tree; otherwise only
/// one level is scanned.
pub fn index_directory(
    store: &mut Store,
    dir: &Path,
    collection_name: &str,
    recursive: bool,
) -> Result<IndexReport> {
    let root = dir.canonicalize()?;
    let mut files = Vec::new();
    discover_files(&root, recursive, &mut files)?;
    files.sort();

    let collection = store.get_or_create_collection(collection_name)?;

    let mut files_indexed = 0usize;
    let mut chunks_indexed = 0usize;

    for path in &files {
        match index_file(store, path, &collection.id) {
            Ok(0) => {}
            Ok(n) => {
                files_indexed += 1;
                chunks_indexed += n;
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping file");
            }
        }
    }

    store.update_collection_stats(&collection.id)?;
    tracing::info!(
        collection = collection_name,
        files = files_indexed,
        chunks = chunks_indexed,
        "directory indexed"
    );

    Ok(IndexReport {
        files_indexed,
        chunks_indexed,
    })
}

/// Parse one file and replace its chunks. Returns how many chunks were
/// inserted (0 means the file carried no embedded chunks and was skipped).
fn index_file(store: &mut Store, path: &Path, collection_id: &str) -> Result<usize> {
    let parsed = format::parse(path)?;

    if let Some(err) = &parsed.chunk_error {
        tracing::warn!(file = %path.display(), error = %err, "partial chunk stream");
    }
    if let Some(note) = &parsed.metadata_error {
        tracing::debug!(file = %path.display(), note, "file metadata ignored");
    }

    let embedded: Vec<&ParsedChunk> = parsed
        .chunks
        .iter()
        .filter(|c| !c.embedding.is_empty())
        .collect();
    if embedded.is_empty() {
        tracing::debug!(file = %path.display(), "no embedded chunks, skipping");
        return Ok(0);
    }

    let source_file = path.to_string_lossy().into_owned();

    // Replace-by-source: prior chunks for this path go away first.
    store.delete_chunks_by_source(&source_file)?;

    let now = now_rfc3339();
    let records: Vec<MemoryChunk> = embedded
        .iter()
        .enumerate()
        .map(|(index, chunk)| MemoryChunk {
            id: chunk.id.clone(),
            collection_id: collection_id.to_string(),
            source_file: source_file.clone(),
            chunk_index: index as u32,
            text: chunk.text.clone(),
            embedding: chunk.embedding.clone(),
            metadata: Some(augmented_metadata(chunk, &parsed.metadata)),
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .collect();

    let count = records.len();
    store.insert_chunks(&records)?;
    Ok(count)
}

/// Carry the chunk's own metadata, adding the embedding dimensionality and
/// the originating file's timestamps when the file metadata has them.
fn augmented_metadata(
    chunk: &ParsedChunk,
    file_metadata: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    let mut map = chunk.metadata.clone();
    map.insert(
        "embedding_dim".into(),
        serde_json::json!(chunk.embedding.len()),
    );
    if let Some(created) = file_metadata.get("created_at") {
        map.insert("original_created_at".into(), created.clone());
    }
    if let Some(modified) = file_metadata.get("modified_at") {
        map.insert("original_modified_at".into(), modified.clone());
    }
    serde_json::Value::Object(map)
}

/// Collect `.aif-bin` files under `dir`, one level deep unless `recursive`.
fn discover_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;

        // Skip hidden files and directories.
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            if recursive {
                discover_files(&path, recursive, out)?;
            }
            continue;
        }

        let is_memory_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".aif-bin"))
            .unwrap_or(false);
        if is_memory_file {
            out.push(path);
        }
    }
    Ok(())
}
