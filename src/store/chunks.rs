//! Chunk persistence: transactional batch insert, lookups, deletion, and
//! keyword search over the FTS5 inverted index.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension, Row, Transaction};

use super::{embedding_from_bytes, embedding_to_bytes, FileEntry, MemoryChunk, Store};
use crate::error::{RecallError, Result};

const CHUNK_COLS: &str =
    "id, collection_id, source_file, chunk_index, text, embedding, metadata, created_at, updated_at";

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryChunk> {
    let embedding_blob: Vec<u8> = row.get(5)?;
    let metadata_str: Option<String> = row.get(6)?;
    Ok(MemoryChunk {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        source_file: row.get(2)?,
        chunk_index: row.get::<_, i64>(3)? as u32,
        text: row.get(4)?,
        embedding: embedding_from_bytes(&embedding_blob),
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Embedding length already stored for a collection, if any chunk exists.
fn collection_dimension(tx: &Transaction<'_>, collection_id: &str) -> Result<Option<usize>> {
    let blob_len: Option<i64> = tx
        .query_row(
            "SELECT length(embedding) FROM chunks WHERE collection_id = ?1 LIMIT 1",
            params![collection_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(blob_len.map(|len| len as usize / 4))
}

impl Store {
    /// Insert a single chunk. Equivalent to a one-element batch.
    pub fn insert_chunk(&mut self, chunk: &MemoryChunk) -> Result<()> {
        self.insert_chunks(std::slice::from_ref(chunk))
    }

    /// Insert a batch of chunks inside one transaction.
    ///
    /// Every chunk must carry a non-empty embedding whose length matches the
    /// collection's established dimensionality (fixed by the first chunk ever
    /// inserted into it, including earlier rows of this batch). Any rejected
    /// row aborts the whole transaction, leaving the store unchanged. The
    /// FTS5 triggers keep the keyword index in sync within the same
    /// transaction.
    pub fn insert_chunks(&mut self, chunks: &[MemoryChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let tx = self.conn_mut().transaction()?;
        {
            let mut dims: HashMap<String, usize> = HashMap::new();
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, collection_id, source_file, chunk_index, text, embedding, metadata, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for chunk in chunks {
                if chunk.embedding.is_empty() {
                    return Err(RecallError::Input(format!(
                        "chunk {} has an empty embedding",
                        chunk.id
                    )));
                }

                let expected = match dims.get(&chunk.collection_id) {
                    Some(&dim) => Some(dim),
                    None => collection_dimension(&tx, &chunk.collection_id)?,
                };
                match expected {
                    Some(dim) if dim != chunk.embedding.len() => {
                        return Err(RecallError::DimMismatch {
                            expected: dim,
                            actual: chunk.embedding.len(),
                        });
                    }
                    _ => {
                        dims.insert(chunk.collection_id.clone(), chunk.embedding.len());
                    }
                }

                let metadata_str = chunk
                    .metadata
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .map_err(|e| RecallError::Input(format!("unserializable metadata: {e}")))?;

                stmt.execute(params![
                    chunk.id,
                    chunk.collection_id,
                    chunk.source_file,
                    chunk.chunk_index as i64,
                    chunk.text,
                    embedding_to_bytes(&chunk.embedding),
                    metadata_str,
                    chunk.created_at,
                    chunk.updated_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_chunk(&self, id: &str) -> Result<Option<MemoryChunk>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {CHUNK_COLS} FROM chunks WHERE id = ?1"),
                params![id],
                chunk_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_chunks_by_collection(&self, collection_id: &str) -> Result<Vec<MemoryChunk>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHUNK_COLS} FROM chunks WHERE collection_id = ?1"
        ))?;
        let rows = stmt
            .query_map(params![collection_id], chunk_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Chunks for one source file, ordered by `chunk_index`.
    pub fn get_chunks_by_source_file(&self, source_file: &str) -> Result<Vec<MemoryChunk>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHUNK_COLS} FROM chunks WHERE source_file = ?1 ORDER BY chunk_index"
        ))?;
        let rows = stmt
            .query_map(params![source_file], chunk_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All chunks, optionally restricted to one collection. This is the
    /// candidate scan the search engine runs exact cosine over.
    pub fn list_chunks(&self, collection_id: Option<&str>) -> Result<Vec<MemoryChunk>> {
        match collection_id {
            Some(id) => self.get_chunks_by_collection(id),
            None => {
                let mut stmt = self
                    .conn()
                    .prepare(&format!("SELECT {CHUNK_COLS} FROM chunks"))?;
                let rows = stmt
                    .query_map([], chunk_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
        }
    }

    /// Delete one chunk. Returns whether a row was removed.
    pub fn delete_chunk(&mut self, id: &str) -> Result<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM chunks WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Delete every chunk ingested from `source_file`. Returns the count.
    pub fn delete_chunks_by_source(&mut self, source_file: &str) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        let removed = tx.execute(
            "DELETE FROM chunks WHERE source_file = ?1",
            params![source_file],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    /// Source files with their chunk counts, grouped and name-ordered.
    pub fn list_files(&self, collection_id: Option<&str>) -> Result<Vec<FileEntry>> {
        let map_row = |row: &Row<'_>| {
            Ok(FileEntry {
                source_file: row.get(0)?,
                chunk_count: row.get::<_, i64>(1)? as u64,
            })
        };
        let rows = match collection_id {
            Some(id) => {
                let mut stmt = self.conn().prepare(
                    "SELECT source_file, COUNT(*) FROM chunks WHERE collection_id = ?1 \
                     GROUP BY source_file ORDER BY source_file",
                )?;
                let rows = stmt
                    .query_map(params![id], map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn().prepare(
                    "SELECT source_file, COUNT(*) FROM chunks \
                     GROUP BY source_file ORDER BY source_file",
                )?;
                let rows = stmt
                    .query_map([], map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    /// BM25 keyword search over the inverted index.
    ///
    /// The query is matched as one quoted phrase (internal double quotes
    /// doubled, per the FTS5 query language). Scores come back ascending —
    /// the engine emits lower-is-better values — limited to `limit` rows.
    pub fn keyword_search(
        &self,
        query: &str,
        collection_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, f64)>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let phrase = fts_phrase(query);

        let map_row = |row: &Row<'_>| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?));
        let rows = match collection_id {
            Some(id) => {
                let mut stmt = self.conn().prepare(
                    "SELECT chunks.id, chunks_fts.rank FROM chunks_fts \
                     JOIN chunks ON chunks.rowid = chunks_fts.rowid \
                     WHERE chunks_fts MATCH ?1 AND chunks.collection_id = ?2 \
                     ORDER BY chunks_fts.rank LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![phrase, id, limit as i64], map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn().prepare(
                    "SELECT chunks.id, chunks_fts.rank FROM chunks_fts \
                     JOIN chunks ON chunks.rowid = chunks_fts.rowid \
                     WHERE chunks_fts MATCH ?1 \
                     ORDER BY chunks_fts.rank LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![phrase, limit as i64], map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }
}

/// Wrap a free-text query as a single FTS5 phrase, doubling internal quotes.
fn fts_phrase(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}
