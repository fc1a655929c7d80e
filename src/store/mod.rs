//! Persistent index over collections, chunks, and the keyword inverted index.
//!
//! [`Store`] exclusively owns the SQLite connection; callers get owned copies
//! of every record. Collection operations live in [`collections`], chunk
//! operations in [`chunks`]; both are inherent methods on [`Store`].

mod chunks;
mod collections;
pub mod types;

pub use types::{Collection, FileEntry, MemoryChunk};

use rusqlite::Connection;
use std::path::Path;

use crate::db;
use crate::error::Result;

/// Handle over the single-file index database.
///
/// Reads take `&self`; multi-row mutations take `&mut self` and run inside a
/// transaction. WAL journaling lets readers proceed while one writer commits.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at the given path. A `~` prefix is
    /// expanded to the user's home and parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = match path.as_ref().to_str() {
            Some(s) => crate::config::expand_tilde(s),
            None => path.as_ref().to_path_buf(),
        };
        let conn = db::open_database(path)?;
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory store with the full schema.
    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_memory_database()?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Encode an embedding as the little-endian byte image of its f32 sequence.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

/// Decode an embedding blob. The length is implicit from the blob size;
/// trailing bytes that do not fill an f32 are ignored.
pub fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// RFC 3339 timestamp for row bookkeeping.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
