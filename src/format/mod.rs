//! On-disk `.aif-bin` memory file format.
//!
//! Layout: [magic:8][version:4][pad:4][section offsets: 6 x u64] = 64-byte
//! header, then length-prefixed sections. Offsets cover, in order: metadata,
//! original-raw, content-chunks, versions, footer, total-size; the sentinel
//! `u64::MAX` marks an absent section. Metadata payloads are JSON; the
//! content-chunks payload is a u32 count followed by framed chunk records.
//!
//! The footer offset is carried through as informational metadata only — no
//! checksum validation is performed on it.

mod parser;

pub use parser::{parse, parse_bytes};

use std::path::PathBuf;

/// Magic prefix: `AIFBIN\x00\x01`.
pub const MAGIC: [u8; 8] = [0x41, 0x49, 0x46, 0x42, 0x49, 0x4E, 0x00, 0x01];

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 64;

/// Section-offset sentinel meaning "absent".
pub const SECTION_ABSENT: u64 = u64::MAX;

/// Content chunk types carried in the chunk record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    Text,
    TableJson,
    Image,
    Audio,
    Video,
    Code,
    /// Unknown type tag. Still indexable when an embedding is present.
    Other(u32),
}

impl ChunkType {
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            1 => Self::Text,
            2 => Self::TableJson,
            3 => Self::Image,
            4 => Self::Audio,
            5 => Self::Video,
            6 => Self::Code,
            other => Self::Other(other),
        }
    }

    pub fn tag(&self) -> u32 {
        match self {
            Self::Text => 1,
            Self::TableJson => 2,
            Self::Image => 3,
            Self::Audio => 4,
            Self::Video => 5,
            Self::Code => 6,
            Self::Other(tag) => *tag,
        }
    }
}

/// One decoded content chunk.
///
/// `id` and `embedding` are hoisted out of the chunk's metadata map (keys
/// `id` and `embedding`); the remaining metadata keys are carried verbatim.
/// When the metadata lacks an `id`, one is synthesized deterministically
/// from `(chunk_index, data bytes)` so re-parsing identical bytes always
/// yields identical ids.
#[derive(Debug, Clone)]
pub struct ParsedChunk {
    pub id: String,
    pub chunk_type: ChunkType,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Result of decoding a `.aif-bin` file.
///
/// Header-level failures (too small, bad magic, unreadable section table)
/// fail the whole parse. A malformed individual chunk stops the chunk
/// stream but keeps everything decoded before it; the error is carried in
/// [`ParsedFile::chunk_error`].
#[derive(Debug)]
pub struct ParsedFile {
    pub source_path: PathBuf,
    pub version: u32,
    /// File-level metadata. A decode failure here is tolerated (empty map)
    /// and noted in `metadata_error`, because chunks are independent of it.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub metadata_error: Option<String>,
    pub chunks: Vec<ParsedChunk>,
    pub chunk_error: Option<ParseError>,
    /// Present footer offset, if any. Never validated.
    pub footer_offset: Option<u64>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("file too small: {size} bytes, fixed header is {HEADER_LEN}")]
    TooSmall { size: usize },

    #[error("bad magic prefix (not an .aif-bin file)")]
    BadMagic,

    #[error("{section} section at offset {offset} is out of bounds (file is {len} bytes)")]
    SectionOutOfBounds {
        section: &'static str,
        offset: u64,
        len: usize,
    },

    #[error("chunk {index} record is truncated")]
    TruncatedChunk { index: u32 },

    #[error("chunk {index} has malformed {what}")]
    MalformedChunk { index: u32, what: &'static str },
}
