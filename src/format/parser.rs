//! Byte-level decoder for the `.aif-bin` format.
//!
//! All fixed-width fields are little-endian. Parsing is deterministic:
//! byte-identical input always produces the same [`ParsedFile`], including
//! synthesized chunk ids (SHA-256 over the chunk index and data bytes).

use std::path::Path;

use sha2::{Digest, Sha256};

use super::{
    ChunkType, ParseError, ParsedChunk, ParsedFile, HEADER_LEN, MAGIC, SECTION_ABSENT,
};

/// Section-offset table order within the header.
const SEC_METADATA: usize = 0;
const SEC_CONTENT_CHUNKS: usize = 2;
const SEC_FOOTER: usize = 4;
const SECTION_NAMES: [&str; 6] = [
    "metadata",
    "original-raw",
    "content-chunks",
    "versions",
    "footer",
    "total-size",
];

/// Read and decode a `.aif-bin` file from disk.
pub fn parse(path: impl AsRef<Path>) -> crate::error::Result<ParsedFile> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    Ok(parse_bytes(path, &bytes)?)
}

/// Decode a `.aif-bin` image already in memory.
pub fn parse_bytes(source_path: &Path, bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    if bytes.len() < HEADER_LEN {
        return Err(ParseError::TooSmall { size: bytes.len() });
    }
    if bytes[..8] != MAGIC {
        return Err(ParseError::BadMagic);
    }

    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    // bytes 12..16 are padding

    let mut offsets = [SECTION_ABSENT; 6];
    for (i, off) in offsets.iter_mut().enumerate() {
        let base = 16 + i * 8;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[base..base + 8]);
        *off = u64::from_le_bytes(raw);
    }

    let (metadata, metadata_error) = match section_payload(bytes, &offsets, SEC_METADATA)? {
        Some(payload) => match serde_json::from_slice::<serde_json::Value>(payload) {
            Ok(serde_json::Value::Object(map)) => (map, None),
            Ok(other) => (
                serde_json::Map::new(),
                Some(format!("metadata is not an object: {other}")),
            ),
            Err(e) => (serde_json::Map::new(), Some(e.to_string())),
        },
        None => (serde_json::Map::new(), None),
    };

    let (chunks, chunk_error) = match section_payload(bytes, &offsets, SEC_CONTENT_CHUNKS)? {
        Some(payload) => decode_chunks(payload),
        None => (Vec::new(), None),
    };

    let footer_offset = match offsets[SEC_FOOTER] {
        SECTION_ABSENT => None,
        off => Some(off),
    };

    Ok(ParsedFile {
        source_path: source_path.to_path_buf(),
        version,
        metadata,
        metadata_error,
        chunks,
        chunk_error,
        footer_offset,
    })
}

/// Locate a section's payload: the offset points at a u64 payload length
/// followed by that many payload bytes. Returns `None` for absent sections.
fn section_payload<'a>(
    bytes: &'a [u8],
    offsets: &[u64; 6],
    section: usize,
) -> Result<Option<&'a [u8]>, ParseError> {
    let offset = offsets[section];
    if offset == SECTION_ABSENT {
        return Ok(None);
    }
    let out_of_bounds = || ParseError::SectionOutOfBounds {
        section: SECTION_NAMES[section],
        offset,
        len: bytes.len(),
    };

    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let len_end = start.checked_add(8).filter(|&e| e <= bytes.len()).ok_or_else(out_of_bounds)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[start..len_end]);
    let payload_len = usize::try_from(u64::from_le_bytes(raw)).map_err(|_| out_of_bounds())?;

    let end = len_end
        .checked_add(payload_len)
        .filter(|&e| e <= bytes.len())
        .ok_or_else(out_of_bounds)?;
    Ok(Some(&bytes[len_end..end]))
}

/// Decode the content-chunks payload: u32 count, then framed records.
///
/// A malformed record stops the stream; chunks decoded before it survive
/// and the error is returned alongside them.
fn decode_chunks(payload: &[u8]) -> (Vec<ParsedChunk>, Option<ParseError>) {
    let mut cur = Cursor::new(payload);
    let count = match cur.read_u32() {
        Some(n) => n,
        None => return (Vec::new(), Some(ParseError::TruncatedChunk { index: 0 })),
    };

    let mut chunks = Vec::with_capacity(count as usize);
    for index in 0..count {
        match decode_one_chunk(&mut cur, index) {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => return (chunks, Some(e)),
        }
    }
    (chunks, None)
}

fn decode_one_chunk(cur: &mut Cursor<'_>, index: u32) -> Result<ParsedChunk, ParseError> {
    let truncated = || ParseError::TruncatedChunk { index };

    let type_tag = cur.read_u32().ok_or_else(truncated)?;
    let data_len = cur.read_u64_len().ok_or_else(truncated)?;
    let meta_len = cur.read_u64_len().ok_or_else(truncated)?;
    let meta_bytes = cur.take(meta_len).ok_or_else(truncated)?;
    let data_bytes = cur.take(data_len).ok_or_else(truncated)?;

    let chunk_type = ChunkType::from_tag(type_tag);

    let mut metadata = if meta_bytes.is_empty() {
        serde_json::Map::new()
    } else {
        match serde_json::from_slice::<serde_json::Value>(meta_bytes) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => {
                return Err(ParseError::MalformedChunk {
                    index,
                    what: "metadata",
                })
            }
        }
    };

    let text = match chunk_type {
        ChunkType::Text | ChunkType::Code => std::str::from_utf8(data_bytes)
            .map_err(|_| ParseError::MalformedChunk { index, what: "text" })?
            .to_string(),
        ChunkType::TableJson => serde_json::from_slice::<serde_json::Value>(data_bytes)
            .map_err(|_| ParseError::MalformedChunk { index, what: "json table" })?
            .to_string(),
        // No usable text; the chunk may still carry an embedding.
        _ => String::new(),
    };

    let embedding = match metadata.remove("embedding") {
        Some(serde_json::Value::Array(values)) => {
            let mut vec = Vec::with_capacity(values.len());
            for v in &values {
                let n = v.as_f64().ok_or(ParseError::MalformedChunk {
                    index,
                    what: "embedding",
                })?;
                vec.push(n as f32);
            }
            vec
        }
        Some(_) => {
            return Err(ParseError::MalformedChunk {
                index,
                what: "embedding",
            })
        }
        None => Vec::new(),
    };

    let id = match metadata.remove("id") {
        Some(serde_json::Value::String(s)) => s,
        _ => synthesize_id(index, data_bytes),
    };

    Ok(ParsedChunk {
        id,
        chunk_type,
        text,
        embedding,
        metadata,
    })
}

/// Derive a chunk id from `(chunk_index, data bytes)`.
///
/// The first 16 digest bytes become a UUID, so ids are stable across runs
/// for byte-identical input.
fn synthesize_id(index: u32, data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(data);
    let digest = hasher.finalize();
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&digest[..16]);
    uuid::Uuid::from_bytes(raw).to_string()
}

/// Bounds-checked little-endian reader over a byte slice.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u32(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a u64 length field, rejecting values that cannot index memory.
    fn read_u64_len(&mut self) -> Option<usize> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        let len = usize::try_from(u64::from_le_bytes(raw)).ok()?;
        // A length beyond the remaining payload can never be satisfied.
        if len > self.buf.len() - self.pos {
            return None;
        }
        Some(len)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        if end > self.buf.len() {
            return None;
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Some(slice)
    }
}
