//! File-level decoding behavior, driven through real files on disk.

mod helpers;

use aifbin_recall::error::RecallError;
use aifbin_recall::format::{self, ChunkType, ParseError};
use helpers::{spike, write_fixture, FixtureChunk};

#[test]
fn parses_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "a.aif-bin",
        &serde_json::json!({"created_at": "2026-01-10T12:00:00Z"}),
        &[FixtureChunk::text("c1", "hello world", spike(384, 0))],
    );

    let parsed = format::parse(&path).unwrap();
    assert_eq!(parsed.version, 1);
    assert_eq!(parsed.metadata["created_at"], "2026-01-10T12:00:00Z");
    assert_eq!(parsed.chunks.len(), 1);
    assert_eq!(parsed.chunks[0].id, "c1");
    assert_eq!(parsed.chunks[0].text, "hello world");
    assert_eq!(parsed.chunks[0].embedding.len(), 384);
    assert_eq!(parsed.chunks[0].chunk_type, ChunkType::Text);
}

#[test]
fn file_smaller_than_header_is_too_small() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.aif-bin");
    std::fs::write(&path, [0u8; 32]).unwrap();

    let err = format::parse(&path).unwrap_err();
    assert!(matches!(
        err,
        RecallError::Parse(ParseError::TooSmall { size: 32 })
    ));
}

#[test]
fn zeroed_magic_is_bad_magic() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = helpers::encode_memory_file(&serde_json::json!({}), &[]);
    bytes[..8].copy_from_slice(&[0u8; 8]);
    let path = dir.path().join("bad.aif-bin");
    std::fs::write(&path, bytes).unwrap();

    let err = format::parse(&path).unwrap_err();
    assert!(matches!(err, RecallError::Parse(ParseError::BadMagic)));
}

#[test]
fn zero_chunk_count_parses_to_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "empty.aif-bin", &serde_json::json!({}), &[]);

    let parsed = format::parse(&path).unwrap();
    assert!(parsed.chunks.is_empty());
    assert!(parsed.chunk_error.is_none());
}

#[test]
fn parsing_is_deterministic_for_identical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    // no id in metadata: the parser must synthesize the same one every run
    let chunk = FixtureChunk {
        type_tag: 1,
        id: None,
        embedding: spike(16, 3),
        data: b"same bytes".to_vec(),
    };
    let path = write_fixture(dir.path(), "noid.aif-bin", &serde_json::json!({}), &[chunk]);

    let first = format::parse(&path).unwrap();
    let second = format::parse(&path).unwrap();
    assert_eq!(first.chunks[0].id, second.chunks[0].id);
}
