//! Directory ingestion: replace-by-source idempotence, failure isolation,
//! and the parse-then-index round-trip.

mod helpers;

use aifbin_recall::index::index_directory;
use aifbin_recall::store::Store;
use helpers::{spike, write_fixture, FixtureChunk};

fn test_store() -> Store {
    Store::open_in_memory().unwrap()
}

#[test]
fn indexes_one_file() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(
        dir.path(),
        "a.aif-bin",
        &serde_json::json!({}),
        &[FixtureChunk::text("c1", "hello world", spike(384, 0))],
    );

    let mut store = test_store();
    let report = index_directory(&mut store, dir.path(), "c", false).unwrap();
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.chunks_indexed, 1);

    let files = store.list_files(None).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].source_file.ends_with("/a.aif-bin"));
    assert_eq!(files[0].chunk_count, 1);

    let coll = store.get_collection("c").unwrap().unwrap();
    assert_eq!(coll.chunk_count, 1);
    assert_eq!(coll.file_count, 1);
}

#[test]
fn parse_then_index_preserves_text_embedding_and_id() {
    let dir = tempfile::tempdir().unwrap();
    let embedding = vec![0.25f32, -0.5, 0.125, 1.0];
    let path = write_fixture(
        dir.path(),
        "a.aif-bin",
        &serde_json::json!({"created_at": "2026-02-01T00:00:00Z"}),
        &[FixtureChunk::text("stable-id", "exact text", embedding.clone())],
    );

    let mut store = test_store();
    index_directory(&mut store, dir.path(), "c", false).unwrap();

    let canonical = path.canonicalize().unwrap();
    let chunks = store
        .get_chunks_by_source_file(&canonical.to_string_lossy())
        .unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].id, "stable-id");
    assert_eq!(chunks[0].text, "exact text");
    assert_eq!(chunks[0].embedding, embedding);

    // metadata is augmented at index time
    let metadata = chunks[0].metadata.as_ref().unwrap();
    assert_eq!(metadata["embedding_dim"], 4);
    assert_eq!(metadata["original_created_at"], "2026-02-01T00:00:00Z");
}

#[test]
fn reingest_replaces_prior_chunks() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(
        dir.path(),
        "a.aif-bin",
        &serde_json::json!({}),
        &[FixtureChunk::text("c1", "one chunk", spike(8, 0))],
    );

    let mut store = test_store();
    index_directory(&mut store, dir.path(), "c", false).unwrap();

    // Same source path, now carrying two chunks
    write_fixture(
        dir.path(),
        "a.aif-bin",
        &serde_json::json!({}),
        &[
            FixtureChunk::text("c1", "first of two", spike(8, 0)),
            FixtureChunk::text("c2", "second of two", spike(8, 1)),
        ],
    );
    index_directory(&mut store, dir.path(), "c", false).unwrap();

    let coll = store.get_collection("c").unwrap().unwrap();
    assert_eq!(coll.chunk_count, 2);
    assert_eq!(coll.file_count, 1);

    let files = store.list_files(None).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].chunk_count, 2);
}

#[test]
fn reingesting_identical_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(
        dir.path(),
        "a.aif-bin",
        &serde_json::json!({}),
        &[
            FixtureChunk::text("c1", "alpha", spike(8, 0)),
            FixtureChunk::text("c2", "beta", spike(8, 1)),
        ],
    );

    let mut store = test_store();
    index_directory(&mut store, dir.path(), "c", false).unwrap();
    index_directory(&mut store, dir.path(), "c", false).unwrap();

    let coll = store.get_collection("c").unwrap().unwrap();
    assert_eq!(coll.chunk_count, 2);
    assert_eq!(coll.file_count, 1);
    assert_eq!(store.list_collections().unwrap().len(), 1);
}

#[test]
fn bad_file_is_skipped_good_file_is_indexed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.aif-bin"), [0u8; 128]).unwrap();
    write_fixture(
        dir.path(),
        "good.aif-bin",
        &serde_json::json!({}),
        &[
            FixtureChunk::text("g1", "good one", spike(8, 0)),
            FixtureChunk::text("g2", "good two", spike(8, 1)),
        ],
    );

    let mut store = test_store();
    let report = index_directory(&mut store, dir.path(), "c", false).unwrap();
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.chunks_indexed, 2);
}

#[test]
fn file_without_embedded_chunks_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(
        dir.path(),
        "plain.aif-bin",
        &serde_json::json!({}),
        &[FixtureChunk {
            type_tag: 1,
            id: Some("no-embedding".into()),
            embedding: vec![],
            data: b"text without vector".to_vec(),
        }],
    );

    let mut store = test_store();
    let report = index_directory(&mut store, dir.path(), "c", false).unwrap();
    assert_eq!(report.files_indexed, 0);
    assert_eq!(report.chunks_indexed, 0);
    assert!(store.list_files(None).unwrap().is_empty());
}

#[test]
fn recursive_walk_finds_nested_files() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("deep/deeper");
    std::fs::create_dir_all(&nested).unwrap();
    write_fixture(
        &nested,
        "n.aif-bin",
        &serde_json::json!({}),
        &[FixtureChunk::text("n1", "nested", spike(8, 0))],
    );

    let mut store = test_store();
    let flat = index_directory(&mut store, dir.path(), "c", false).unwrap();
    assert_eq!(flat.files_indexed, 0);

    let recursive = index_directory(&mut store, dir.path(), "c", true).unwrap();
    assert_eq!(recursive.files_indexed, 1);
    assert_eq!(recursive.chunks_indexed, 1);
}

#[test]
fn skips_hidden_files() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(
        dir.path(),
        ".hidden.aif-bin",
        &serde_json::json!({}),
        &[FixtureChunk::text("h1", "hidden", spike(8, 0))],
    );
    write_fixture(
        dir.path(),
        "visible.aif-bin",
        &serde_json::json!({}),
        &[FixtureChunk::text("v1", "visible", spike(8, 1))],
    );

    let mut store = test_store();
    let report = index_directory(&mut store, dir.path(), "c", false).unwrap();
    assert_eq!(report.files_indexed, 1);
    assert!(store.get_chunk("h1").unwrap().is_none());
    assert!(store.get_chunk("v1").unwrap().is_some());
}

#[test]
fn skips_hidden_directories() {
    let dir = tempfile::tempdir().unwrap();
    let hidden = dir.path().join(".cache");
    std::fs::create_dir_all(&hidden).unwrap();
    write_fixture(
        &hidden,
        "buried.aif-bin",
        &serde_json::json!({}),
        &[FixtureChunk::text("b1", "buried", spike(8, 0))],
    );

    let mut store = test_store();
    let report = index_directory(&mut store, dir.path(), "c", true).unwrap();
    assert_eq!(report.files_indexed, 0);
    assert_eq!(report.chunks_indexed, 0);
}

#[test]
fn non_memory_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a memory file").unwrap();
    write_fixture(
        dir.path(),
        "real.aif-bin",
        &serde_json::json!({}),
        &[FixtureChunk::text("r1", "real", spike(8, 0))],
    );

    let mut store = test_store();
    let report = index_directory(&mut store, dir.path(), "c", false).unwrap();
    assert_eq!(report.files_indexed, 1);
}

#[test]
fn partial_file_keeps_decoded_chunks() {
    let dir = tempfile::tempdir().unwrap();
    // one good chunk, then truncate into the second record
    let bytes = helpers::encode_memory_file(
        &serde_json::json!({}),
        &[
            FixtureChunk::text("ok", "intact chunk", spike(8, 0)),
            FixtureChunk::text("cut", "this record gets truncated", spike(8, 1)),
        ],
    );
    let truncated = &bytes[..bytes.len() - 6];
    std::fs::write(dir.path().join("partial.aif-bin"), truncated).unwrap();

    let mut store = test_store();
    let report = index_directory(&mut store, dir.path(), "c", false).unwrap();
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.chunks_indexed, 1);

    let chunks = store.get_chunks_by_collection(
        &store.get_collection("c").unwrap().unwrap().id,
    )
    .unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].id, "ok");
}
