//! Ranking of stored chunks against a query: exact cosine over all
//! candidates, BM25 keyword scoring, and weighted fusion of the two.
//!
//! The engine is stateless over [`Store`]; any number of callers may share
//! one store. All scoring accumulates in f32, the stored element type.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{RecallError, Result};
use crate::store::{MemoryChunk, Store};

/// Knobs for a single search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Collection name to search, or `None` for all collections.
    pub collection: Option<String>,
    pub limit: usize,
    /// Minimum score a result must reach; candidates below it are dropped.
    pub threshold: f32,
    /// Vector weight `w` in the fused score `w·V + (1−w)·K`. `1.0` means
    /// pure vector.
    pub hybrid_weight: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            collection: None,
            limit: 10,
            threshold: 0.0,
            hybrid_weight: 0.7,
        }
    }
}

/// One ranked result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: MemoryChunk,
    pub score: f32,
    pub vector_score: f32,
    pub keyword_score: f32,
}

/// Cosine similarity of two same-length vectors, accumulated in f32.
/// Defined as 0 when either magnitude is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Pure vector ranking: cosine against every candidate, threshold, top-k.
pub fn search(store: &Store, query: &[f32], options: &SearchOptions) -> Result<Vec<SearchResult>> {
    if options.limit == 0 {
        return Ok(Vec::new());
    }
    let collection_id = resolve_collection(store, options)?;
    let candidates = store.list_chunks(collection_id.as_deref())?;

    let mut results = Vec::with_capacity(candidates.len());
    for chunk in candidates {
        let cos = score_candidate(query, &chunk)?;
        if cos >= options.threshold {
            results.push(SearchResult {
                chunk,
                score: cos,
                vector_score: cos,
                keyword_score: 0.0,
            });
        }
    }

    rank(&mut results);
    results.truncate(options.limit);
    Ok(results)
}

/// Fused vector+keyword ranking.
///
/// Cosine is computed for every candidate; BM25 hits (up to `3·limit`) are
/// min-max normalized with the lower-is-better scale inverted, so the best
/// hit maps to 1.0 and the worst to 0.0. Fused score is
/// `w·V + (1−w)·K` with a missing keyword side contributing 0.
pub fn hybrid(
    store: &Store,
    query: &[f32],
    query_text: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    if options.limit == 0 {
        return Ok(Vec::new());
    }
    let collection_id = resolve_collection(store, options)?;
    let candidates = store.list_chunks(collection_id.as_deref())?;

    let keyword_hits =
        store.keyword_search(query_text, collection_id.as_deref(), options.limit * 3)?;
    let keyword_scores = normalize_bm25(&keyword_hits);

    let w = options.hybrid_weight;
    let mut results = Vec::with_capacity(candidates.len());
    for chunk in candidates {
        let cos = score_candidate(query, &chunk)?;
        let keyword = keyword_scores.get(&chunk.id).copied().unwrap_or(0.0);
        let score = w * cos + (1.0 - w) * keyword;
        if score >= options.threshold {
            results.push(SearchResult {
                chunk,
                score,
                vector_score: cos,
                keyword_score: keyword,
            });
        }
    }

    rank(&mut results);
    results.truncate(options.limit);
    Ok(results)
}

/// Direct lookup by chunk id. No scoring.
pub fn recall(store: &Store, id: &str) -> Result<Option<MemoryChunk>> {
    store.get_chunk(id)
}

/// Map a collection name to its id, failing on unknown names.
fn resolve_collection(store: &Store, options: &SearchOptions) -> Result<Option<String>> {
    match &options.collection {
        Some(name) => match store.get_collection(name)? {
            Some(coll) => Ok(Some(coll.id)),
            None => Err(RecallError::NotFound {
                kind: "collection",
                name: name.clone(),
            }),
        },
        None => Ok(None),
    }
}

fn score_candidate(query: &[f32], chunk: &MemoryChunk) -> Result<f32> {
    if chunk.embedding.len() != query.len() {
        return Err(RecallError::DimMismatch {
            expected: chunk.embedding.len(),
            actual: query.len(),
        });
    }
    Ok(cosine_similarity(query, &chunk.embedding))
}

/// Min-max normalize BM25 hits, inverting the lower-is-better scale: the
/// best raw score maps to 1.0, the worst to 0.0. A single hit (range 0)
/// maps to 1.0.
fn normalize_bm25(hits: &[(String, f64)]) -> HashMap<String, f32> {
    if hits.is_empty() {
        return HashMap::new();
    }
    let min = hits.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let max = hits.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
    let range = if max - min > 0.0 { max - min } else { 1.0 };

    hits.iter()
        .map(|(id, raw)| (id.clone(), (1.0 - (raw - min) / range) as f32))
        .collect()
}

/// Sort descending by score; equal scores order by chunk id ascending so
/// ranking is stable across runs.
fn rank(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::now_rfc3339;

    fn make_chunk(id: &str, cid: &str, text: &str, embedding: Vec<f32>) -> MemoryChunk {
        let now = now_rfc3339();
        MemoryChunk {
            id: id.to_string(),
            collection_id: cid.to_string(),
            source_file: "/tmp/a.aif-bin".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            embedding,
            metadata: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn unit_vec(dim: usize, spike: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[spike] = 1.0;
        v
    }

    fn seeded(chunks: &[(&str, &str, Vec<f32>)]) -> (Store, String) {
        let mut store = Store::open_in_memory().unwrap();
        let coll = store.create_collection("c", None).unwrap();
        let batch: Vec<MemoryChunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, (id, text, emb))| {
                let mut chunk = make_chunk(id, &coll.id, text, emb.clone());
                chunk.chunk_index = i as u32;
                chunk
            })
            .collect();
        store.insert_chunks(&batch).unwrap();
        (store, coll.id)
    }

    fn opts(collection: Option<&str>) -> SearchOptions {
        SearchOptions {
            collection: collection.map(str::to_string),
            ..SearchOptions::default()
        }
    }

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let v = unit_vec(8, 3);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&unit_vec(8, 0), &unit_vec(8, 4)), 0.0);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_can_be_negative() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn vector_search_ranks_by_similarity() {
        let (store, _) = seeded(&[
            ("a", "far", unit_vec(4, 1)),
            ("b", "near", unit_vec(4, 0)),
        ]);
        let results = search(&store, &unit_vec(4, 0), &opts(Some("c"))).unwrap();
        // the orthogonal chunk scores 0.0, which still passes the default threshold
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "b");
        assert!((results[0].vector_score - 1.0).abs() < 1e-6);
        assert!(results[1].vector_score.abs() < 1e-6);
    }

    #[test]
    fn unknown_collection_is_an_error() {
        let (store, _) = seeded(&[("a", "x", unit_vec(4, 0))]);
        let err = search(&store, &unit_vec(4, 0), &opts(Some("missing"))).unwrap_err();
        assert!(matches!(
            err,
            RecallError::NotFound { kind: "collection", .. }
        ));
    }

    #[test]
    fn dim_mismatch_is_an_error() {
        let (store, _) = seeded(&[("a", "x", unit_vec(4, 0))]);
        let err = search(&store, &unit_vec(5, 0), &opts(Some("c"))).unwrap_err();
        assert!(matches!(err, RecallError::DimMismatch { expected: 4, actual: 5 }));
    }

    #[test]
    fn empty_collection_returns_empty() {
        let mut store = Store::open_in_memory().unwrap();
        store.create_collection("c", None).unwrap();
        let results = search(&store, &unit_vec(4, 0), &opts(Some("c"))).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn zero_limit_returns_empty() {
        let (store, _) = seeded(&[("a", "x", unit_vec(4, 0))]);
        let mut o = opts(Some("c"));
        o.limit = 0;
        assert!(search(&store, &unit_vec(4, 0), &o).unwrap().is_empty());
        assert!(hybrid(&store, &unit_vec(4, 0), "x", &o).unwrap().is_empty());
    }

    #[test]
    fn threshold_filters_results() {
        let (store, _) = seeded(&[
            ("a", "far", unit_vec(4, 1)),
            ("b", "near", unit_vec(4, 0)),
        ]);
        let mut o = opts(Some("c"));
        o.threshold = 0.5;
        let results = search(&store, &unit_vec(4, 0), &o).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "b");

        o.threshold = 1.5; // above every possible cosine
        assert!(search(&store, &unit_vec(4, 0), &o).unwrap().is_empty());
    }

    #[test]
    fn normalize_bm25_maps_best_to_one() {
        let hits = vec![
            ("best".to_string(), -5.0),
            ("mid".to_string(), -3.0),
            ("worst".to_string(), -1.0),
        ];
        let scores = normalize_bm25(&hits);
        assert!((scores["best"] - 1.0).abs() < 1e-6);
        assert!((scores["worst"]).abs() < 1e-6);
        assert!(scores["mid"] > 0.0 && scores["mid"] < 1.0);
    }

    #[test]
    fn normalize_bm25_single_hit_is_one() {
        let scores = normalize_bm25(&[("only".to_string(), -2.5)]);
        assert!((scores["only"] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hybrid_weights_blend_vector_and_keyword() {
        // A matches the keyword but is orthogonal to the query vector;
        // B is the query vector but misses the keyword.
        let (store, _) = seeded(&[
            ("a", "apples and bananas", unit_vec(4, 1)),
            ("b", "oranges", unit_vec(4, 0)),
        ]);
        let query = unit_vec(4, 0);

        let mut o = opts(Some("c"));
        o.hybrid_weight = 0.5;
        let results = hybrid(&store, &query, "apples", &o).unwrap();
        assert_eq!(results.len(), 2);
        // both fuse to 0.5; ids break the tie
        assert_eq!(results[0].chunk.id, "a");
        assert!((results[0].score - 0.5).abs() < 1e-6);
        assert!((results[1].score - 0.5).abs() < 1e-6);

        o.hybrid_weight = 0.7;
        let results = hybrid(&store, &query, "apples", &o).unwrap();
        assert_eq!(results[0].chunk.id, "b");
        assert!((results[0].score - 0.7).abs() < 1e-6);
        assert_eq!(results[1].chunk.id, "a");
        assert!((results[1].score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn hybrid_with_full_vector_weight_equals_pure_vector() {
        let (store, _) = seeded(&[
            ("a", "apples and bananas", unit_vec(4, 1)),
            ("b", "oranges", unit_vec(4, 0)),
        ]);
        let query = unit_vec(4, 0);

        let mut o = opts(Some("c"));
        o.hybrid_weight = 1.0;
        let fused = hybrid(&store, &query, "apples", &o).unwrap();
        let pure = search(&store, &query, &o).unwrap();

        assert_eq!(fused.len(), pure.len());
        for (f, p) in fused.iter().zip(pure.iter()) {
            assert_eq!(f.chunk.id, p.chunk.id);
            assert!((f.score - p.score).abs() < 1e-6);
            assert!((f.score - f.vector_score).abs() < 1e-6);
        }
    }

    #[test]
    fn hybrid_with_zero_vector_weight_is_keyword_only() {
        let (store, _) = seeded(&[
            ("a", "apples and bananas", unit_vec(4, 1)),
            ("b", "oranges", unit_vec(4, 0)),
        ]);
        let mut o = opts(Some("c"));
        o.hybrid_weight = 0.0;
        o.threshold = 0.1; // drop the no-keyword chunk
        let results = hybrid(&store, &unit_vec(4, 0), "apples", &o).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "a");
        assert!((results[0].score - results[0].keyword_score).abs() < 1e-6);
    }

    #[test]
    fn zero_query_vector_falls_through_to_keyword_scores() {
        let (store, _) = seeded(&[
            ("a", "apples and bananas", unit_vec(4, 1)),
            ("b", "oranges", unit_vec(4, 0)),
        ]);
        let results = hybrid(&store, &[0.0; 4], "apples", &opts(Some("c"))).unwrap();
        // every vector score is 0; only the keyword hit has weight
        assert_eq!(results[0].chunk.id, "a");
        assert!((results[0].vector_score).abs() < 1e-6);
        assert!((results[0].score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn recall_returns_chunk_or_none() {
        let (store, _) = seeded(&[("a", "x", unit_vec(4, 0))]);
        assert_eq!(recall(&store, "a").unwrap().unwrap().id, "a");
        assert!(recall(&store, "missing").unwrap().is_none());
    }

    #[test]
    fn limit_truncates_ranked_results() {
        let (store, _) = seeded(&[
            ("a", "one", vec![1.0, 0.0, 0.0, 0.0]),
            ("b", "two", vec![0.9, 0.1, 0.0, 0.0]),
            ("c", "three", vec![0.0, 1.0, 0.0, 0.0]),
        ]);
        let mut o = opts(Some("c"));
        o.limit = 2;
        let results = search(&store, &unit_vec(4, 0), &o).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "a");
        assert_eq!(results[1].chunk.id, "b");
    }
}
