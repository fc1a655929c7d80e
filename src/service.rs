//! Facade the transports bind to.
//!
//! [`RecallService`] composes the store, the embedder capability, and the
//! config into the operations the HTTP server, the tool protocol, and the
//! CLI dispatch to. Methods are synchronous (disk and inference both block);
//! async hosts wrap calls in `tokio::task::spawn_blocking`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;

use crate::config::RecallConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RecallError, Result};
use crate::index::{self, IndexReport};
use crate::search::{self, SearchOptions, SearchResult};
use crate::store::{Collection, FileEntry, MemoryChunk, Store};

/// A search request, as transports deserialize it.
#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    /// Free-text query. Embedded on demand when no `embedding` is supplied.
    #[serde(alias = "text")]
    pub query: Option<String>,
    /// Pre-computed query vector. Skips the embedder entirely.
    pub embedding: Option<Vec<f32>>,
    pub collection: Option<String>,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
    pub hybrid_weight: Option<f32>,
    /// Embedding model override for this request.
    pub model: Option<String>,
    /// Include full chunk records (metadata, timestamps) in responses.
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub path: String,
    pub collection: String,
    #[serde(default)]
    pub recursive: bool,
}

/// Thin composition layer over Store + Embedder + config.
///
/// Embedding providers are created lazily per model name, so operations
/// that never embed (index, list, recall) never pay for model load.
pub struct RecallService {
    store: Mutex<Store>,
    embedders: Mutex<HashMap<String, Arc<dyn EmbeddingProvider>>>,
    config: Arc<RecallConfig>,
}

impl RecallService {
    pub fn new(store: Store, config: RecallConfig) -> Self {
        Self {
            store: Mutex::new(store),
            embedders: Mutex::new(HashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Build a service with an injected embedder for the configured model.
    /// Tests use this to substitute a deterministic stub.
    pub fn with_embedder(
        store: Store,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RecallConfig,
    ) -> Self {
        let service = Self::new(store, config);
        {
            let mut cache = service.embedders.lock().expect("fresh lock");
            cache.insert(service.config.embedding.model.clone(), embedder);
        }
        service
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|e| RecallError::Internal(format!("store lock poisoned: {e}")))
    }

    /// Provider for `model` (or the configured default), created on first use.
    fn embedder(&self, model: Option<&str>) -> Result<Arc<dyn EmbeddingProvider>> {
        let name = model.unwrap_or(&self.config.embedding.model);
        let mut cache = self
            .embedders
            .lock()
            .map_err(|e| RecallError::Internal(format!("embedder lock poisoned: {e}")))?;
        if let Some(provider) = cache.get(name) {
            return Ok(Arc::clone(provider));
        }

        let mut embedding_config = self.config.embedding.clone();
        embedding_config.model = name.to_string();
        let provider: Arc<dyn EmbeddingProvider> =
            Arc::from(embedding::create_provider(&embedding_config)?);
        cache.insert(name.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    // ── Search surface ───────────────────────────────────────────────────

    /// Ranked retrieval. With a supplied embedding and no query text this is
    /// pure vector search; any query text engages hybrid fusion, embedding
    /// the text first when no vector was provided.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let options = SearchOptions {
            collection: request.collection.clone(),
            limit: request.limit.unwrap_or(self.config.search.default_limit),
            threshold: request.threshold.unwrap_or(self.config.search.default_threshold),
            hybrid_weight: request
                .hybrid_weight
                .unwrap_or(self.config.search.hybrid_weight),
        };

        match (&request.embedding, &request.query) {
            (Some(embedding), Some(query)) => {
                let store = self.store()?;
                search::hybrid(&store, embedding, query, &options)
            }
            (Some(embedding), None) => {
                let store = self.store()?;
                search::search(&store, embedding, &options)
            }
            (None, Some(query)) => {
                let embedder = self.embedder(request.model.as_deref())?;
                let embedding = embedder.embed(query)?;
                let store = self.store()?;
                search::hybrid(&store, &embedding, query, &options)
            }
            (None, None) => Err(RecallError::Input(
                "search needs either `query` text or an `embedding` vector".into(),
            )),
        }
    }

    /// Direct chunk lookup.
    pub fn recall(&self, id: &str) -> Result<Option<MemoryChunk>> {
        let store = self.store()?;
        search::recall(&store, id)
    }

    // ── Collections ──────────────────────────────────────────────────────

    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        self.store()?.list_collections()
    }

    pub fn get_collection(&self, name: &str) -> Result<Collection> {
        self.store()?
            .get_collection(name)?
            .ok_or_else(|| RecallError::NotFound {
                kind: "collection",
                name: name.to_string(),
            })
    }

    /// Create a collection, or return the existing one of that name.
    pub fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection> {
        let mut store = self.store()?;
        if let Some(existing) = store.get_collection(name)? {
            return Ok(existing);
        }
        store.create_collection(name, description)
    }

    /// Delete a collection and (by cascade) its chunks. Returns whether it
    /// existed.
    pub fn delete_collection(&self, name: &str) -> Result<bool> {
        self.store()?.delete_collection(name)
    }

    // ── Ingestion ────────────────────────────────────────────────────────

    pub fn index_directory(&self, request: &IndexRequest) -> Result<IndexReport> {
        let path = crate::config::expand_tilde(&request.path);
        if !path.is_dir() {
            return Err(RecallError::Input(format!(
                "not a directory: {}",
                path.display()
            )));
        }
        if request.collection.is_empty() {
            return Err(RecallError::Input("collection name must not be empty".into()));
        }
        let mut store = self.store()?;
        index::index_directory(&mut store, &path, &request.collection, request.recursive)
    }

    // ── Files and chunks ─────────────────────────────────────────────────

    pub fn list_files(&self, collection: Option<&str>) -> Result<Vec<FileEntry>> {
        let store = self.store()?;
        let collection_id = match collection {
            Some(name) => Some(
                store
                    .get_collection(name)?
                    .ok_or_else(|| RecallError::NotFound {
                        kind: "collection",
                        name: name.to_string(),
                    })?
                    .id,
            ),
            None => None,
        };
        store.list_files(collection_id.as_deref())
    }

    /// All chunks for one source file, index-ordered.
    pub fn get_file_chunks(&self, source_file: &str) -> Result<Vec<MemoryChunk>> {
        let chunks = self.store()?.get_chunks_by_source_file(source_file)?;
        if chunks.is_empty() {
            return Err(RecallError::NotFound {
                kind: "source file",
                name: source_file.to_string(),
            });
        }
        Ok(chunks)
    }

    /// Remove every chunk ingested from a source file. Returns the count.
    pub fn delete_file(&self, source_file: &str) -> Result<usize> {
        let mut store = self.store()?;
        let affected: Vec<String> = store
            .get_chunks_by_source_file(source_file)?
            .into_iter()
            .map(|c| c.collection_id)
            .collect();
        if affected.is_empty() {
            return Err(RecallError::NotFound {
                kind: "source file",
                name: source_file.to_string(),
            });
        }

        let removed = store.delete_chunks_by_source(source_file)?;
        for collection_id in dedup(affected) {
            store.update_collection_stats(&collection_id)?;
        }
        Ok(removed)
    }

    pub fn delete_chunk(&self, id: &str) -> Result<()> {
        let mut store = self.store()?;
        let chunk = store.get_chunk(id)?.ok_or_else(|| RecallError::NotFound {
            kind: "chunk",
            name: id.to_string(),
        })?;
        store.delete_chunk(id)?;
        store.update_collection_stats(&chunk.collection_id)?;
        Ok(())
    }

    // ── Introspection ────────────────────────────────────────────────────

    /// Effective settings snapshot for the `/settings` endpoint.
    pub fn settings(&self) -> serde_json::Value {
        let model_dims = embedding::model_spec(&self.config.embedding.model)
            .map(|spec| spec.dimensions);
        serde_json::json!({
            "db_path": self.config.storage.db_path,
            "model": self.config.embedding.model,
            "model_dimensions": model_dims,
            "default_limit": self.config.search.default_limit,
            "default_threshold": self.config.search.default_threshold,
            "hybrid_weight": self.config.search.hybrid_weight,
        })
    }
}

fn dedup(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids.dedup();
    ids
}

/// Open the configured store and wrap it in a service.
pub fn open_service(config: RecallConfig) -> Result<RecallService> {
    let store = Store::open(config.resolved_db_path())?;
    Ok(RecallService::new(store, config))
}
