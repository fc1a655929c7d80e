//! Tool-protocol surface for AI agent hosts.
//!
//! Four tools over a framed stdio transport: `recall_search`, `recall_get`,
//! `recall_collections`, `recall_index`. Each returns JSON text content;
//! failures become tool errors on the wire.

pub mod recall_collections;
pub mod recall_get;
pub mod recall_index;
pub mod recall_search;

use std::sync::Arc;

use recall_collections::RecallCollectionsParams;
use recall_get::RecallGetParams;
use recall_index::RecallIndexParams;
use recall_search::RecallSearchParams;
use rmcp::handler::server::tool::{Parameters, ToolRouter};
use rmcp::{tool, tool_handler, tool_router, ServerHandler, ServiceExt};
use std::future::Future;

use crate::config::RecallConfig;
use crate::service::{IndexRequest, RecallService, SearchRequest};

/// The tool handler. Holds the shared facade and exposes all tools via the
/// `#[tool_router]` macro.
#[derive(Clone)]
pub struct RecallTools {
    tool_router: ToolRouter<Self>,
    service: Arc<RecallService>,
}

#[tool_router]
impl RecallTools {
    pub fn new(service: Arc<RecallService>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }

    /// Run a blocking facade call off the async executor.
    async fn blocking<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(Arc<RecallService>) -> crate::error::Result<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(service))
            .await
            .map_err(|e| format!("task failed: {e}"))?
            .map_err(|e| e.to_string())
    }

    #[tool(description = "Search indexed memory chunks. Hybrid semantic + keyword ranking over the named collection (or all collections).")]
    async fn recall_search(
        &self,
        Parameters(params): Parameters<RecallSearchParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, collection = ?params.collection, "recall_search called");

        let request = SearchRequest {
            query: Some(params.query),
            embedding: params.embedding,
            collection: params.collection,
            limit: params.limit,
            ..Default::default()
        };

        let results = self.blocking(move |service| service.search(&request)).await?;

        let rows: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.chunk.id,
                    "source_file": r.chunk.source_file,
                    "text": r.chunk.text,
                    "score": r.score,
                    "vector_score": r.vector_score,
                    "keyword_score": r.keyword_score,
                })
            })
            .collect();

        serde_json::to_string(&serde_json::json!({
            "results": rows,
            "count": rows.len(),
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    #[tool(description = "Fetch one memory chunk by id, including its metadata.")]
    async fn recall_get(
        &self,
        Parameters(params): Parameters<RecallGetParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "recall_get called");

        let id = params.id.clone();
        let chunk = self
            .blocking(move |service| service.recall(&id))
            .await?
            .ok_or_else(|| format!("chunk not found: {}", params.id))?;

        serde_json::to_string(&chunk).map_err(|e| format!("serialization failed: {e}"))
    }

    #[tool(description = "List collections with their file and chunk counts.")]
    async fn recall_collections(
        &self,
        Parameters(_params): Parameters<RecallCollectionsParams>,
    ) -> Result<String, String> {
        let collections = self
            .blocking(move |service| service.list_collections())
            .await?;
        serde_json::to_string(&serde_json::json!({ "collections": collections }))
            .map_err(|e| format!("serialization failed: {e}"))
    }

    #[tool(description = "Index a directory of .aif-bin memory files into a collection. Re-indexing a file replaces its prior chunks.")]
    async fn recall_index(
        &self,
        Parameters(params): Parameters<RecallIndexParams>,
    ) -> Result<String, String> {
        tracing::info!(path = %params.path, collection = %params.collection, "recall_index called");

        let request = IndexRequest {
            path: params.path,
            collection: params.collection,
            recursive: params.recursive.unwrap_or(false),
        };
        let report = self
            .blocking(move |service| service.index_directory(&request))
            .await?;

        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_handler]
impl ServerHandler for RecallTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "aifbin-recall serves pre-embedded memory files. Use recall_search to \
                 retrieve ranked chunks, recall_get for a specific chunk, \
                 recall_collections to list collections, and recall_index to ingest \
                 a directory of .aif-bin files."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

/// Start the tool server on stdio. One client, one request at a time.
pub async fn serve_stdio(config: RecallConfig) -> anyhow::Result<()> {
    tracing::info!("starting tool server on stdio");

    let service = Arc::new(crate::service::open_service(config)?);
    let tools = RecallTools::new(service);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("tool server running — waiting for client");

    server.waiting().await?;
    tracing::info!("tool server shut down");

    Ok(())
}
