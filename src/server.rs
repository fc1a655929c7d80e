//! HTTP/JSON transport over the facade.
//!
//! Routes follow the published surface: collections CRUD, search (POST body
//! or GET query string), recall, index, files, chunks, settings. CORS is
//! open, bodies are capped at 10 MiB, and every error leaves as the
//! `{error, hint?}` envelope with a status derived from the error kind.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::RecallConfig;
use crate::error::{RecallError, Result};
use crate::search::SearchResult;
use crate::service::{IndexRequest, RecallService, SearchRequest};

const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Start the HTTP server on the configured bind address.
pub async fn serve(config: RecallConfig) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let service = Arc::new(crate::service::open_service(config)?);

    let app = router(service);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}

fn router(service: Arc<RecallService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/collections", get(collections_list))
        .route(
            "/collections/:name",
            get(collection_get).post(collection_create).delete(collection_delete),
        )
        .route("/search", post(search_post).get(search_get))
        .route("/recall/:id", get(recall_get))
        .route("/index", post(index_post))
        .route("/files", get(files_list))
        .route("/files/*path", get(file_get).delete(file_delete))
        .route("/chunks/:id", delete(chunk_delete))
        .route("/settings", get(settings_get))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

// ── Error envelope ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

fn status_for(err: &RecallError) -> StatusCode {
    match err {
        RecallError::Input(_) | RecallError::Parse(_) | RecallError::DimMismatch { .. } => {
            StatusCode::BAD_REQUEST
        }
        RecallError::NotFound { .. } => StatusCode::NOT_FOUND,
        RecallError::Duplicate(_) => StatusCode::CONFLICT,
        RecallError::Store(_)
        | RecallError::Io(_)
        | RecallError::Embedder(_)
        | RecallError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn hint_for(err: &RecallError) -> Option<String> {
    match err {
        RecallError::NotFound { kind: "collection", name } => Some(format!(
            "collections are created by indexing into them: POST /index {{\"path\": ..., \"collection\": \"{name}\"}}"
        )),
        RecallError::Embedder(msg) if msg.contains("model download") => {
            Some("run `aifbin-recall model download` on the host".into())
        }
        RecallError::Input(_) => Some("see GET /settings for defaults and limits".into()),
        _ => None,
    }
}

fn error_response(err: RecallError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(kind = err.kind(), error = %err, "request failed");
    } else {
        tracing::debug!(kind = err.kind(), error = %err, "request rejected");
    }
    let body = ErrorBody {
        hint: hint_for(&err),
        error: err.to_string(),
    };
    (status, Json(body)).into_response()
}

/// Run a blocking facade call off the async runtime and shape the outcome.
async fn run_blocking<T, F>(f: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(e) => error_response(RecallError::Internal(format!("task join failed: {e}"))),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn collections_list(State(service): State<Arc<RecallService>>) -> Response {
    run_blocking(move || service.list_collections()).await
}

async fn collection_get(
    State(service): State<Arc<RecallService>>,
    Path(name): Path<String>,
) -> Response {
    run_blocking(move || service.get_collection(&name)).await
}

#[derive(Debug, Default, Deserialize)]
struct CreateCollectionBody {
    description: Option<String>,
}

async fn collection_create(
    State(service): State<Arc<RecallService>>,
    Path(name): Path<String>,
    body: Option<Json<CreateCollectionBody>>,
) -> Response {
    let description = body.and_then(|Json(b)| b.description);
    run_blocking(move || service.create_collection(&name, description.as_deref())).await
}

async fn collection_delete(
    State(service): State<Arc<RecallService>>,
    Path(name): Path<String>,
) -> Response {
    run_blocking(move || {
        if service.delete_collection(&name)? {
            Ok(serde_json::json!({"deleted": name}))
        } else {
            Err(RecallError::NotFound {
                kind: "collection",
                name,
            })
        }
    })
    .await
}

/// Search results as the wire shape. Verbose keeps the full chunk record;
/// the default trims to the fields a ranked hit needs.
fn shape_results(results: Vec<SearchResult>, verbose: bool) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            if verbose {
                serde_json::to_value(r).unwrap_or_default()
            } else {
                serde_json::json!({
                    "id": r.chunk.id,
                    "source_file": r.chunk.source_file,
                    "chunk_index": r.chunk.chunk_index,
                    "text": r.chunk.text,
                    "score": r.score,
                    "vector_score": r.vector_score,
                    "keyword_score": r.keyword_score,
                })
            }
        })
        .collect();
    serde_json::json!({ "results": rows, "count": rows.len() })
}

async fn search_post(
    State(service): State<Arc<RecallService>>,
    Json(request): Json<SearchRequest>,
) -> Response {
    run_blocking(move || {
        let verbose = request.verbose;
        let results = service.search(&request)?;
        Ok(shape_results(results, verbose))
    })
    .await
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    collection: Option<String>,
    limit: Option<usize>,
}

async fn search_get(
    State(service): State<Arc<RecallService>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    run_blocking(move || {
        let request = SearchRequest {
            query: Some(query.q),
            collection: query.collection,
            limit: query.limit,
            ..Default::default()
        };
        let results = service.search(&request)?;
        Ok(shape_results(results, false))
    })
    .await
}

async fn recall_get(
    State(service): State<Arc<RecallService>>,
    Path(id): Path<String>,
) -> Response {
    run_blocking(move || {
        service.recall(&id)?.ok_or(RecallError::NotFound {
            kind: "chunk",
            name: id,
        })
    })
    .await
}

async fn index_post(
    State(service): State<Arc<RecallService>>,
    Json(request): Json<IndexRequest>,
) -> Response {
    run_blocking(move || service.index_directory(&request)).await
}

#[derive(Debug, Deserialize)]
struct FilesQuery {
    collection: Option<String>,
}

async fn files_list(
    State(service): State<Arc<RecallService>>,
    Query(query): Query<FilesQuery>,
) -> Response {
    run_blocking(move || service.list_files(query.collection.as_deref())).await
}

/// Wildcard captures drop the leading slash; source files are stored as
/// absolute paths, so it goes back on.
fn absolute(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

async fn file_get(
    State(service): State<Arc<RecallService>>,
    Path(path): Path<String>,
) -> Response {
    run_blocking(move || service.get_file_chunks(&absolute(path))).await
}

async fn file_delete(
    State(service): State<Arc<RecallService>>,
    Path(path): Path<String>,
) -> Response {
    run_blocking(move || {
        let source_file = absolute(path);
        let removed = service.delete_file(&source_file)?;
        Ok(serde_json::json!({"deleted": source_file, "chunks_removed": removed}))
    })
    .await
}

async fn chunk_delete(
    State(service): State<Arc<RecallService>>,
    Path(id): Path<String>,
) -> Response {
    run_blocking(move || {
        service.delete_chunk(&id)?;
        Ok(serde_json::json!({"deleted": id}))
    })
    .await
}

async fn settings_get(State(service): State<Arc<RecallService>>) -> Response {
    run_blocking(move || Ok(service.settings())).await
}
