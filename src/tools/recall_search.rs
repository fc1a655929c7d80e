//! `recall_search` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `recall_search` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallSearchParams {
    /// Free-text query. Embedded locally unless `embedding` is supplied.
    #[schemars(description = "Natural language query. Embedded locally unless 'embedding' is supplied.")]
    pub query: String,

    /// Pre-computed query vector; skips the embedding model.
    #[schemars(description = "Pre-computed query embedding. When present, the local model is not invoked.")]
    pub embedding: Option<Vec<f32>>,

    /// Collection to search. All collections when omitted.
    #[schemars(description = "Collection name to search. Searches all collections when omitted.")]
    pub collection: Option<String>,

    /// Maximum number of results. Defaults to the configured limit.
    #[schemars(description = "Maximum number of results to return. Defaults to the configured limit (10).")]
    pub limit: Option<usize>,
}
