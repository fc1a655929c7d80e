//! `recall_get` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `recall_get` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallGetParams {
    /// Chunk id to fetch.
    #[schemars(description = "Chunk id as returned by recall_search.")]
    pub id: String,
}
