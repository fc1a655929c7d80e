//! `recall_index` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `recall_index` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallIndexParams {
    /// Directory containing `.aif-bin` memory files.
    #[schemars(description = "Directory containing .aif-bin memory files.")]
    pub path: String,

    /// Collection to ingest into, created on demand.
    #[schemars(description = "Collection to ingest into. Created if it does not exist.")]
    pub collection: String,

    /// Walk subdirectories too. Defaults to false (one level).
    #[schemars(description = "Walk subdirectories too. Defaults to false (one level only).")]
    pub recursive: Option<bool>,
}
