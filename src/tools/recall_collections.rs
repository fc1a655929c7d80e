//! `recall_collections` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `recall_collections` tool. Takes nothing.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct RecallCollectionsParams {}
