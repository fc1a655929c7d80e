use anyhow::Result;
use std::path::Path;

use crate::config::RecallConfig;
use crate::service::{IndexRequest, RecallService};

/// Ingest a directory of `.aif-bin` files from the terminal.
pub fn index(
    config: &RecallConfig,
    path: &Path,
    collection: &str,
    recursive: bool,
) -> Result<()> {
    let service = RecallService::new(
        crate::store::Store::open(config.resolved_db_path())?,
        config.clone(),
    );

    let report = service.index_directory(&IndexRequest {
        path: path.to_string_lossy().into_owned(),
        collection: collection.to_string(),
        recursive,
    })?;

    println!(
        "Indexed {} file(s), {} chunk(s) into '{collection}'.",
        report.files_indexed, report.chunks_indexed
    );
    Ok(())
}
