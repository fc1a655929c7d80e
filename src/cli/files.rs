use anyhow::Result;

use crate::config::RecallConfig;
use crate::service::RecallService;
use crate::store::Store;

/// List indexed source files and their chunk counts.
pub fn list(config: &RecallConfig, collection: Option<&str>) -> Result<()> {
    let service = RecallService::new(Store::open(config.resolved_db_path())?, config.clone());
    let files = service.list_files(collection)?;

    if files.is_empty() {
        println!("No files indexed.");
        return Ok(());
    }

    for entry in files {
        println!("{:>6}  {}", entry.chunk_count, entry.source_file);
    }
    Ok(())
}
