use anyhow::Result;

use crate::config::RecallConfig;
use crate::store::Store;

/// List all collections with their derived counts.
pub fn list(config: &RecallConfig) -> Result<()> {
    let store = Store::open(config.resolved_db_path())?;
    let collections = store.list_collections()?;

    if collections.is_empty() {
        println!("No collections. Index a directory first: aifbin-recall index <path> --collection <name>");
        return Ok(());
    }

    println!("{:<24} {:>8} {:>8}  {}", "NAME", "FILES", "CHUNKS", "UPDATED");
    for coll in collections {
        println!(
            "{:<24} {:>8} {:>8}  {}",
            coll.name, coll.file_count, coll.chunk_count, coll.updated_at
        );
    }
    Ok(())
}

/// Delete a collection and everything in it.
pub fn delete(config: &RecallConfig, name: &str) -> Result<()> {
    let mut store = Store::open(config.resolved_db_path())?;
    if store.delete_collection(name)? {
        println!("Deleted collection '{name}'.");
    } else {
        println!("No collection named '{name}'.");
    }
    Ok(())
}
