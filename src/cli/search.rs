use anyhow::Result;

use crate::config::RecallConfig;
use crate::service::{RecallService, SearchRequest};

/// Run a hybrid search from the terminal.
pub fn search(
    config: &RecallConfig,
    query: &str,
    collection: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let service = RecallService::new(
        crate::store::Store::open(config.resolved_db_path())?,
        config.clone(),
    );

    let results = service.search(&SearchRequest {
        query: Some(query.to_string()),
        collection: collection.map(str::to_string),
        limit,
        ..Default::default()
    })?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, result) in results.iter().enumerate() {
        let preview = if result.chunk.text.len() > 120 {
            let end = result
                .chunk
                .text
                .char_indices()
                .take_while(|(idx, _)| *idx < 120)
                .last()
                .map(|(idx, c)| idx + c.len_utf8())
                .unwrap_or(120);
            format!("{}...", &result.chunk.text[..end])
        } else {
            result.chunk.text.clone()
        };

        println!(
            "  {}. {} (score: {:.4}, vector: {:.4}, keyword: {:.4})",
            i + 1,
            result.chunk.id,
            result.score,
            result.vector_score,
            result.keyword_score,
        );
        println!("     {} [chunk {}]", result.chunk.source_file, result.chunk.chunk_index);
        println!("     {preview}");
        println!();
    }

    Ok(())
}
