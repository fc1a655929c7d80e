use anyhow::Result;
use std::path::Path;

use crate::format;

/// Parse a `.aif-bin` file and report what it holds, without indexing.
pub fn inspect(path: &Path) -> Result<()> {
    let parsed = format::parse(path)?;

    println!("{}", path.display());
    println!("  version:  {}", parsed.version);
    println!("  metadata: {} key(s)", parsed.metadata.len());
    if let Some(note) = &parsed.metadata_error {
        println!("  metadata error (tolerated): {note}");
    }
    if let Some(footer) = parsed.footer_offset {
        println!("  footer offset: {footer} (not validated)");
    }
    println!("  chunks:   {}", parsed.chunks.len());

    for (i, chunk) in parsed.chunks.iter().enumerate() {
        let text_note = if chunk.text.is_empty() {
            "no text".to_string()
        } else {
            format!("{} chars", chunk.text.len())
        };
        println!(
            "    [{i}] {:?} id={} embedding={} dims, {text_note}",
            chunk.chunk_type,
            chunk.id,
            chunk.embedding.len(),
        );
    }

    if let Some(err) = &parsed.chunk_error {
        println!("  chunk stream error: {err}");
    }
    Ok(())
}
