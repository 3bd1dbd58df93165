//! Retrieve command: print the chunks closest to a query.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};

use super::{load_embedder, load_index};
use crate::config::Settings;
use crate::retrieve::{RetrievalResult, Retriever};
use crate::utils::format_timestamp;

const PREVIEW_CHARS: usize = 160;

pub struct RetrieveArgs {
    pub query: String,
    pub top_k: Option<usize>,
    pub index: Option<PathBuf>,
    pub json: bool,
}

pub fn run(args: RetrieveArgs, config: &Settings) -> Result<()> {
    let index = load_index(config, args.index.as_deref())?;
    if !args.json {
        let meta = index.metadata();
        eprintln!(
            "Index: {} chunks from {} documents, built {}",
            meta.chunk_count,
            meta.document_count,
            format_timestamp(meta.created_at)
        );
    }
    let retriever = Retriever::new(load_embedder(config)?);
    let top_k = args.top_k.unwrap_or(config.retrieval.top_k);

    let result = retriever
        .retrieve(&args.query, &index, top_k)?
        .above_similarity(config.retrieval.min_similarity);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.is_empty() {
        eprintln!("No results found.");
    } else {
        println!("{}", results_table(&result));
    }
    Ok(())
}

/// Ranked hits as a table: citation number, source, distance, preview.
pub(crate) fn results_table(result: &RetrievalResult) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Source", "Distance", "Preview"]);

    for hit in result {
        let preview = hit.chunk.preview(PREVIEW_CHARS).replace(['\n', '\r'], " ");
        table.add_row(vec![
            format!("[{}]", hit.rank),
            hit.chunk.source_label(),
            format!("{:.4}", hit.distance),
            preview,
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Chunk;
    use crate::retrieve::RetrievedChunk;

    #[test]
    fn test_results_table_lists_hits() {
        let result = RetrievalResult {
            hits: vec![RetrievedChunk {
                rank: 1,
                ordinal: 4,
                distance: 0.25,
                similarity: 0.8,
                chunk: Chunk::new("line one\nline two", "notes.md", 2, (0, 17)).record(),
            }],
        };
        let rendered = results_table(&result).to_string();
        assert!(rendered.contains("[1]"));
        assert!(rendered.contains("notes.md#2"));
        assert!(rendered.contains("0.2500"));
        assert!(rendered.contains("line one line two"));
    }
}
