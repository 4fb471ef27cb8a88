//! Turns raw fetched bytes into parsed documents, chunks, and extracted
//! code snippets.

pub mod chunker;
pub mod code_extractor;
pub mod parser;

pub use chunker::{chunk_fixed_size, chunk_semantic, TextChunk};
pub use code_extractor::{extract_from_html, extract_from_markdown, CodeSnippet};
pub use parser::{parse_html, parse_markdown, ParsedDocument};

/// Parse by MIME type / extension, falling back to a raw UTF-8 decode with
/// no title/language metadata (spec §4.3).
pub fn parse_by_kind(content: &str, mime_or_ext: &str, origin_url: Option<&str>) -> ParsedDocument {
    let lower = mime_or_ext.to_ascii_lowercase();
    if lower.contains("html") || lower.ends_with(".htm") || lower.ends_with(".xhtml") {
        parse_html(content, origin_url)
    } else if lower.contains("markdown") || lower.ends_with(".md") || lower.ends_with(".mkd") {
        parse_markdown(content, origin_url)
    } else {
        ParsedDocument {
            content: content.to_string(),
            title: None,
            language: "en".to_string(),
            metadata: origin_url
                .map(|u| {
                    let mut m = std::collections::BTreeMap::new();
                    m.insert("url".to_string(), u.to_string());
                    m
                })
                .unwrap_or_default(),
        }
    }
}

/// Dispatch chunking by document-level strategy; runs on the calling thread
/// — callers dispatch this to a `rayon` worker pool for CPU-bound batches
/// (spec §4.4).
pub fn chunk_document(
    text: &str,
    strategy: docvector_common::types::ChunkingStrategy,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<TextChunk> {
    use docvector_common::types::ChunkingStrategy::*;
    match strategy {
        Fixed => chunk_fixed_size(text, chunk_size, chunk_overlap, "\n"),
        Semantic => chunk_semantic(text, chunk_size),
    }
}

/// Chunk many documents in parallel via `rayon` (spec §4.4: "chunkers are
/// pure CPU work; callers may dispatch them to a worker pool").
pub fn chunk_documents_parallel(
    texts: &[String],
    strategy: docvector_common::types::ChunkingStrategy,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Vec<TextChunk>> {
    use rayon::prelude::*;
    texts
        .par_iter()
        .map(|text| chunk_document(text, strategy, chunk_size, chunk_overlap))
        .collect()
}
