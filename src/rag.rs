//! Turn a normalized document into enriched retrieval chunks.

use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::document::chunk::{ChunkStrategy, TextChunk};
use crate::document::Document;
use crate::error::Result;

const MAX_KEYWORDS: usize = 20;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "이", "그", "저", "것", "수", "등", "및",
    "에", "를", "을", "의", "가",
];

/// A chunk plus signals derived from it and from its source document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedChunk {
    #[serde(flatten)]
    pub chunk: TextChunk,
    /// Whether the source document has any tables, not this chunk.
    pub has_tables: bool,
    pub has_images: bool,
    pub has_formulas: bool,
    pub keywords: Vec<String>,
}

pub struct RagGenerator {
    strategy: ChunkStrategy,
}

impl RagGenerator {
    pub fn new(strategy: ChunkStrategy) -> Self {
        Self { strategy }
    }

    pub fn generate_chunks(&self, document: &Document) -> Result<Vec<EnrichedChunk>> {
        info!("Generating RAG chunks from processed document");
        if document.text.is_empty() {
            warn!("No text found in document");
            return Ok(Vec::new());
        }

        let metadata = Arc::new(document.metadata.clone());
        let chunks: Vec<EnrichedChunk> = self
            .strategy
            .chunk(&document.text, metadata)?
            .into_iter()
            .map(|chunk| enrich(chunk, document))
            .collect();

        info!("Generated {} RAG chunks", chunks.len());
        Ok(chunks)
    }
}

fn enrich(chunk: TextChunk, document: &Document) -> EnrichedChunk {
    let keywords = extract_keywords(&chunk.text);
    EnrichedChunk {
        chunk,
        has_tables: !document.tables.is_empty(),
        has_images: !document.images.is_empty(),
        has_formulas: !document.formulas.is_empty(),
        keywords,
    }
}

/// The most frequent lower-cased tokens longer than two characters that are
/// not stopwords. Equal counts keep first-occurrence order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for word in lowered.split_whitespace() {
        if word.chars().count() <= 2 || STOPWORDS.contains(&word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    // Stable sort, so ties stay in first-occurrence order.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}
