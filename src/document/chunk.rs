use std::sync::Arc;

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::Metadata;
use crate::error::{Error, Result};

/// Sentence terminator plus the whitespace that separates it from the next one.
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence break pattern"));

/// One retrieval-sized slice of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    pub char_count: usize,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence_count: Option<usize>,
    /// The source document's metadata, shared by every chunk.
    pub metadata: Arc<Metadata>,
}

impl TextChunk {
    /// Counts are always derived from `text`.
    pub fn new(text: String, chunk_index: usize, metadata: Arc<Metadata>) -> Self {
        Self {
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            text,
            chunk_index,
            sentence_count: None,
            metadata,
        }
    }
}

/// Chunking parameters for every strategy, as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub sentences_per_chunk: usize,
    pub overlap_sentences: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 128,
            min_chunk_size: 200,
            max_chunk_size: 500,
            sentences_per_chunk: 5,
            overlap_sentences: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Windows of `chunk_size` words advancing by `chunk_size - overlap`.
    FixedSize { chunk_size: usize, overlap: usize },
    /// Blank-line paragraphs packed up to `max_chunk_size` characters.
    ///
    /// `min_chunk_size` is carried for callers but does not bound chunk size.
    Semantic {
        min_chunk_size: usize,
        max_chunk_size: usize,
    },
    /// Windows of sentences, strided like `FixedSize`.
    Sentence {
        sentences_per_chunk: usize,
        overlap_sentences: usize,
    },
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        let settings = ChunkSettings::default();
        ChunkStrategy::Semantic {
            min_chunk_size: settings.min_chunk_size,
            max_chunk_size: settings.max_chunk_size,
        }
    }
}

impl ChunkStrategy {
    /// Resolve `fixed`, `semantic` or `sentence` against the settings.
    pub fn from_name(name: &str, settings: &ChunkSettings) -> Result<Self> {
        let strategy = match name {
            "fixed" => ChunkStrategy::FixedSize {
                chunk_size: settings.chunk_size,
                overlap: settings.chunk_overlap,
            },
            "semantic" => ChunkStrategy::Semantic {
                min_chunk_size: settings.min_chunk_size,
                max_chunk_size: settings.max_chunk_size,
            },
            "sentence" => ChunkStrategy::Sentence {
                sentences_per_chunk: settings.sentences_per_chunk,
                overlap_sentences: settings.overlap_sentences,
            },
            other => {
                return Err(Error::configuration(format!(
                    "Unknown chunking strategy: {}",
                    other
                )))
            }
        };
        strategy.validate()?;
        Ok(strategy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChunkStrategy::FixedSize { .. } => "fixed",
            ChunkStrategy::Semantic { .. } => "semantic",
            ChunkStrategy::Sentence { .. } => "sentence",
        }
    }

    /// Windowed strategies need a positive stride.
    pub fn validate(&self) -> Result<()> {
        match *self {
            ChunkStrategy::FixedSize {
                chunk_size,
                overlap,
            } => check_window("chunk_size", chunk_size, "chunk_overlap", overlap),
            ChunkStrategy::Sentence {
                sentences_per_chunk,
                overlap_sentences,
            } => check_window(
                "sentences_per_chunk",
                sentences_per_chunk,
                "overlap_sentences",
                overlap_sentences,
            ),
            ChunkStrategy::Semantic { max_chunk_size, .. } if max_chunk_size == 0 => {
                Err(Error::configuration("max_chunk_size must be positive"))
            }
            ChunkStrategy::Semantic { .. } => Ok(()),
        }
    }

    pub fn chunk(&self, text: &str, metadata: Arc<Metadata>) -> Result<Vec<TextChunk>> {
        self.validate()?;
        let chunks = match *self {
            ChunkStrategy::FixedSize {
                chunk_size,
                overlap,
            } => {
                let words: Vec<&str> = text.split_whitespace().collect();
                windows(&words, chunk_size, chunk_size - overlap)
                    .enumerate()
                    .map(|(index, window)| TextChunk::new(window.join(" "), index, metadata.clone()))
                    .collect::<Vec<_>>()
            }
            ChunkStrategy::Semantic { max_chunk_size, .. } => {
                pack_paragraphs(text, max_chunk_size)
                    .into_iter()
                    .enumerate()
                    .map(|(index, text)| TextChunk::new(text, index, metadata.clone()))
                    .collect()
            }
            ChunkStrategy::Sentence {
                sentences_per_chunk,
                overlap_sentences,
            } => {
                let sentences = split_sentences(text);
                windows(&sentences, sentences_per_chunk, sentences_per_chunk - overlap_sentences)
                    .enumerate()
                    .map(|(index, window)| TextChunk {
                        sentence_count: Some(window.len()),
                        ..TextChunk::new(window.join(" "), index, metadata.clone())
                    })
                    .collect()
            }
        };
        info!("Created {} {} chunks", chunks.len(), self.name());
        Ok(chunks)
    }
}

fn check_window(size_name: &str, size: usize, overlap_name: &str, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::configuration(format!("{} must be positive", size_name)));
    }
    if overlap >= size {
        return Err(Error::configuration(format!(
            "{} ({}) must be smaller than {} ({})",
            overlap_name, overlap, size_name, size
        )));
    }
    Ok(())
}

/// Windows of up to `size` items starting every `stride` items; the last ones
/// may be shorter.
fn windows<'a, T>(items: &'a [T], size: usize, stride: usize) -> impl Iterator<Item = &'a [T]> {
    (0..items.len())
        .step_by(stride)
        .map(move |start| &items[start..items.len().min(start + size)])
}

/// Greedily join stripped paragraphs with a blank line, starting a new chunk
/// before a paragraph that would push the running length past `max_chars`.
/// The running length counts paragraph characters only, not separators.
fn pack_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let len = paragraph.chars().count();
        if !current.is_empty() && current_len + len > max_chars {
            chunks.push(current.join("\n\n"));
            current.clear();
            current_len = 0;
        }
        current.push(paragraph);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }
    chunks
}

/// Sentences end at `.`, `!` or `?` followed by whitespace; the terminator
/// stays with its sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for found in SENTENCE_BREAK.find_iter(text) {
        sentences.push(&text[start..found.start() + 1]);
        start = found.end();
    }
    sentences.push(&text[start..]);
    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn meta() -> Arc<Metadata> {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".into(), Value::from("a.txt"));
        Arc::new(metadata)
    }

    fn fixed(chunk_size: usize, overlap: usize) -> ChunkStrategy {
        ChunkStrategy::FixedSize {
            chunk_size,
            overlap,
        }
    }

    #[test]
    fn test_fixed_windows_cover_every_word() -> anyhow::Result<()> {
        let text = (0..23).map(|i| format!("w{}", i)).collect::<Vec<_>>().join("  \n");
        let source: Vec<&str> = text.split_whitespace().collect();
        let (n, k) = (6, 2);

        let chunks = fixed(n, k).chunk(&text, meta())?;

        let indexes: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, (0..chunks.len()).collect::<Vec<_>>());
        let rebuilt: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.text.split(' ').take(n - k))
            .collect();
        assert_eq!(rebuilt, source);
        assert_eq!(chunks[0].word_count, 6);
        assert_eq!(chunks.last().map(|c| c.word_count), Some(3));
        assert!(chunks.iter().all(|c| c.char_count == c.text.chars().count()));
        Ok(())
    }

    #[test]
    fn test_invalid_windows_are_rejected() {
        for strategy in [
            fixed(4, 4),
            fixed(0, 0),
            ChunkStrategy::Sentence {
                sentences_per_chunk: 2,
                overlap_sentences: 3,
            },
        ] {
            let err = strategy.chunk("some words here", meta()).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{:?}", strategy);
        }
    }

    #[test]
    fn test_semantic_packs_paragraphs() -> anyhow::Result<()> {
        let text = "alpha beta\n\n\n\n  gamma  \n\ndelta epsilon zeta\n\nomega";
        let strategy = ChunkStrategy::Semantic {
            min_chunk_size: 200,
            max_chunk_size: 16,
        };

        let chunks = strategy.chunk(text, meta())?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["alpha beta\n\ngamma", "delta epsilon zeta", "omega"]);
        let rejoined = texts.join("\n\n");
        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        assert_eq!(rejoined, paragraphs.join("\n\n"));
        assert!(chunks.iter().all(|c| c.sentence_count.is_none()));
        assert!(chunks.iter().all(|c| c.char_count == c.text.chars().count()));
        Ok(())
    }

    #[test]
    fn test_semantic_oversized_paragraph_stays_whole() {
        let long = "x".repeat(40);
        let chunks = pack_paragraphs(&format!("short\n\n{}\n\ntail", long), 10);
        assert_eq!(chunks, ["short", long.as_str(), "tail"]);
    }

    #[test]
    fn test_sentence_windows() -> anyhow::Result<()> {
        let text = "One. Two!  Three?\nFour. Five";
        let strategy = ChunkStrategy::Sentence {
            sentences_per_chunk: 2,
            overlap_sentences: 1,
        };

        let chunks = strategy.chunk(text, meta())?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            ["One. Two!", "Two! Three?", "Three? Four.", "Four. Five", "Five"]
        );
        assert_eq!(chunks[0].sentence_count, Some(2));
        assert_eq!(chunks[4].sentence_count, Some(1));
        Ok(())
    }

    #[test]
    fn test_split_sentences_keeps_decimals() {
        assert_eq!(split_sentences("Pi is 3.14 today. Yes"), ["Pi is 3.14 today.", "Yes"]);
    }

    #[test]
    fn test_from_name() {
        let settings = ChunkSettings::default();
        assert_eq!(
            ChunkStrategy::from_name("fixed", &settings).unwrap(),
            fixed(512, 128)
        );
        assert_eq!(
            ChunkStrategy::from_name("semantic", &settings).unwrap(),
            ChunkStrategy::default()
        );
        let err = ChunkStrategy::from_name("paragraph", &settings).unwrap_err();
        assert!(err.to_string().contains("Unknown chunking strategy: paragraph"));
    }

    #[test]
    fn test_metadata_is_shared() -> anyhow::Result<()> {
        let metadata = meta();
        let chunks = fixed(2, 0).chunk("a b c d", metadata.clone())?;
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| Arc::ptr_eq(&c.metadata, &metadata)));

        let json = serde_json::to_value(&chunks[0])?;
        assert_eq!(json["metadata"]["file_name"], "a.txt");
        assert!(json.get("sentence_count").is_none());
        Ok(())
    }
}
