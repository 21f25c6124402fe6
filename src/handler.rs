use std::path::PathBuf;

use clap::Parser;

use crate::Config;

mod chunk;
mod extract;

#[derive(Parser)]
#[command(name = "docnorm")]
#[command(about = "Normalize documents and split them into RAG chunks", version = "1.0")]
pub enum Cli {
    /// Extract a document and print it as JSON
    Extract {
        #[arg(help = "Path of the file to process")]
        path: PathBuf,

        #[arg(help = "Original file name, used for format detection")]
        original_name: Option<String>,

        #[arg(long, help = "Skip OCR on sparse PDF pages")]
        no_ocr: bool,
    },

    /// Read a JSON document from stdin and print its chunks as JSON
    Chunk {
        #[arg(short, long, help = "fixed, semantic or sentence")]
        strategy: Option<String>,

        #[arg(long, help = "Words per fixed-size chunk")]
        chunk_size: Option<usize>,

        #[arg(long, help = "Words shared by consecutive fixed-size chunks")]
        chunk_overlap: Option<usize>,

        #[arg(long, help = "Advertised lower bound for semantic chunks")]
        min_chunk_size: Option<usize>,

        #[arg(long, help = "Characters per semantic chunk")]
        max_chunk_size: Option<usize>,

        #[arg(long, help = "Sentences per sentence chunk")]
        sentences_per_chunk: Option<usize>,

        #[arg(long, help = "Sentences shared by consecutive sentence chunks")]
        overlap_sentences: Option<usize>,
    },
}

/// Where a command reports its error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStream {
    Stdout,
    Stderr,
}

impl Cli {
    pub fn error_stream(&self) -> ErrorStream {
        match self {
            Cli::Extract { .. } => ErrorStream::Stdout,
            Cli::Chunk { .. } => ErrorStream::Stderr,
        }
    }
}

pub fn handler(args: Cli, config: &Config) -> anyhow::Result<()> {
    match args {
        Cli::Extract {
            path,
            original_name,
            no_ocr,
        } => {
            let mut options = config.extract_options();
            if no_ocr {
                options.ocr.enabled = false;
            }
            extract::extract_document(&path, original_name.as_deref(), &options)
        }
        Cli::Chunk {
            strategy,
            chunk_size,
            chunk_overlap,
            min_chunk_size,
            max_chunk_size,
            sentences_per_chunk,
            overlap_sentences,
        } => {
            let mut settings = config.chunk_settings();
            let overrides = [
                (&mut settings.chunk_size, chunk_size),
                (&mut settings.chunk_overlap, chunk_overlap),
                (&mut settings.min_chunk_size, min_chunk_size),
                (&mut settings.max_chunk_size, max_chunk_size),
                (&mut settings.sentences_per_chunk, sentences_per_chunk),
                (&mut settings.overlap_sentences, overlap_sentences),
            ];
            for (field, value) in overrides {
                if let Some(value) = value {
                    *field = value;
                }
            }
            let strategy = strategy.as_deref().unwrap_or(config.chunk_strategy());
            chunk::chunk_document(strategy, &settings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from(["docnorm", "extract", "/tmp/abc123", "report.docx"]).unwrap();
        assert_eq!(cli.error_stream(), ErrorStream::Stdout);
        match cli {
            Cli::Extract {
                path,
                original_name,
                no_ocr,
            } => {
                assert_eq!(path, PathBuf::from("/tmp/abc123"));
                assert_eq!(original_name.as_deref(), Some("report.docx"));
                assert!(!no_ocr);
            }
            Cli::Chunk { .. } => panic!("expected extract"),
        }
    }

    #[test]
    fn test_parse_chunk_overrides() {
        let cli = Cli::try_parse_from([
            "docnorm",
            "chunk",
            "--strategy",
            "fixed",
            "--chunk-size",
            "64",
            "--chunk-overlap",
            "8",
        ])
        .unwrap();
        assert_eq!(cli.error_stream(), ErrorStream::Stderr);
        let Cli::Chunk {
            strategy,
            chunk_size,
            chunk_overlap,
            max_chunk_size,
            ..
        } = cli
        else {
            panic!("expected chunk");
        };
        assert_eq!(strategy.as_deref(), Some("fixed"));
        assert_eq!(chunk_size, Some(64));
        assert_eq!(chunk_overlap, Some(8));
        assert_eq!(max_chunk_size, None);
    }
}
