use std::io::Write;

use clap::error::ErrorKind;
use clap::Parser;
use dotenv::dotenv;
use handler::{Cli, ErrorStream};
use serde::{Deserialize, Serialize};

use document::chunk::ChunkSettings;
use document::ocr::OcrSettings;
use document::ExtractOptions;

mod document;
mod error;
mod handler;
mod rag;

fn main() {
    dotenv().ok();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => exit_with_error(ErrorStream::Stdout, &anyhow::Error::from(err)),
    };
    let stream = args.error_stream();

    let config = match read_config() {
        Ok(config) => config,
        Err(err) => exit_with_error(stream, &err),
    };
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    env_logger::Builder::from_env(env).init();

    if let Err(err) = handler::handler(args, &config) {
        log::debug!("command failed: {:?}", err);
        exit_with_error(stream, &err);
    }
}

/// Report `err` as a `{"error": ...}` envelope and exit with status 1.
fn exit_with_error(stream: ErrorStream, err: &anyhow::Error) -> ! {
    let envelope = serde_json::json!({ "error": format!("{:#}", err) });
    let _ = match stream {
        ErrorStream::Stdout => writeln!(std::io::stdout(), "{}", envelope),
        ErrorStream::Stderr => writeln!(std::io::stderr(), "{}", envelope),
    };
    std::process::exit(1)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    // Logging
    log_level: String,

    // Chunk
    chunk_strategy: String,
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
    max_chunk_size: usize,
    sentences_per_chunk: usize,
    overlap_sentences: usize,

    // OCR
    ocr_enabled: bool,
    ocr_languages: String,
    ocr_dpi: u32,
    ocr_min_chars: usize,
}

impl Config {
    pub fn chunk_settings(&self) -> ChunkSettings {
        ChunkSettings {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            min_chunk_size: self.min_chunk_size,
            max_chunk_size: self.max_chunk_size,
            sentences_per_chunk: self.sentences_per_chunk,
            overlap_sentences: self.overlap_sentences,
        }
    }

    pub fn chunk_strategy(&self) -> &str {
        &self.chunk_strategy
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            ocr: OcrSettings {
                enabled: self.ocr_enabled,
                languages: self.ocr_languages.clone(),
                dpi: self.ocr_dpi,
                min_chars: self.ocr_min_chars,
            },
        }
    }
}

/// Defaults, then an optional `config.toml`, then `DOCNORM_*` variables.
fn read_config() -> anyhow::Result<Config> {
    Ok(config::Config::builder()
        .set_default("log_level", "warn")?
        .set_default("chunk_strategy", "semantic")?
        .set_default("chunk_size", 512i64)?
        .set_default("chunk_overlap", 128i64)?
        .set_default("min_chunk_size", 200i64)?
        .set_default("max_chunk_size", 500i64)?
        .set_default("sentences_per_chunk", 5i64)?
        .set_default("overlap_sentences", 1i64)?
        .set_default("ocr_enabled", true)?
        .set_default("ocr_languages", "kor+eng")?
        .set_default("ocr_dpi", 300i64)?
        .set_default("ocr_min_chars", 50i64)?
        .add_source(config::File::with_name("config").required(false))
        .add_source(config::Environment::with_prefix("DOCNORM"))
        .build()?
        .try_deserialize::<Config>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config() -> anyhow::Result<()> {
        let config = read_config()?;
        assert!(!config.log_level.is_empty());
        assert!(config.chunk_overlap < config.chunk_size);
        assert!(config.sentences_per_chunk > config.overlap_sentences);
        Ok(())
    }

    #[test]
    fn test_settings_follow_config() -> anyhow::Result<()> {
        let config = read_config()?;
        let chunk = config.chunk_settings();
        assert_eq!(chunk.max_chunk_size, config.max_chunk_size);
        assert_eq!(chunk.min_chunk_size, config.min_chunk_size);

        let options = config.extract_options();
        assert_eq!(options.ocr.enabled, config.ocr_enabled);
        assert_eq!(options.ocr.languages, config.ocr_languages);
        assert_eq!(options.ocr.min_chars, config.ocr_min_chars);
        Ok(())
    }
}
