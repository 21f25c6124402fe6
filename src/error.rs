//! Error types for document extraction and chunking.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// No extractor is registered for the file extension.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// An external tool or parser needed for this input is missing.
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The document container could not be opened or parsed.
    #[error("Failed to parse '{name}': {message}")]
    CorruptInput { name: String, message: String },

    #[error("'{0}' is not valid UTF-8")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The text-recognition collaborator ran but did not produce text.
    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn corrupt(name: impl Into<String>, message: impl ToString) -> Self {
        Self::CorruptInput {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// A secondary sub-extraction that failed while the primary text succeeded.
///
/// Never returned to callers; it is logged and the affected field keeps its
/// default value.
#[derive(Error, Debug)]
#[error("partial extraction ({stage}): {source}")]
pub struct PartialExtraction {
    pub stage: &'static str,
    #[source]
    pub source: Error,
}
