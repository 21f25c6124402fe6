pub mod chunk;
pub mod docx;
pub mod excel;
mod frame;
mod markup;
pub mod model;
pub mod ocr;
mod package;
pub mod pdf;
pub mod pptx;
pub mod text;

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::Value;

use crate::error::{Error, PartialExtraction, Result};
pub use model::{Document, ImageRef, Metadata, Table, TableData, TableFormat};
use ocr::OcrSettings;

/// Extractor variant selected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pdf,
    Docx,
    Excel,
    Pptx,
    Text,
}

const FORMATS: &[(&str, Format)] = &[
    (".pdf", Format::Pdf),
    (".docx", Format::Docx),
    (".doc", Format::Docx),
    (".xlsx", Format::Excel),
    (".xls", Format::Excel),
    (".csv", Format::Excel),
    (".pptx", Format::Pptx),
    (".ppt", Format::Pptx),
    (".txt", Format::Text),
    (".md", Format::Text),
    (".rst", Format::Text),
];

impl Format {
    /// Look up the extractor for a dotted extension such as `.pdf`.
    pub fn from_extension(extension: &str) -> Result<Self> {
        let extension = extension.to_lowercase();
        FORMATS
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, format)| *format)
            .ok_or(Error::UnsupportedFormat(extension))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Excel => "Excel",
            Self::Pptx => "PPTX",
            Self::Text => "text",
        }
    }
}

/// A file on disk plus the name it should be treated as.
///
/// Uploads usually sit under opaque temp names, so the caller may supply the
/// original file name; its extension then drives dispatch.
#[derive(Debug, Clone)]
pub struct Source {
    pub path: PathBuf,
    pub name: String,
    /// Lower-cased, dot-prefixed, empty when the name has none.
    pub extension: String,
}

impl Source {
    pub fn new(path: &Path, original_name: Option<&str>) -> Self {
        let name = match original_name.filter(|name| !name.is_empty()) {
            Some(name) => Path::new(name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_string()),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let extension = Path::new(&name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            name,
            extension,
        }
    }

    pub fn format(&self) -> Result<Format> {
        Format::from_extension(&self.extension)
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// `file_size` and `file_name`, the keys every extractor reports.
    pub fn file_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        match fs::metadata(&self.path) {
            Ok(stat) => {
                metadata.insert("file_size".into(), Value::from(stat.len()));
            }
            Err(err) => warn!(
                "{}",
                PartialExtraction {
                    stage: "file size",
                    source: err.into(),
                }
            ),
        }
        metadata.insert("file_name".into(), Value::from(self.name.clone()));
        metadata
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub ocr: OcrSettings,
}

/// Route a file to its extractor and produce the canonical document.
pub fn process_document(
    path: &Path,
    original_name: Option<&str>,
    options: &ExtractOptions,
) -> Result<Document> {
    let source = Source::new(path, original_name);
    let format = source.format()?;
    info!("Processing {}: {}", format.as_str(), source.path.display());

    let document = match format {
        Format::Pdf => {
            let engine = ocr::engine_from_settings(&options.ocr);
            pdf::extract(&source, engine.as_deref(), options.ocr.min_chars)?
        }
        Format::Docx => docx::extract(&source)?,
        Format::Excel => excel::extract(&source)?,
        Format::Pptx => pptx::extract(&source)?,
        Format::Text => text::extract(&source)?,
    };

    info!(
        "{} processing complete: {} chars, {} tables",
        format.as_str(),
        document.text.chars().count(),
        document.tables.len()
    );
    Ok(document)
}

/// Unwrap a secondary sub-extraction, logging and defaulting on failure.
pub(crate) fn or_partial<T: Default>(stage: &'static str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(source) => {
            warn!("{}", PartialExtraction { stage, source });
            T::default()
        }
    }
}
