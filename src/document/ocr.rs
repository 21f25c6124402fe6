//! Page-level text recognition for scanned PDF pages.
//!
//! The recognizer is an external collaborator: the page is rendered with
//! `pdftoppm` and read back with `tesseract`. Both run as blocking child
//! processes; nothing here enforces a timeout.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{Command, Output};

use log::{debug, info};
use crate::error::{Error, Result};

/// Recognizes the text of a single PDF page.
pub trait OcrEngine {
    /// `page_number` is 1-based.
    fn recognize_page(&self, pdf: &Path, page_number: usize) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub enabled: bool,
    /// Tesseract language spec, e.g. `kor+eng`.
    pub languages: String,
    pub dpi: u32,
    /// Pages whose stripped native text is shorter than this are recognized.
    pub min_chars: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: "kor+eng".to_string(),
            dpi: 300,
            min_chars: 50,
        }
    }
}

pub fn engine_from_settings(settings: &OcrSettings) -> Option<Box<dyn OcrEngine>> {
    if !settings.enabled {
        debug!("OCR disabled by configuration");
        return None;
    }
    Some(Box::new(TesseractOcr::new(settings)))
}

pub struct TesseractOcr {
    languages: String,
    dpi: u32,
    page_segmentation: u8,
}

impl TesseractOcr {
    pub fn new(settings: &OcrSettings) -> Self {
        Self {
            languages: settings.languages.clone(),
            dpi: settings.dpi,
            page_segmentation: 3,
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_page(&self, pdf: &Path, page_number: usize) -> Result<String> {
        // Removed on drop, including every early return below.
        let scratch = tempfile::tempdir()?;
        let prefix = scratch.path().join("page");
        let page = page_number.to_string();
        let dpi = self.dpi.to_string();

        let rendered = run("pdftoppm", &render_args(pdf, &page, &dpi, &prefix))?;
        if !rendered.status.success() {
            return Err(Error::Ocr(format!(
                "pdftoppm could not render page {}: {}",
                page_number,
                String::from_utf8_lossy(&rendered.stderr).trim()
            )));
        }

        let image = prefix.with_extension("png");
        if !image.exists() {
            return Err(Error::Ocr(format!("no image rendered for page {}", page_number)));
        }

        let psm = self.page_segmentation.to_string();
        let recognized = run(
            "tesseract",
            &[
                image.as_os_str(),
                OsStr::new("stdout"),
                OsStr::new("-l"),
                OsStr::new(&self.languages),
                OsStr::new("--psm"),
                OsStr::new(&psm),
            ],
        )?;
        if !recognized.status.success() {
            return Err(Error::Ocr(format!(
                "tesseract failed on page {}: {}",
                page_number,
                String::from_utf8_lossy(&recognized.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&recognized.stdout).trim().to_string();
        info!("OCR extracted {} chars from page {}", text.chars().count(), page_number);
        Ok(text)
    }
}

fn render_args<'a>(pdf: &'a Path, page: &'a str, dpi: &'a str, prefix: &'a Path) -> [&'a OsStr; 10] {
    [
        OsStr::new("-png"),
        OsStr::new("-r"),
        OsStr::new(dpi),
        OsStr::new("-f"),
        OsStr::new(page),
        OsStr::new("-l"),
        OsStr::new(page),
        OsStr::new("-singlefile"),
        pdf.as_os_str(),
        prefix.as_os_str(),
    ]
}

fn run(program: &str, args: &[&OsStr]) -> Result<Output> {
    Command::new(program).args(args).output().map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Error::DependencyUnavailable(format!("{} not found on PATH", program))
        } else {
            err.into()
        }
    })
}
