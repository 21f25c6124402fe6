use std::path::Path;

use log::{error, info, warn};
use lopdf::{Dictionary, Object};
use serde_json::Value;

use super::ocr::OcrEngine;
use super::{or_partial, Document, Metadata, Source};
use crate::error::{Error, Result};

const INFO_KEYS: &[(&str, &[u8])] = &[
    ("title", b"Title"),
    ("author", b"Author"),
    ("subject", b"Subject"),
    ("keywords", b"Keywords"),
    ("creator", b"Creator"),
    ("producer", b"Producer"),
    ("creationDate", b"CreationDate"),
    ("modDate", b"ModDate"),
    ("trapped", b"Trapped"),
];

/// Page text joined with 1-based page markers.
#[derive(Debug, Default)]
pub struct PageText {
    pub text: String,
    pub formulas: Vec<String>,
    pub ocr_pages: usize,
}

pub fn extract(source: &Source, ocr: Option<&dyn OcrEngine>, min_chars: usize) -> Result<Document> {
    let bytes = source.read()?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| Error::corrupt(&source.name, e))?;
    let assembled = assemble_pages(&source.path, pages, ocr, min_chars);

    let mut metadata = Metadata::new();
    metadata.insert("ocr_used".into(), Value::from(assembled.ocr_pages > 0));
    metadata.insert("ocr_pages".into(), Value::from(assembled.ocr_pages));
    metadata.extend(source.file_metadata());
    metadata.extend(or_partial("pdf metadata", read_metadata(&source.name, &bytes)));

    if assembled.ocr_pages > 0 {
        info!("OCR was used on {} pages", assembled.ocr_pages);
    }

    Ok(Document {
        text: assembled.text,
        formulas: assembled.formulas,
        metadata,
        ..Default::default()
    })
}

/// Join native page text, substituting OCR output for pages that look scanned.
///
/// A page is recognized when its stripped native text is shorter than
/// `min_chars`. Recognition failures only affect their own page, which keeps
/// its native text. A missing OCR toolchain turns recognition off for the
/// remaining pages.
pub fn assemble_pages(
    pdf: &Path,
    pages: Vec<String>,
    ocr: Option<&dyn OcrEngine>,
    min_chars: usize,
) -> PageText {
    let mut ocr = ocr;
    let mut parts = Vec::with_capacity(pages.len());
    let mut formulas = Vec::new();
    let mut ocr_pages = 0;

    for (index, mut text) in pages.into_iter().enumerate() {
        let page_number = index + 1;

        if text.trim().chars().count() < min_chars {
            if let Some(engine) = ocr {
                info!("Page {} has minimal text, using OCR", page_number);
                match engine.recognize_page(pdf, page_number) {
                    Ok(recognized) if !recognized.is_empty() => {
                        text = recognized;
                        ocr_pages += 1;
                    }
                    Ok(_) => warn!("OCR found no text on page {}", page_number),
                    Err(Error::DependencyUnavailable(what)) => {
                        warn!("OCR unavailable, skipping remaining pages: {}", what);
                        ocr = None;
                    }
                    Err(err) => error!("OCR failed for page {}: {}", page_number, err),
                }
            }
        }

        formulas.extend(detect_formulas(&text));
        parts.push(format!("--- Page {} ---\n{}", page_number, text));
    }

    PageText {
        text: parts.join("\n"),
        formulas,
        ocr_pages,
    }
}

// Formula detection on rendered PDF text is not implemented yet.
fn detect_formulas(_page_text: &str) -> Vec<String> {
    Vec::new()
}

fn read_metadata(name: &str, bytes: &[u8]) -> Result<Metadata> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|e| Error::corrupt(name, e))?;
    let encrypt = pdf
        .trailer
        .get(b"Encrypt")
        .ok()
        .and_then(|object| resolve_dictionary(&pdf, object));
    let is_encrypted = pdf.trailer.get(b"Encrypt").is_ok();

    let mut info = Metadata::new();
    info.insert("format".into(), Value::from(format!("PDF {}", pdf.version)));
    let dictionary = pdf
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|object| resolve_dictionary(&pdf, object));
    for (key, pdf_key) in INFO_KEYS {
        let value = dictionary
            .and_then(|dict| dict.get(pdf_key).ok())
            .map(object_text)
            .unwrap_or_default();
        info.insert((*key).into(), Value::from(value));
    }
    let encryption = match (is_encrypted, encrypt) {
        (false, _) => Value::Null,
        (true, Some(dict)) => dict
            .get(b"Filter")
            .map(object_text)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from("encrypted")),
        (true, None) => Value::from("encrypted"),
    };
    info.insert("encryption".into(), encryption);

    let mut metadata = Metadata::new();
    metadata.insert("total_pages".into(), Value::from(pdf.get_pages().len()));
    metadata.insert("metadata".into(), Value::Object(info));
    metadata.insert("is_encrypted".into(), Value::from(is_encrypted));
    Ok(metadata)
}

fn resolve_dictionary<'a>(pdf: &'a lopdf::Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => pdf.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn object_text(object: &Object) -> String {
    match object {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
        Object::Boolean(flag) => flag.to_string(),
        _ => String::new(),
    }
}

/// Text strings are UTF-16BE when they carry a byte-order mark, otherwise
/// PDFDocEncoding, which agrees with Latin-1 for printable characters.
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}
