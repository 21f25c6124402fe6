//! Helpers for Office Open XML packages (zip containers of XML parts).

use std::io::{Read, Seek};

use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use zip::result::ZipError;
use zip::ZipArchive;

use super::Metadata;
use crate::error::{Error, Result};

const CORE_PART: &str = "docProps/core.xml";

pub(crate) fn open<R: Read + Seek>(name: &str, reader: R) -> Result<ZipArchive<R>> {
    ZipArchive::new(reader).map_err(|e| Error::corrupt(name, e))
}

/// Read an XML part, `None` when the package does not contain it.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<Option<String>> {
    match archive.by_name(part) {
        Ok(mut file) => {
            let mut xml = String::new();
            file.read_to_string(&mut xml)?;
            Ok(Some(xml))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(Error::corrupt(part, err)),
    }
}

/// Value of the attribute whose local name (prefix ignored) is `local`.
pub(crate) fn local_attr(element: &BytesStart, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local && attr.key.prefix().is_none())
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Value of a namespaced attribute such as `r:id`, matched on local name.
pub(crate) fn prefixed_attr(element: &BytesStart, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local && attr.key.prefix().is_some())
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Title, author, subject and dates from the package core properties.
///
/// Only properties that are present and non-empty are reported.
pub(crate) fn core_properties<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    let Some(xml) = read_part(archive, CORE_PART)? else {
        return Ok(metadata);
    };

    let mut reader = Reader::from_str(&xml);
    let mut current: Option<&'static str> = None;
    let mut found: Vec<(&'static str, String)> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = match e.local_name().as_ref() {
                    b"title" => Some("title"),
                    b"creator" => Some("author"),
                    b"subject" => Some("subject"),
                    b"created" => Some("created"),
                    b"modified" => Some("modified"),
                    _ => None,
                };
            }
            Ok(Event::Text(e)) => {
                if let Some(key) = current {
                    let text = e.unescape().map_err(|err| Error::corrupt(CORE_PART, err))?;
                    found.push((key, text.trim().to_string()));
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(err) => return Err(Error::corrupt(CORE_PART, err)),
            _ => {}
        }
    }

    for key in ["title", "author", "subject", "created", "modified"] {
        let value = found
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .collect::<String>();
        if value.is_empty() {
            continue;
        }
        let value = match key {
            "created" | "modified" => format_timestamp(&value),
            _ => value,
        };
        metadata.insert(key.to_string(), Value::from(value));
    }
    Ok(metadata)
}

/// `2024-03-01T09:30:00Z` becomes `2024-03-01 09:30:00+00:00`.
fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%:z").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Build an in-memory zip package from `(part name, contents)` pairs.
    pub(crate) fn build_package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    pub(crate) const CORE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <dc:title>Roadmap &amp; Plan</dc:title>
  <dc:subject></dc:subject>
  <dc:creator>Kim</dc:creator>
  <dcterms:created xsi:type="dcterms:W3CDTF">2024-03-01T09:30:00Z</dcterms:created>
  <dcterms:modified xsi:type="dcterms:W3CDTF">not-a-date</dcterms:modified>
</cp:coreProperties>"#;

    #[test]
    fn test_core_properties() {
        let bytes = build_package(&[(CORE_PART, CORE_XML)]);
        let mut archive = open("deck.pptx", Cursor::new(bytes)).unwrap();
        let props = core_properties(&mut archive).unwrap();

        assert_eq!(props["title"], "Roadmap & Plan");
        assert_eq!(props["author"], "Kim");
        assert!(props.get("subject").is_none());
        assert_eq!(props["created"], "2024-03-01 09:30:00+00:00");
        assert_eq!(props["modified"], "not-a-date");
    }

    #[test]
    fn test_missing_core_part_is_empty() {
        let bytes = build_package(&[("word/document.xml", "<w:document/>")]);
        let mut archive = open("a.docx", Cursor::new(bytes)).unwrap();
        assert!(core_properties(&mut archive).unwrap().is_empty());
        assert!(read_part(&mut archive, "missing.xml").unwrap().is_none());
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let err = open("a.docx", Cursor::new(b"plain text".to_vec())).unwrap_err();
        assert!(matches!(err, Error::CorruptInput { .. }));
    }
}
