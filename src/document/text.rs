use log::info;
use serde_json::Value;

use super::{markup, Document, Metadata, Source};
use crate::error::{Error, Result};

/// Plain, Markdown and reStructuredText files. The content passes through
/// verbatim; markup files also yield tables, formulas and headings.
pub fn extract(source: &Source) -> Result<Document> {
    let bytes = source.read()?;
    let content = String::from_utf8(bytes).map_err(|_| Error::Decode(source.name.clone()))?;

    let (tables, formulas) = match source.extension.as_str() {
        ".md" => (markup::markdown_tables(&content), markup::latex_formulas(&content)),
        ".rst" => (markup::rst_tables(&content), markup::latex_formulas(&content)),
        _ => (Vec::new(), Vec::new()),
    };
    if !tables.is_empty() {
        info!("Extracted {} tables", tables.len());
    }

    let metadata = text_metadata(source, &content);
    Ok(Document {
        text: content,
        tables,
        formulas,
        metadata,
        ..Default::default()
    })
}

fn text_metadata(source: &Source, content: &str) -> Metadata {
    let mut metadata = source.file_metadata();
    let file_type = source.extension.trim_start_matches('.');
    metadata.insert("file_type".into(), Value::from(file_type));
    metadata.insert("lines".into(), Value::from(content.split('\n').count()));
    metadata.insert("characters".into(), Value::from(content.chars().count()));
    metadata.insert("words".into(), Value::from(content.split_whitespace().count()));

    match source.extension.as_str() {
        ".md" => {
            metadata.insert("headings".into(), Value::from(markup::markdown_headings(content)));
            let frontmatter = markup::frontmatter_lines(content);
            metadata.insert("has_frontmatter".into(), Value::from(frontmatter.is_some()));
            if let Some(lines) = frontmatter {
                metadata.insert("frontmatter_lines".into(), Value::from(lines));
            }
        }
        ".rst" => {
            metadata.insert("headings".into(), Value::from(markup::rst_headings(content)));
        }
        _ => {}
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{TableData, TableFormat};
    use std::path::{Path, PathBuf};

    fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_markdown_document() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let content = "# T\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";
        let path = write(dir.path(), "upload.tmp", content.as_bytes());

        let doc = extract(&Source::new(&path, Some("notes.md")))?;

        assert_eq!(doc.text, content);
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].headers, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(
            doc.tables[0].data,
            Some(TableData::Rows(vec![vec!["1".to_string(), "2".to_string()]]))
        );
        assert_eq!(doc.metadata["headings"], serde_json::json!(["T"]));
        assert_eq!(doc.metadata["file_type"], "md");
        assert_eq!(doc.metadata["lines"], 6);
        assert_eq!(doc.metadata["words"], 13);
        assert_eq!(doc.metadata["has_frontmatter"], false);
        assert!(doc.metadata.get("frontmatter_lines").is_none());
        Ok(())
    }

    #[test]
    fn test_rst_document() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let content = "Guide\n=====\n\n+---+\n| x |\n+---+\n\nInline :math: \\(x^2\\)\n";
        let path = write(dir.path(), "guide.rst", content.as_bytes());

        let doc = extract(&Source::new(&path, None))?;

        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].format, Some(TableFormat::Rst));
        assert_eq!(doc.formulas, ["\\(x^2\\)"]);
        assert_eq!(doc.metadata["headings"], serde_json::json!(["Guide"]));
        assert_eq!(doc.metadata["file_name"], "guide.rst");
        Ok(())
    }

    #[test]
    fn test_plain_text_skips_markup_scanning() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let content = "# not a heading here\n| a | b |\n|---|---|\n| 1 | 2 |\n$x$\n";
        let path = write(dir.path(), "a.txt", content.as_bytes());

        let doc = extract(&Source::new(&path, None))?;

        assert_eq!(doc.text, content);
        assert!(doc.tables.is_empty());
        assert!(doc.formulas.is_empty());
        assert!(doc.metadata.get("headings").is_none());
        assert_eq!(doc.metadata["characters"], content.chars().count());
        Ok(())
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.txt", &[0x66, 0x6f, 0xff, 0xfe]);

        let err = extract(&Source::new(&path, None)).unwrap_err();
        assert!(matches!(err, Error::Decode(ref name) if name == "bad.txt"));
    }
}
