use std::io::{self, Read, Write};

use crate::document::chunk::{ChunkSettings, ChunkStrategy};
use crate::document::Document;
use crate::rag::RagGenerator;

pub fn chunk_document(strategy: &str, settings: &ChunkSettings) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    write_chunks(&mut stdin.lock(), &mut stdout.lock(), strategy, settings)
}

fn write_chunks<R: Read, W: Write>(
    input: &mut R,
    out: &mut W,
    strategy: &str,
    settings: &ChunkSettings,
) -> anyhow::Result<()> {
    let strategy = ChunkStrategy::from_name(strategy, settings)?;
    let document: Document = serde_json::from_reader(input)?;

    let chunks = RagGenerator::new(strategy).generate_chunks(&document)?;
    serde_json::to_writer(&mut *out, &chunks)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::Value;

    fn run(input: &str, strategy: &str) -> anyhow::Result<Value> {
        let mut out = Vec::new();
        write_chunks(
            &mut input.as_bytes(),
            &mut out,
            strategy,
            &ChunkSettings::default(),
        )?;
        Ok(serde_json::from_slice(&out)?)
    }

    #[test]
    fn test_chunks_document_from_json() -> anyhow::Result<()> {
        let input = r#"{"text": "First paragraph here.\n\nSecond one.", "tables": [{"id": "table_000"}],
                        "metadata": {"file_name": "a.md"}}"#;

        let chunks = run(input, "semantic")?;

        let chunks = chunks.as_array().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0]["text"], "First paragraph here.\n\nSecond one.");
        assert_eq!(chunks[0]["has_tables"], true);
        assert_eq!(chunks[0]["has_formulas"], false);
        assert_eq!(chunks[0]["metadata"]["file_name"], "a.md");
        Ok(())
    }

    #[test]
    fn test_missing_collections_default_to_empty() -> anyhow::Result<()> {
        assert_eq!(run(r#"{"text": ""}"#, "sentence")?, serde_json::json!([]));
        Ok(())
    }

    #[test]
    fn test_unknown_strategy_is_configuration_error() {
        let err = run(r#"{"text": "x"}"#, "paragraph").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Configuration(_))));
    }

    #[test]
    fn test_malformed_input_fails() {
        assert!(run("not json", "semantic").is_err());
    }
}
