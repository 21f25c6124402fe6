use std::io::{self, Write};
use std::path::Path;

use log::info;

use crate::document::{process_document, ExtractOptions};

pub fn extract_document(
    path: &Path,
    original_name: Option<&str>,
    options: &ExtractOptions,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    write_document(&mut stdout.lock(), path, original_name, options)
}

fn write_document<W: Write>(
    out: &mut W,
    path: &Path,
    original_name: Option<&str>,
    options: &ExtractOptions,
) -> anyhow::Result<()> {
    let document = process_document(path, original_name, options)?;
    serde_json::to_writer(&mut *out, &document)?;
    writeln!(out)?;
    info!("Wrote document with {} tables", document.tables.len());
    Ok(())
}
