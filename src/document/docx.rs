use std::collections::HashMap;
use std::io::Cursor;

use docx_rs::{
    read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild, Style, Table as DocxTable,
    TableCellContent, TableChild, TableRowChild,
};
use log::info;
use serde_json::Value;

use super::{or_partial, package, Document, Metadata, Source, Table};
use crate::error::{Error, Result};

const TABLE_MARKER: &str = "[TABLE]";

/// One top-level body element, in document order.
enum Block<'a> {
    Paragraph(&'a Paragraph),
    Table(&'a DocxTable),
}

pub fn extract(source: &Source) -> Result<Document> {
    let buffer = source.read()?;
    let docx = read_docx(&buffer).map_err(|e| Error::corrupt(&source.name, e))?;

    let blocks: Vec<Block> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(Block::Paragraph(p)),
            DocumentChild::Table(t) => Some(Block::Table(t)),
            _ => None,
        })
        .collect();

    let styles = style_names(&docx.styles.styles);
    let text = render_body(&blocks, &styles);
    let tables = extract_tables(&blocks);
    info!("Extracted {} tables", tables.len());

    let mut metadata = source.file_metadata();
    let paragraphs = blocks.iter().filter(|b| matches!(b, Block::Paragraph(_))).count();
    metadata.insert("total_paragraphs".into(), Value::from(paragraphs));
    metadata.insert("total_tables".into(), Value::from(tables.len()));
    metadata.extend(or_partial("core properties", read_core_properties(source, &buffer)));

    Ok(Document {
        text,
        tables,
        metadata,
        ..Default::default()
    })
}

/// Headings become `#` lines, tables become a placeholder, blank paragraphs
/// are dropped; blocks are separated by an empty line.
fn render_body(blocks: &[Block], styles: &HashMap<&str, String>) -> String {
    let mut parts = Vec::new();
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                let text = paragraph_text(p);
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let style = p
                    .property
                    .style
                    .as_ref()
                    .map(|s| styles.get(s.val.as_str()).map_or(s.val.as_str(), String::as_str));
                match style {
                    Some(style) if is_heading(style) => {
                        parts.push(format!("{} {}", "#".repeat(heading_level(style)), text));
                    }
                    _ => parts.push(text.to_string()),
                }
            }
            Block::Table(_) => parts.push(TABLE_MARKER.to_string()),
        }
    }
    parts.join("\n\n")
}

/// Style display names keyed by style id. Localized documents use ids such
/// as `1` for a style named `heading 1`.
fn style_names(styles: &[Style]) -> HashMap<&str, String> {
    styles
        .iter()
        .filter_map(|style| match serde_json::to_value(&style.name) {
            Ok(Value::String(name)) if !name.is_empty() => Some((style.style_id.as_str(), name)),
            _ => None,
        })
        .collect()
}

fn extract_tables(blocks: &[Block]) -> Vec<Table> {
    blocks
        .iter()
        .filter_map(|block| match block {
            Block::Table(t) => Some(*t),
            Block::Paragraph(_) => None,
        })
        .enumerate()
        .map(|(index, table)| {
            let rows: Vec<Vec<String>> = table.rows.iter().filter_map(row_cells).collect();
            let columns = if table.grid.is_empty() {
                rows.iter().map(Vec::len).max().unwrap_or(0)
            } else {
                table.grid.len()
            };
            Table::from_rows(index, rows, columns)
        })
        .collect()
}

#[allow(irrefutable_let_patterns)]
fn row_cells(child: &TableChild) -> Option<Vec<String>> {
    let TableChild::TableRow(row) = child else {
        return None;
    };
    let cells = row
        .cells
        .iter()
        .filter_map(|cell| {
            let TableRowChild::TableCell(cell) = cell else {
                return None;
            };
            // Cell text is every paragraph concatenated without a separator.
            Some(
                cell.children
                    .iter()
                    .filter_map(|content| match content {
                        TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                        _ => None,
                    })
                    .collect::<String>(),
            )
        })
        .collect();
    Some(cells)
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_children(&paragraph.children, &mut text);
    text
}

fn push_children(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for node in &run.children {
                    match node {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_children(&link.children, text),
            _ => {}
        }
    }
}

fn is_heading(style: &str) -> bool {
    style.to_lowercase().contains("heading")
}

/// Trailing numeral of the style name (`Heading2` -> 2), 1 when there is none.
fn heading_level(style: &str) -> usize {
    let digits: String = style
        .trim_end()
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse::<usize>().ok().filter(|level| *level > 0).unwrap_or(1)
}

fn read_core_properties(source: &Source, buffer: &[u8]) -> Result<Metadata> {
    let mut archive = package::open(&source.name, Cursor::new(buffer))?;
    package::core_properties(&mut archive)
}
