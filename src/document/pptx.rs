//! PowerPoint extraction.
//!
//! Each slide part is parsed into a small read-only shape list, which is then
//! walked in slide order to produce the outline text and the table collection.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};

use log::info;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use zip::ZipArchive;

use super::package::{self, local_attr, prefixed_attr};
use super::{or_partial, Document, Source, Table};
use crate::error::{Error, Result};

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";
const SLIDE_PREFIX: &str = "ppt/slides/slide";

#[derive(Debug, Default, Clone, PartialEq)]
struct OutlineParagraph {
    level: usize,
    text: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Text(Vec<OutlineParagraph>),
    Table { rows: Vec<Vec<String>>, columns: usize },
}

#[derive(Debug, Default)]
struct Slide {
    shapes: Vec<Shape>,
}

#[derive(Debug, Default)]
struct SlideSize {
    width: Option<i64>,
    height: Option<i64>,
}

pub fn extract(source: &Source) -> Result<Document> {
    let file = File::open(&source.path)?;
    let mut archive = package::open(&source.name, BufReader::new(file))?;

    let slide_parts = slide_order(&mut archive)?;
    let mut slides = Vec::with_capacity(slide_parts.len());
    for part in &slide_parts {
        let xml = package::read_part(&mut archive, part)?
            .ok_or_else(|| Error::corrupt(&source.name, format!("missing slide part {}", part)))?;
        slides.push(parse_slide(part, &xml)?);
    }

    let text = render_slides(&slides);
    let tables = collect_tables(&slides);
    info!("Extracted {} tables", tables.len());

    let mut metadata = source.file_metadata();
    metadata.insert("total_slides".into(), Value::from(slides.len()));
    metadata.insert("total_tables".into(), Value::from(tables.len()));
    let size = or_partial("slide size", slide_size(&mut archive));
    if let (Some(width), Some(height)) = (size.width, size.height) {
        metadata.insert("slide_width".into(), Value::from(width));
        metadata.insert("slide_height".into(), Value::from(height));
    }
    metadata.extend(or_partial("core properties", package::core_properties(&mut archive)));

    Ok(Document {
        text,
        tables,
        metadata,
        ..Default::default()
    })
}

/// `# Slide N`, then one `- ` line per non-empty shape paragraph indented two
/// spaces per outline level, then a blank line.
fn render_slides(slides: &[Slide]) -> String {
    let mut lines = Vec::new();
    for (index, slide) in slides.iter().enumerate() {
        lines.push(format!("# Slide {}", index + 1));
        for shape in &slide.shapes {
            let Shape::Text(paragraphs) = shape else {
                continue;
            };
            for paragraph in paragraphs {
                let text = paragraph.text.trim();
                if !text.is_empty() {
                    lines.push(format!("{}- {}", "  ".repeat(paragraph.level), text));
                }
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

fn collect_tables(slides: &[Slide]) -> Vec<Table> {
    let mut tables = Vec::new();
    for (index, slide) in slides.iter().enumerate() {
        for shape in &slide.shapes {
            if let Shape::Table { rows, columns } = shape {
                let mut table = Table::from_rows(tables.len(), rows.clone(), *columns);
                table.slide = Some(index + 1);
                tables.push(table);
            }
        }
    }
    tables
}

/// Slide parts in the order the presentation declares them, falling back to
/// the numeric order of the slide file names.
fn slide_order<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let declared = match (
        package::read_part(archive, PRESENTATION_PART)?,
        package::read_part(archive, PRESENTATION_RELS)?,
    ) {
        (Some(presentation), Some(rels)) => declared_slides(&presentation, &rels)?,
        _ => Vec::new(),
    };
    if !declared.is_empty() {
        return Ok(declared);
    }

    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter(|name| name.starts_with(SLIDE_PREFIX) && name.ends_with(".xml"))
        .filter_map(|name| {
            name[SLIDE_PREFIX.len()..name.len() - 4]
                .parse::<u32>()
                .ok()
                .map(|number| (number, name.to_string()))
        })
        .collect();
    parts.sort();
    Ok(parts.into_iter().map(|(_, name)| name).collect())
}

fn declared_slides(presentation: &str, rels: &str) -> Result<Vec<String>> {
    let mut targets = HashMap::new();
    for_each_element(PRESENTATION_RELS, rels, |element| {
        if element.local_name().as_ref() == b"Relationship" {
            if let (Some(id), Some(target)) =
                (local_attr(element, b"Id"), local_attr(element, b"Target"))
            {
                targets.insert(id, target);
            }
        }
    })?;

    let mut slides = Vec::new();
    for_each_element(PRESENTATION_PART, presentation, |element| {
        if element.local_name().as_ref() == b"sldId" {
            if let Some(target) = prefixed_attr(element, b"id").and_then(|id| targets.get(&id)) {
                slides.push(resolve_target(target));
            }
        }
    })?;
    Ok(slides)
}

/// Relationship targets are relative to `ppt/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

fn slide_size<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<SlideSize> {
    let mut size = SlideSize::default();
    if let Some(xml) = package::read_part(archive, PRESENTATION_PART)? {
        for_each_element(PRESENTATION_PART, &xml, |element| {
            if element.local_name().as_ref() == b"sldSz" {
                size.width = local_attr(element, b"cx").and_then(|v| v.parse().ok());
                size.height = local_attr(element, b"cy").and_then(|v| v.parse().ok());
            }
        })?;
    }
    Ok(size)
}

fn for_each_element(part: &str, xml: &str, mut visit: impl FnMut(&BytesStart)) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => visit(&e),
            Ok(Event::Eof) => return Ok(()),
            Err(err) => return Err(Error::corrupt(part, err)),
            _ => {}
        }
    }
}

/// Parse the top-level shapes of one slide.
///
/// Grouped shapes are skipped, matching how a slide's shape list exposes a
/// group as a single shape without text.
fn parse_slide(part: &str, xml: &str) -> Result<Slide> {
    let mut reader = Reader::from_str(xml);
    let mut slide = Slide::default();

    let mut group_depth = 0usize;
    let mut paragraphs: Option<Vec<OutlineParagraph>> = None;
    let mut table: Option<(Vec<Vec<String>>, usize)> = None;
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<String> = None;
    let mut paragraph: Option<OutlineParagraph> = None;
    let mut in_text = false;

    loop {
        let event = reader.read_event().map_err(|e| Error::corrupt(part, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"grpSp" if !is_empty => group_depth += 1,
                    _ if group_depth > 0 => {}
                    b"sp" if !is_empty => paragraphs = Some(Vec::new()),
                    b"tbl" if !is_empty => table = Some((Vec::new(), 0)),
                    b"gridCol" => {
                        if let Some((_, columns)) = table.as_mut() {
                            *columns += 1;
                        }
                    }
                    b"tr" if table.is_some() => row = Vec::new(),
                    b"tc" if table.is_some() => {
                        cell = Some(String::new());
                        if is_empty {
                            row.push(String::new());
                            cell = None;
                        }
                    }
                    b"p" if paragraphs.is_some() || cell.is_some() => {
                        let current = OutlineParagraph::default();
                        if is_empty {
                            close_paragraph(current, &mut paragraphs, &mut cell);
                        } else {
                            paragraph = Some(current);
                        }
                    }
                    b"pPr" => {
                        if let Some(current) = paragraph.as_mut() {
                            current.level = local_attr(e, b"lvl")
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0);
                        }
                    }
                    b"t" if !is_empty && paragraph.is_some() => in_text = true,
                    b"br" => {
                        if let Some(current) = paragraph.as_mut() {
                            current.text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) if in_text => {
                let text = e.unescape().map_err(|err| Error::corrupt(part, err))?;
                if let Some(current) = paragraph.as_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"grpSp" if group_depth > 0 => group_depth -= 1,
                _ if group_depth > 0 => {}
                b"t" => in_text = false,
                b"p" => {
                    if let Some(current) = paragraph.take() {
                        close_paragraph(current, &mut paragraphs, &mut cell);
                    }
                }
                b"tc" => {
                    if let Some(text) = cell.take() {
                        row.push(text);
                    }
                }
                b"tr" => {
                    if let Some((rows, _)) = table.as_mut() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                b"tbl" => {
                    if let Some((rows, columns)) = table.take() {
                        slide.shapes.push(Shape::Table { rows, columns });
                    }
                }
                b"sp" => {
                    if let Some(shape) = paragraphs.take() {
                        slide.shapes.push(Shape::Text(shape));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(slide)
}

/// A finished paragraph belongs to the open table cell if there is one,
/// otherwise to the open text shape.
fn close_paragraph(
    paragraph: OutlineParagraph,
    paragraphs: &mut Option<Vec<OutlineParagraph>>,
    cell: &mut Option<String>,
) {
    if let Some(cell) = cell.as_mut() {
        cell.push_str(&paragraph.text);
    } else if let Some(shape) = paragraphs.as_mut() {
        shape.push(paragraph);
    }
}
