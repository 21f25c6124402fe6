//! Workbook and CSV extraction.
//!
//! Every sheet becomes one record table and one bannered text rendering;
//! a CSV file is a workbook with the single implicit sheet `Sheet1`.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::NaiveDateTime;
use log::info;
use serde_json::Value;

use super::frame::{Cell, Frame};
use super::{Document, Source, Table, TableData};
use crate::error::{Error, Result};

const CSV_SHEET: &str = "Sheet1";

pub fn extract(source: &Source) -> Result<Document> {
    let buffer = source.read()?;
    if source.extension == ".csv" {
        extract_csv(source, &buffer)
    } else {
        extract_workbook(source, buffer)
    }
}

fn extract_csv(source: &Source, buffer: &[u8]) -> Result<Document> {
    let frame = Frame::from_grid(read_csv(&source.name, buffer)?);

    let mut metadata = source.file_metadata();
    metadata.insert("file_type".into(), Value::from("csv"));
    metadata.insert("shape".into(), shape_value(frame.shape()));
    metadata.insert("columns".into(), Value::from(frame.columns().to_vec()));

    Ok(Document {
        text: banner(CSV_SHEET, &frame),
        tables: vec![frame_table(0, CSV_SHEET, &frame)],
        metadata,
        ..Default::default()
    })
}

fn extract_workbook(source: &Source, buffer: Vec<u8>) -> Result<Document> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(buffer)).map_err(|e| Error::corrupt(&source.name, e))?;

    let sheet_names = workbook.sheet_names();
    let mut tables = Vec::with_capacity(sheet_names.len());
    let mut sections = Vec::with_capacity(sheet_names.len());
    for name in &sheet_names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| Error::corrupt(&source.name, format!("sheet '{}': {}", name, e)))?;
        let frame = Frame::from_grid(range_grid(&range));
        sections.push(banner(name, &frame));
        tables.push(frame_table(tables.len(), name, &frame));
    }
    info!("Excel processing complete: {} sheets", tables.len());

    let mut metadata = source.file_metadata();
    metadata.insert("file_type".into(), Value::from("xlsx/xls"));
    metadata.insert("sheet_names".into(), Value::from(sheet_names.clone()));
    metadata.insert("total_sheets".into(), Value::from(sheet_names.len()));

    Ok(Document {
        text: sections.join("\n\n"),
        tables,
        metadata,
        ..Default::default()
    })
}

fn banner(sheet: &str, frame: &Frame) -> String {
    format!("=== {} ===\n{}", sheet, frame.render())
}

fn frame_table(index: usize, sheet: &str, frame: &Frame) -> Table {
    Table {
        sheet_name: Some(sheet.to_string()),
        data: Some(TableData::Records(frame.records())),
        shape: Some(frame.shape()),
        columns: Some(frame.columns().to_vec()),
        dtypes: Some(frame.dtypes()),
        ..Table::new(index)
    }
}

fn shape_value((rows, columns): (usize, usize)) -> Value {
    Value::from(vec![rows, columns])
}

fn read_csv(name: &str, buffer: &[u8]) -> Result<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(buffer);
    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::corrupt(name, e))?;
        grid.push(record.iter().map(Cell::infer).collect());
    }
    Ok(grid)
}

/// Sheet cells as a grid anchored at column A, so a sheet whose data starts
/// further right keeps its leading unnamed columns.
fn range_grid(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    range
        .rows()
        .map(|row| {
            std::iter::repeat(Cell::Empty)
                .take(offset)
                .chain(row.iter().map(sheet_cell))
                .collect()
        })
        .collect()
}

fn sheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(v) => Cell::Int(*v),
        // Whole numbers are stored as floats but read back as integers.
        Data::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Cell::Int(*v as i64),
        Data::Float(v) => Cell::Float(*v),
        Data::Bool(v) => Cell::Bool(*v),
        Data::String(v) if v.is_empty() => Cell::Empty,
        Data::String(v) => Cell::Text(v.clone()),
        // Honours the workbook's 1900 or 1904 date system.
        Data::DateTime(v) if v.is_datetime() => match v.as_datetime() {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Float(v.as_f64()),
        },
        Data::DateTime(v) => Cell::Float(v.as_f64()),
        Data::DateTimeIso(v) => NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f")
            .map(Cell::DateTime)
            .unwrap_or_else(|_| Cell::Text(v.clone())),
        Data::DurationIso(v) => Cell::Text(v.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
