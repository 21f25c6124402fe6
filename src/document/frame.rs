//! A small typed table: header row plus cells, with per-column type
//! inference, record export and an aligned plain-text rendering.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde_json::Value;

use super::Metadata;

/// Floats are printed with at most this many decimals.
const MAX_PRECISION: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    /// Type a raw delimited-text field the way a CSV reader would.
    pub(crate) fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Cell::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return if value.is_nan() {
                Cell::Empty
            } else {
                Cell::Float(value)
            };
        }
        match trimmed {
            "True" | "TRUE" | "true" => Cell::Bool(true),
            "False" | "FALSE" | "false" => Cell::Bool(false),
            _ => Cell::Text(raw.to_string()),
        }
    }

    fn header_name(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) => Some(format_float(*v)),
            Cell::Bool(v) => Some(python_bool(*v).to_string()),
            Cell::DateTime(v) => Some(format_datetime(v)),
            Cell::Text(v) if v.trim().is_empty() => None,
            Cell::Text(v) => Some(v.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dtype {
    Int64,
    Float64,
    Bool,
    DateTime,
    Object,
}

impl Dtype {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Dtype::Int64 => "int64",
            Dtype::Float64 => "float64",
            Dtype::Bool => "bool",
            Dtype::DateTime => "datetime64[ns]",
            Dtype::Object => "object",
        }
    }

    /// Missing values force integer columns to float and booleans to object;
    /// an all-missing column is float.
    fn infer<'a>(cells: impl Iterator<Item = &'a Cell>) -> Self {
        let (mut ints, mut floats, mut bools, mut dates, mut others, mut empties) =
            (0, 0, 0, 0, 0, 0);
        for cell in cells {
            match cell {
                Cell::Empty => empties += 1,
                Cell::Int(_) => ints += 1,
                Cell::Float(_) => floats += 1,
                Cell::Bool(_) => bools += 1,
                Cell::DateTime(_) => dates += 1,
                Cell::Text(_) => others += 1,
            }
        }
        let filled = ints + floats + bools + dates + others;
        if filled == 0 {
            Dtype::Float64
        } else if ints == filled {
            if empties > 0 {
                Dtype::Float64
            } else {
                Dtype::Int64
            }
        } else if ints + floats == filled {
            Dtype::Float64
        } else if bools == filled && empties == 0 {
            Dtype::Bool
        } else if dates == filled {
            Dtype::DateTime
        } else {
            Dtype::Object
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    columns: Vec<String>,
    dtypes: Vec<Dtype>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Build a frame whose first grid row is the header.
    ///
    /// Blank header cells are named `Unnamed: <i>`; repeated names get a
    /// `.1`, `.2`, ... suffix. Ragged rows are padded with empty cells.
    pub(crate) fn from_grid(grid: Vec<Vec<Cell>>) -> Self {
        let mut grid = grid.into_iter();
        let header = grid.next().unwrap_or_default();
        let mut rows: Vec<Vec<Cell>> = grid.collect();

        let width = rows.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
        let columns = dedupe_names(
            (0..width)
                .map(|i| {
                    header
                        .get(i)
                        .and_then(Cell::header_name)
                        .unwrap_or_else(|| format!("Unnamed: {}", i))
                })
                .collect(),
        );
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        let dtypes = (0..width)
            .map(|i| Dtype::infer(rows.iter().map(|row| &row[i])))
            .collect();

        Self {
            columns,
            dtypes,
            rows,
        }
    }

    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `(rows, columns)`, header excluded.
    pub(crate) fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub(crate) fn dtypes(&self) -> Metadata {
        self.columns
            .iter()
            .zip(&self.dtypes)
            .map(|(name, dtype)| (name.clone(), Value::from(dtype.as_str())))
            .collect()
    }

    /// One column-name to value mapping per row; missing values are null.
    pub(crate) fn records(&self) -> Vec<Metadata> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(&self.dtypes)
                    .zip(row)
                    .map(|((name, dtype), cell)| (name.clone(), json_value(cell, *dtype)))
                    .collect()
            })
            .collect()
    }

    /// Right-aligned columns separated by two spaces, prefixed by a
    /// left-aligned row index.
    pub(crate) fn render(&self) -> String {
        if self.rows.is_empty() || self.columns.is_empty() {
            return format!(
                "Empty DataFrame\nColumns: [{}]\nIndex: []",
                self.columns.join(", ")
            );
        }

        let index: Vec<String> = (0..self.rows.len()).map(|i| i.to_string()).collect();
        let index_width = index.iter().map(|s| s.chars().count()).max().unwrap_or(0);

        let rendered: Vec<Vec<String>> = self
            .dtypes
            .iter()
            .enumerate()
            .map(|(col, dtype)| render_column(self.rows.iter().map(|row| &row[col]), *dtype))
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .zip(&rendered)
            .map(|(name, values)| {
                values
                    .iter()
                    .map(|v| v.chars().count())
                    .chain([name.chars().count()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        let mut header = " ".repeat(index_width);
        for (name, width) in self.columns.iter().zip(&widths) {
            header.push_str(&format!("  {:>width$}", name, width = width));
        }
        lines.push(header);

        for (row, label) in index.iter().enumerate() {
            let mut line = format!("{:<width$}", label, width = index_width);
            for (values, width) in rendered.iter().zip(&widths) {
                line.push_str(&format!("  {:>width$}", values[row], width = width));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Repeated names get a `.N` suffix; a suffixed name that is itself taken
/// is suffixed again, so `a, a, a.1` becomes `a, a.1, a.1.1`.
fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|mut name| {
            let mut count = seen.get(&name).copied().unwrap_or(0);
            while count > 0 {
                seen.insert(name.clone(), count + 1);
                name = format!("{}.{}", name, count);
                count = seen.get(&name).copied().unwrap_or(0);
            }
            seen.insert(name.clone(), 1);
            name
        })
        .collect()
}

fn json_value(cell: &Cell, dtype: Dtype) -> Value {
    match (cell, dtype) {
        (Cell::Empty, _) => Value::Null,
        (Cell::Int(v), Dtype::Float64) => Value::from(*v as f64),
        (Cell::Int(v), _) => Value::from(*v),
        // Non-finite floats have no JSON form and become null.
        (Cell::Float(v), _) => Value::from(*v),
        (Cell::Bool(v), _) => Value::from(*v),
        (Cell::DateTime(v), _) => Value::from(format_datetime(v)),
        (Cell::Text(v), _) => Value::from(v.as_str()),
    }
}

fn render_column<'a>(cells: impl Iterator<Item = &'a Cell>, dtype: Dtype) -> Vec<String> {
    let cells: Vec<&Cell> = cells.collect();
    let precision = match dtype {
        Dtype::Float64 => cells
            .iter()
            .filter_map(|cell| match cell {
                Cell::Float(v) if v.is_finite() => Some(decimals(*v)),
                _ => None,
            })
            .max()
            .unwrap_or(1)
            .clamp(1, MAX_PRECISION),
        _ => 0,
    };
    cells
        .into_iter()
        .map(|cell| match (cell, dtype) {
            (Cell::Empty, Dtype::DateTime) => "NaT".to_string(),
            (Cell::Empty, _) => "NaN".to_string(),
            (Cell::Int(v), Dtype::Float64) => format!("{:.*}", precision, *v as f64),
            (Cell::Int(v), _) => v.to_string(),
            (Cell::Float(v), Dtype::Float64) if v.is_finite() => format!("{:.*}", precision, v),
            (Cell::Float(v), _) => format_float(*v),
            (Cell::Bool(v), _) => python_bool(*v).to_string(),
            (Cell::DateTime(v), _) => format_datetime(v),
            (Cell::Text(v), _) => v.clone(),
        })
        .collect()
}

/// Decimal places in the shortest round-trip form of `value`.
fn decimals(value: f64) -> usize {
    let repr = value.to_string();
    repr.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0)
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn format_datetime(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
