use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RowShapeError, RowShapeKind};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d/%m/%y"];
const DELIMITER_CANDIDATES: [char; 4] = [',', ';', '\t', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    Float,
    Date,
    Text,
}

impl ColumnType {
    /// Narrowest type able to hold values of both `self` and `other`.
    pub fn widen(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            _ => Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            Cell::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Converts raw cell text into `ty`. `None` means the text does not fit.
    pub fn parse_as(raw: &str, ty: ColumnType) -> Option<Cell> {
        if raw.is_empty() {
            return Some(Cell::Empty);
        }
        match ty {
            ColumnType::Int => raw.parse::<i64>().ok().map(Cell::Int),
            ColumnType::Float => parse_number(raw).map(Cell::Float),
            ColumnType::Date => parse_date(raw).map(Cell::Date),
            ColumnType::Text => Some(Cell::Text(raw.to_string())),
        }
    }

    /// Re-expresses an already typed cell in a wider column type.
    pub fn coerce(self, ty: ColumnType) -> Cell {
        match (self, ty) {
            (Cell::Empty, _) => Cell::Empty,
            (Cell::Int(v), ColumnType::Float) => Cell::Float(v as f64),
            (cell @ Cell::Int(_), ColumnType::Int)
            | (cell @ Cell::Float(_), ColumnType::Float)
            | (cell @ Cell::Date(_), ColumnType::Date)
            | (cell @ Cell::Text(_), ColumnType::Text) => cell,
            (cell, _) => Cell::Text(cell.to_string()),
        }
    }

    pub fn fits(&self, ty: ColumnType) -> bool {
        matches!(
            (self, ty),
            (Cell::Empty, _)
                | (Cell::Int(_), ColumnType::Int)
                | (Cell::Float(_), ColumnType::Float)
                | (Cell::Date(_), ColumnType::Date)
                | (Cell::Text(_), ColumnType::Text)
        )
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(v) => write!(f, "{v}"),
            // Keep a decimal point so whole floats read back as floats.
            Cell::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// Rows sharing one typed schema. Every row has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive lookup of a column position.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let want = name.trim();
        self.columns
            .iter()
            .position(|c| c.name.trim().eq_ignore_ascii_case(want))
    }

    pub fn row(&self, index: usize) -> Option<RowRef<'_>> {
        (index < self.rows.len()).then_some(RowRef { table: self, index })
    }

    pub fn rows(&self) -> impl DoubleEndedIterator<Item = RowRef<'_>> + ExactSizeIterator {
        (0..self.rows.len()).map(move |index| RowRef { table: self, index })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.cells.get(col)
    }

    /// Appends a row, rejecting it if its shape or cell types break the schema.
    pub fn push_row(&mut self, cells: Vec<Cell>) -> Result<(), RowShapeKind> {
        if cells.len() != self.columns.len() {
            return Err(RowShapeKind::FieldCount {
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        for (cell, column) in cells.iter().zip(&self.columns) {
            if !cell.fits(column.ty) {
                return Err(RowShapeKind::BadCell {
                    column: column.name.clone(),
                    value: cell.to_string(),
                });
            }
        }
        self.rows.push(Row { cells });
        Ok(())
    }
}

#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> RowRef<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cells(&self) -> &'a [Cell] {
        &self.table.rows[self.index].cells
    }

    pub fn cell(&self, column: usize) -> Option<&'a Cell> {
        self.cells().get(column)
    }

    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        self.cell(self.table.column_index(column)?)
    }
}

impl fmt::Debug for RowRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowRef")
            .field("index", &self.index)
            .field("cells", &self.cells())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub delimiter: char,
    /// Column types fixed up front, keyed by header name (case-insensitive).
    /// Columns not listed here are inferred from their values.
    pub declared_types: HashMap<String, ColumnType>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            declared_types: HashMap::new(),
        }
    }
}

impl ParseOptions {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn declare(mut self, column: &str, ty: ColumnType) -> Self {
        self.declared_types.insert(column.trim().to_ascii_lowercase(), ty);
        self
    }

    fn declared(&self, column: &str) -> Option<ColumnType> {
        self.declared_types
            .get(&column.trim().to_ascii_lowercase())
            .copied()
    }
}

#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub table: Table,
    pub skipped: Vec<RowShapeError>,
}

pub fn parse_csv(text: &str) -> ParseOutcome {
    parse(text, &ParseOptions::default())
}

pub fn parse(text: &str, opts: &ParseOptions) -> ParseOutcome {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text
        .split('\n')
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.strip_suffix('\r').unwrap_or(line)))
        .filter(|(_, line)| !line.trim().is_empty());

    let mut skipped = Vec::new();

    let Some((header_line, header_raw)) = lines.next() else {
        return ParseOutcome {
            table: Table::default(),
            skipped,
        };
    };
    let headers = match split_line(header_raw, opts.delimiter) {
        Ok(fields) => fields,
        Err(kind) => {
            let err = RowShapeError {
                line: header_line,
                kind,
            };
            warn!(%err, "csv header is malformed");
            skipped.push(err);
            return ParseOutcome {
                table: Table::default(),
                skipped,
            };
        }
    };

    let mut raw_rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (line_no, line) in lines {
        let shaped = split_line(line, opts.delimiter).and_then(|fields| {
            if fields.len() == headers.len() {
                Ok(fields)
            } else {
                Err(RowShapeKind::FieldCount {
                    expected: headers.len(),
                    found: fields.len(),
                })
            }
        });
        match shaped {
            Ok(fields) => raw_rows.push((line_no, fields)),
            Err(kind) => {
                let err = RowShapeError {
                    line: line_no,
                    kind,
                };
                warn!(%err, "skipping malformed csv line");
                skipped.push(err);
            }
        }
    }

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| Column {
            name: name.clone(),
            ty: opts
                .declared(name)
                .unwrap_or_else(|| infer_type(raw_rows.iter().map(|(_, f)| f[idx].as_str()))),
        })
        .collect();

    let mut table = Table::new(columns);
    'rows: for (line_no, fields) in raw_rows {
        let mut cells = Vec::with_capacity(fields.len());
        for (raw, column) in fields.iter().zip(table.columns()) {
            match Cell::parse_as(raw, column.ty) {
                Some(cell) => cells.push(cell),
                None => {
                    let err = RowShapeError {
                        line: line_no,
                        kind: RowShapeKind::BadCell {
                            column: column.name.clone(),
                            value: raw.clone(),
                        },
                    };
                    warn!(%err, "skipping csv line with mistyped cell");
                    skipped.push(err);
                    continue 'rows;
                }
            }
        }
        if let Err(kind) = table.push_row(cells) {
            skipped.push(RowShapeError {
                line: line_no,
                kind,
            });
        }
    }

    skipped.sort_by_key(|e| e.line);
    debug!(
        rows = table.len(),
        columns = table.columns().len(),
        skipped = skipped.len(),
        "parsed csv"
    );
    ParseOutcome { table, skipped }
}

pub fn read_csv_file(path: &Path, opts: &ParseOptions) -> Result<ParseOutcome> {
    let raw = fs::read_to_string(path).with_context(|| format!("read csv {}", path.display()))?;
    Ok(parse(&raw, opts))
}

/// Renders a table back to comma-separated text with a header line.
pub fn write_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .context("write csv header")?;
    for row in table.rows() {
        writer
            .write_record(row.cells().iter().map(|c| c.to_string()))
            .with_context(|| format!("write csv row {}", row.index()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("flush csv writer: {}", e.error()))?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

/// Picks the delimiter whose per-line count is highest and most consistent.
pub fn detect_delimiter(text: &str) -> char {
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();
    if sample.is_empty() {
        return ',';
    }

    let mut best = ',';
    let mut best_score = 0.0_f64;
    for &delimiter in &DELIMITER_CANDIDATES {
        let counts: Vec<f64> = sample
            .iter()
            .map(|line| line.chars().filter(|&c| c == delimiter).count() as f64)
            .collect();
        let avg = counts.iter().sum::<f64>() / counts.len() as f64;
        let variance =
            counts.iter().map(|c| (c - avg).powi(2)).sum::<f64>() / counts.len() as f64;
        let score = avg / (1.0 + variance.sqrt());
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }
    best
}

fn split_line(line: &str, delimiter: char) -> Result<Vec<String>, RowShapeKind> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars
            .peek()
            .is_some_and(|&c| c != delimiter && c.is_whitespace())
        {
            chars.next();
        }

        if chars.peek() == Some(&'"') {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c != '"' {
                    value.push(c);
                } else if chars.peek() == Some(&'"') {
                    chars.next();
                    value.push('"');
                } else {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(RowShapeKind::UnterminatedQuote);
            }
            loop {
                match chars.next() {
                    None => {
                        fields.push(value);
                        return Ok(fields);
                    }
                    Some(c) if c == delimiter => {
                        fields.push(value);
                        break;
                    }
                    Some(c) if c.is_whitespace() => {}
                    Some(_) => {
                        return Err(RowShapeKind::TextAfterQuote {
                            field: fields.len(),
                        });
                    }
                }
            }
        } else {
            let mut value = String::new();
            let mut hit_delimiter = false;
            for c in chars.by_ref() {
                if c == delimiter {
                    hit_delimiter = true;
                    break;
                }
                value.push(c);
            }
            fields.push(value.trim().to_string());
            if !hit_delimiter {
                return Ok(fields);
            }
        }
    }
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut ty: Option<ColumnType> = None;
    for raw in values.filter(|v| !v.is_empty()) {
        let cell_ty = if raw.parse::<i64>().is_ok() {
            ColumnType::Int
        } else if parse_number(raw).is_some() {
            ColumnType::Float
        } else if parse_date(raw).is_some() {
            ColumnType::Date
        } else {
            return ColumnType::Text;
        };
        ty = Some(ty.map_or(cell_ty, |t| t.widen(cell_ty)));
        if ty == Some(ColumnType::Text) {
            return ColumnType::Text;
        }
    }
    ty.unwrap_or(ColumnType::Text)
}

fn parse_number(raw: &str) -> Option<f64> {
    if !raw.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}
