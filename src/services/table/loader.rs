use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use calamine::{open_workbook_from_rs, Data, Range, Reader, Xls, Xlsx};
use moka::sync::Cache;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::types::{Cell, Column, FileFormat, Table};
use super::utils::*;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    modified: Option<SystemTime>,
}

/// A table together with the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub path: PathBuf,
    pub format: FileFormat,
    pub table: Arc<Table>,
}

/// Reads tabular files into [`Table`]s, keeping a read-through cache keyed
/// by file identity and modification time.
pub struct TableLoader {
    max_file_size: usize,
    cache: Cache<CacheKey, Arc<Table>>,
}

impl TableLoader {
    pub fn new(max_file_size: usize, cache_capacity: u64) -> Self {
        Self {
            max_file_size,
            cache: Cache::new(cache_capacity),
        }
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedTable, AppError> {
        let path = path.as_ref();
        let start = std::time::Instant::now();

        if !path.is_file() {
            return Err(AppError::NotFound(format!("File not found: {}", path.display())));
        }
        let format = FileFormat::from_path(path)?;

        let metadata = std::fs::metadata(path)?;
        if metadata.len() > self.max_file_size as u64 {
            return Err(AppError::InvalidArgument(format!(
                "File {} is {}KB, limit is {}KB",
                path.display(),
                metadata.len() / 1024,
                self.max_file_size / 1024
            )));
        }

        let key = CacheKey {
            path: path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
            modified: metadata.modified().ok(),
        };

        if let Some(table) = self.cache.get(&key) {
            debug!("Table cache hit for {}", path.display());
            return Ok(LoadedTable { path: path.to_path_buf(), format, table });
        }

        let data = Bytes::from(std::fs::read(path)?);
        let table = Arc::new(parse_bytes(format, data, &path.display().to_string())?);
        self.cache.insert(key, Arc::clone(&table));

        info!(
            "File loaded: {} ({} rows, {} columns) in {:?}",
            path.display(),
            table.row_count(),
            table.column_count(),
            start.elapsed()
        );

        Ok(LoadedTable { path: path.to_path_buf(), format, table })
    }
}

/// Parses raw file contents; `source` is only used in error messages.
pub fn parse_bytes(format: FileFormat, data: Bytes, source: &str) -> Result<Table, AppError> {
    match format {
        FileFormat::Xlsx => {
            let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
                .map_err(|e| AppError::file_processing(source, format!("Failed to open Excel file: {}", e)))?;
            read_first_sheet(workbook, source)
        }
        FileFormat::Xls => {
            let workbook: Xls<_> = open_workbook_from_rs(Cursor::new(data))
                .map_err(|e| AppError::file_processing(source, format!("Failed to open Excel file: {}", e)))?;
            read_first_sheet(workbook, source)
        }
        FileFormat::Csv => read_csv(&data, source),
        FileFormat::Json => read_json(&data, source),
    }
}

fn read_first_sheet<R>(mut workbook: R, source: &str) -> Result<Table, AppError>
where
    R: Reader<Cursor<Bytes>>,
    R::Error: std::fmt::Display,
{
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names
        .first()
        .ok_or_else(|| AppError::file_processing(source, "No sheets found in workbook"))?;
    if sheet_names.len() > 1 {
        debug!("Workbook has {} sheets, reading '{}'", sheet_names.len(), sheet_name);
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| AppError::file_processing(source, format!("Failed to read worksheet '{}': {}", sheet_name, e)))?;

    range_to_table(&range, sheet_name, source)
}

/// First row is the header; every following row is data.
fn range_to_table(range: &Range<Data>, sheet_name: &str, source: &str) -> Result<Table, AppError> {
    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => unique_headers(header_row.iter().map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        })),
        None => {
            warn!("Sheet '{}' of {} is empty", sheet_name, source);
            return Ok(Table::default());
        }
    };

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (idx, cells) in columns.iter_mut().enumerate() {
            cells.push(row.get(idx).map_or(Cell::Missing, excel_cell));
        }
    }

    Table::new(
        headers
            .into_iter()
            .zip(columns)
            .map(|(name, cells)| Column::new(name, cells))
            .collect(),
    )
}

fn excel_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(d) => excel_serial_to_datetime(d.as_f64())
            .map_or_else(|| Cell::Float(d.as_f64()), Cell::DateTime),
        Data::DateTimeIso(s) => parse_date_string(s)
            .map_or_else(|| Cell::Text(s.clone()), Cell::DateTime),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn read_csv(data: &[u8], source: &str) -> Result<Table, AppError> {
    let text = String::from_utf8_lossy(data);
    let text = text.trim_start_matches('\u{feff}');
    let delimiter = detect_delimiter(text);
    debug!("Detected delimiter {:?} for {}", delimiter as char, source);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = unique_headers(
        reader
            .headers()
            .map_err(|e| AppError::file_processing(source, format!("Failed to read CSV header: {}", e)))?
            .iter(),
    );
    if headers.is_empty() {
        return Err(AppError::file_processing(source, "No columns found"));
    }

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            AppError::file_processing(source, format!("Failed to read CSV row {}: {}", row_idx + 1, e))
        })?;
        // Short rows are padded, long rows truncated
        for (idx, cells) in columns.iter_mut().enumerate() {
            cells.push(record.get(idx).map_or(Cell::Missing, parse_text_cell));
        }
    }

    Table::new(
        headers
            .into_iter()
            .zip(columns)
            .map(|(name, cells)| Column::new(name, cells))
            .collect(),
    )
}

fn read_json(data: &[u8], source: &str) -> Result<Table, AppError> {
    let value: Value = serde_json::from_slice(data)
        .map_err(|e| AppError::file_processing(source, format!("Invalid JSON: {}", e)))?;

    let records: Vec<Map<String, Value>> = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(map) => Ok(map),
                _ => Err(AppError::file_processing(
                    source,
                    format!("Record {} is not a JSON object", idx),
                )),
            })
            .collect::<Result<_, _>>()?,
        Value::Object(map) => vec![map],
        _ => {
            return Err(AppError::file_processing(
                source,
                "Expected a JSON array of objects or a single object",
            ))
        }
    };

    let flattened: Vec<Vec<(String, Cell)>> = records
        .iter()
        .map(|record| {
            let mut out = Vec::new();
            flatten_into("", record, &mut out);
            // A literal "a.b" key and a nested {"a": {"b"}} flatten to the same name.
            let (keys, cells): (Vec<String>, Vec<Cell>) = out.into_iter().unzip();
            suffix_duplicates(keys, str::to_string).into_iter().zip(cells).collect()
        })
        .collect();

    let mut names: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (name, _) in flattened.iter().flatten() {
        if !positions.contains_key(name) {
            positions.insert(name.clone(), names.len());
            names.push(name.clone());
        }
    }

    let mut columns: Vec<Vec<Cell>> = vec![vec![Cell::Missing; flattened.len()]; names.len()];
    for (row_idx, row) in flattened.into_iter().enumerate() {
        for (name, cell) in row {
            columns[positions[&name]][row_idx] = cell;
        }
    }

    Table::new(
        names
            .into_iter()
            .zip(columns)
            .map(|(name, cells)| Column::new(name, cells))
            .collect(),
    )
}

fn flatten_into(prefix: &str, record: &Map<String, Value>, out: &mut Vec<(String, Cell)>) {
    for (key, value) in record {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&name, inner, out),
            other => out.push((name, json_cell(other))),
        }
    }
}

fn json_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Missing,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map_or(Cell::Missing, Cell::Float),
        },
        Value::String(s) => Cell::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => Cell::Text(value.to_string()),
    }
}
