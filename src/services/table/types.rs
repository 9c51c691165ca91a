use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;

use crate::error::AppError;

pub const SAMPLE_SIZE: usize = 3;

/// A single value of a column. `Missing` is an explicit null, distinct from
/// an empty string or zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Missing => serializer.serialize_none(),
            Cell::Bool(b) => serializer.serialize_bool(*b),
            Cell::Int(i) => serializer.serialize_i64(*i),
            Cell::Float(v) => serializer.serialize_f64(*v),
            Cell::DateTime(_) => serializer.collect_str(self),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self { name: name.into(), cells }
    }

    pub fn non_missing(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| !c.is_missing())
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }
}

/// Ordered named columns of equal length.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, AppError> {
        if let Some(first) = columns.first() {
            let expected = first.cells.len();
            if let Some(bad) = columns.iter().find(|c| c.cells.len() != expected) {
                return Err(AppError::AnalysisError {
                    column: bad.name.clone(),
                    message: format!(
                        "column has {} cells, expected {}",
                        bad.cells.len(),
                        expected
                    ),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn missing_cell_count(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Xlsx,
    Xls,
    Csv,
    Json,
}

impl FileFormat {
    pub const SUPPORTED: [&'static str; 4] = [".xlsx", ".xls", ".csv", ".json"];

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        match extension.as_str() {
            ".xlsx" => Ok(FileFormat::Xlsx),
            ".xls" => Ok(FileFormat::Xls),
            ".csv" => Ok(FileFormat::Csv),
            ".json" => Ok(FileFormat::Json),
            _ => Err(AppError::UnsupportedFormat(format!(
                "'{}' for {} (supported: {})",
                extension,
                path.display(),
                Self::SUPPORTED.join(", ")
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Xlsx => ".xlsx",
            FileFormat::Xls => ".xls",
            FileFormat::Csv => ".csv",
            FileFormat::Json => ".json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::new("a", vec![Cell::Int(1), Cell::Int(2)]),
            Column::new("b", vec![Cell::Missing]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn missing_is_not_empty_text() {
        let col = Column::new("x", vec![Cell::Text(String::new()), Cell::Missing, Cell::Int(0)]);
        assert_eq!(col.missing_count(), 1);
        assert_eq!(col.non_missing().count(), 2);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a/B.XLSX")).unwrap(), FileFormat::Xlsx);
        assert_eq!(FileFormat::from_path(Path::new("data.csv")).unwrap(), FileFormat::Csv);
        let err = FileFormat::from_path(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn cells_serialize_as_plain_json() {
        let cells = vec![Cell::Missing, Cell::Int(3), Cell::Text("a".into()), Cell::Bool(true)];
        assert_eq!(serde_json::to_string(&cells).unwrap(), r#"[null,3,"a",true]"#);
    }
}
