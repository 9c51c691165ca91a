use rayon::prelude::*;
use smallvec::SmallVec;

use crate::models::{ColumnProfile, InferredType};
use crate::services::table::types::{Cell, Column, Table, SAMPLE_SIZE};

/// One profile per column, in column order.
pub fn analyze(table: &Table) -> Vec<ColumnProfile> {
    table
        .columns()
        .par_iter()
        .map(|column| profile_column(column, table.row_count()))
        .collect()
}

fn profile_column(column: &Column, total_rows: usize) -> ColumnProfile {
    let missing_count = column.missing_count();

    let sample_values: SmallVec<[Cell; SAMPLE_SIZE]> =
        column.non_missing().take(SAMPLE_SIZE).cloned().collect();

    ColumnProfile {
        name: column.name.clone(),
        missing_count,
        missing_percentage: missing_percentage(missing_count, total_rows),
        total_rows,
        inferred_type: infer_type(column.non_missing()),
        sample_values,
        is_critical: is_critical(missing_count, total_rows),
    }
}

pub fn missing_percentage(missing_count: usize, total_rows: usize) -> f64 {
    if total_rows == 0 {
        return 0.0;
    }
    round2(missing_count as f64 / total_rows as f64 * 100.0)
}

/// More than half the rows missing, decided on integers rather than the
/// rounded percentage.
pub fn is_critical(missing_count: usize, total_rows: usize) -> bool {
    total_rows > 0 && missing_count.saturating_mul(2) > total_rows
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn infer_type<'a>(values: impl Iterator<Item = &'a Cell>) -> InferredType {
    let mut inferred = InferredType::Unknown;
    for value in values {
        let current = match value {
            Cell::Missing => continue,
            Cell::Int(_) => InferredType::Integer,
            Cell::Float(_) => InferredType::Float,
            Cell::Bool(_) => InferredType::Boolean,
            Cell::DateTime(_) => InferredType::Datetime,
            Cell::Text(_) => InferredType::String,
        };
        inferred = match (inferred, current) {
            (InferredType::Unknown, next) => next,
            (a, b) if a == b => a,
            (InferredType::Integer, InferredType::Float) | (InferredType::Float, InferredType::Integer) => {
                InferredType::Float
            }
            _ => return InferredType::Mixed,
        };
    }
    inferred
}
