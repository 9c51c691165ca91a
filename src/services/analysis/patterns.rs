use rayon::prelude::*;
use std::collections::HashMap;
use tracing::warn;

use crate::error::AppError;
use crate::models::{MostCommon, NumericStats, PatternProfile, PatternType};
use crate::services::table::types::{Cell, Column, Table};

impl PatternType {
    /// Case-insensitive exact match on the column name. Content is never
    /// consulted here.
    pub fn from_column_name(name: &str) -> Option<PatternType> {
        match name.to_lowercase().as_str() {
            "email" | "mail" | "e-mail" => Some(PatternType::Email),
            "phone" | "telephone" | "tel" => Some(PatternType::Phone),
            "address" | "adresse" | "addr" => Some(PatternType::Address),
            "website" | "site" | "url" => Some(PatternType::Url),
            _ => None,
        }
    }
}

/// Profiles every column with at least one value. All-missing columns are
/// left out.
pub fn classify(table: &Table) -> Vec<PatternProfile> {
    table
        .columns()
        .par_iter()
        .filter_map(|column| match classify_column(column) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Column '{}' could not be profiled: {}", column.name, e);
                Some(PatternProfile {
                    column_name: column.name.clone(),
                    unique_value_count: unique_count(column),
                    most_common: None,
                    pattern_type: PatternType::Unknown,
                    numeric_stats: None,
                })
            }
        })
        .collect()
}

fn classify_column(column: &Column) -> Result<Option<PatternProfile>, AppError> {
    let values: Vec<&Cell> = column.non_missing().collect();
    if values.is_empty() {
        return Ok(None);
    }

    let frequencies = frequency_table(&values);

    // A vocabulary name outranks the content, even all-numeric content
    let named = PatternType::from_column_name(&column.name);

    let profile = match named {
        None if values.iter().all(|v| v.is_numeric()) => PatternProfile {
            column_name: column.name.clone(),
            unique_value_count: frequencies.len(),
            most_common: None,
            pattern_type: PatternType::Numeric,
            numeric_stats: Some(numeric_stats(&column.name, &values)?),
        },
        _ => PatternProfile {
            column_name: column.name.clone(),
            unique_value_count: frequencies.len(),
            most_common: most_common(&frequencies),
            pattern_type: named.unwrap_or(PatternType::Text),
            numeric_stats: None,
        },
    };

    Ok(Some(profile))
}

struct Frequency<'a> {
    value: &'a Cell,
    count: usize,
}

/// Distinct values with their counts, in first-encountered order.
fn frequency_table<'a>(values: &[&'a Cell]) -> Vec<Frequency<'a>> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut table: Vec<Frequency<'a>> = Vec::new();

    for &value in values {
        let key = frequency_key(value);
        match positions.get(&key) {
            Some(&idx) => table[idx].count += 1,
            None => {
                positions.insert(key, table.len());
                table.push(Frequency { value, count: 1 });
            }
        }
    }
    table
}

fn frequency_key(value: &Cell) -> String {
    match value {
        // Numbers compare by value, so 1 and 1.0 are one entry
        Cell::Int(_) | Cell::Float(_) => format!("n:{}", value),
        Cell::Text(_) => format!("s:{}", value),
        Cell::Bool(_) => format!("b:{}", value),
        Cell::DateTime(_) => format!("d:{}", value),
        Cell::Missing => String::new(),
    }
}

/// Ties resolve to the earliest entry of the frequency table.
fn most_common(frequencies: &[Frequency<'_>]) -> Option<MostCommon> {
    let mut best: Option<&Frequency<'_>> = None;
    for entry in frequencies {
        if best.map_or(true, |b| entry.count > b.count) {
            best = Some(entry);
        }
    }
    best.map(|entry| MostCommon {
        value: entry.value.clone(),
        count: entry.count,
    })
}

fn numeric_stats(column: &str, values: &[&Cell]) -> Result<NumericStats, AppError> {
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();

    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;

    if !(min.is_finite() && max.is_finite() && mean.is_finite()) {
        return Err(AppError::AnalysisError {
            column: column.to_string(),
            message: "numeric statistics are not finite".to_string(),
        });
    }

    Ok(NumericStats { min, max, mean })
}

fn unique_count(column: &Column) -> usize {
    let values: Vec<&Cell> = column.non_missing().collect();
    frequency_table(&values).len()
}
