use chrono::Utc;
use serde::Serialize;

use super::missing::round2;
use crate::models::{ColumnProfile, PatternProfile, Suggestion};
use crate::services::table::LoadedTable;

#[derive(Debug, Serialize)]
pub struct BasicInfo {
    pub file_path: String,
    pub file_type: String,
    pub rows_count: usize,
    pub columns_count: usize,
    pub columns: Vec<String>,
    pub analysis_timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct MissingDataSummary {
    pub total_missing_values: usize,
    pub columns_with_missing: usize,
    pub critical_columns: Vec<String>,
    pub completion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub basic_info: BasicInfo,
    pub missing_data_summary: MissingDataSummary,
    pub missing_data_details: Vec<ColumnProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_patterns: Option<Vec<PatternProfile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_suggestions: Option<Vec<Suggestion>>,
}

impl FileReport {
    pub fn build(loaded: &LoadedTable, detailed: bool) -> Self {
        let table = &loaded.table;

        let (profiles, detail) = if detailed {
            let run = super::run(table);
            (run.profiles, Some((run.patterns, run.suggestions)))
        } else {
            (super::missing::analyze(table), None)
        };

        let total_missing: usize = profiles.iter().map(|p| p.missing_count).sum();
        let total_cells = table.row_count() * table.column_count();
        let completion_rate = if total_cells == 0 {
            100.0
        } else {
            round2((total_cells - total_missing) as f64 / total_cells as f64 * 100.0)
        };

        let missing_data_summary = MissingDataSummary {
            total_missing_values: total_missing,
            columns_with_missing: profiles.iter().filter(|p| p.missing_count > 0).count(),
            critical_columns: profiles
                .iter()
                .filter(|p| p.is_critical)
                .map(|p| p.name.clone())
                .collect(),
            completion_rate,
        };

        let (data_patterns, enrichment_suggestions) = match detail {
            Some((patterns, suggestions)) => (Some(patterns), Some(suggestions)),
            None => (None, None),
        };

        FileReport {
            basic_info: BasicInfo {
                file_path: loaded.path.display().to_string(),
                file_type: loaded.format.extension().to_string(),
                rows_count: table.row_count(),
                columns_count: table.column_count(),
                columns: table.column_names(),
                analysis_timestamp: Utc::now().to_rfc3339(),
            },
            missing_data_summary,
            missing_data_details: profiles,
            data_patterns,
            enrichment_suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::table::{Cell, Column, FileFormat, Table};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn loaded(table: Table) -> LoadedTable {
        LoadedTable {
            path: PathBuf::from("contacts.csv"),
            format: FileFormat::Csv,
            table: Arc::new(table),
        }
    }

    #[test]
    fn test_summary() {
        let table = Table::new(vec![
            Column::new("name", vec![Cell::Text("a".into()), Cell::Text("b".into())]),
            Column::new("phone", vec![Cell::Missing, Cell::Missing]),
        ])
        .unwrap();
        let report = FileReport::build(&loaded(table), false);

        assert_eq!(report.basic_info.file_type, ".csv");
        assert_eq!(report.basic_info.columns, vec!["name", "phone"]);
        assert_eq!(report.missing_data_summary.total_missing_values, 2);
        assert_eq!(report.missing_data_summary.columns_with_missing, 1);
        assert_eq!(report.missing_data_summary.critical_columns, vec!["phone"]);
        assert_eq!(report.missing_data_summary.completion_rate, 50.0);
        assert!(report.data_patterns.is_none());
        assert!(report.enrichment_suggestions.is_none());
    }

    #[test]
    fn test_detailed_report_includes_patterns() {
        let table = Table::new(vec![Column::new("tel", vec![Cell::Missing, Cell::Text("0102".into())])]).unwrap();
        let report = FileReport::build(&loaded(table), true);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["data_patterns"][0]["pattern_type"], "phone");
        assert_eq!(json["enrichment_suggestions"][0]["priority"], "medium");
    }

    #[test]
    fn test_empty_table_is_complete() {
        let report = FileReport::build(&loaded(Table::default()), false);
        assert_eq!(report.missing_data_summary.completion_rate, 100.0);
    }
}
