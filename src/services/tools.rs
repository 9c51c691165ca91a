use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::AppError;
use crate::services::analysis::{self, FileReport};
use crate::services::db_loader::SqlWorkspace;
use crate::services::table::utils::clean_table_name;
use crate::services::table::LoadedTable;
use crate::AppState;

const ENRICHMENT_PENDING: &str = "Enrichment functionality will be implemented with web scrapers";

/// Every operation reachable through `POST /tools/:tool_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    AnalyzeFile,
    Analyze,
    ClassifyPatterns,
    SynthesizeSuggestions,
    EnrichFile,
    RunSql,
    GetTableSchema,
    SearchWeb,
    ScrapeUrl,
    ExtractPage,
}

impl Tool {
    pub const ALL: [Tool; 10] = [
        Tool::AnalyzeFile,
        Tool::Analyze,
        Tool::ClassifyPatterns,
        Tool::SynthesizeSuggestions,
        Tool::EnrichFile,
        Tool::RunSql,
        Tool::GetTableSchema,
        Tool::SearchWeb,
        Tool::ScrapeUrl,
        Tool::ExtractPage,
    ];

    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::AnalyzeFile => "analyze_file",
            Tool::Analyze => "analyze",
            Tool::ClassifyPatterns => "classify_patterns",
            Tool::SynthesizeSuggestions => "synthesize_suggestions",
            Tool::EnrichFile => "enrich_file",
            Tool::RunSql => "run_sql",
            Tool::GetTableSchema => "get_table_schema",
            Tool::SearchWeb => "search_web",
            Tool::ScrapeUrl => "scrape_url",
            Tool::ExtractPage => "extract_page",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::AnalyzeFile => "Analyze a file (Excel, CSV, JSON) and identify missing data",
            Tool::Analyze => "Per-column missing-value profiles of a file",
            Tool::ClassifyPatterns => "Classify the kind of data each column of a file holds",
            Tool::SynthesizeSuggestions => "Prioritized enrichment plan for the incomplete columns of a file",
            Tool::EnrichFile => "Enrich a file with missing data via web scraping",
            Tool::RunSql => "Run a read-only SQL query against a file loaded as a table",
            Tool::GetTableSchema => "Return the SQL schema of a file loaded as a table",
            Tool::SearchWeb => "Search the web for information",
            Tool::ScrapeUrl => "Scrape the content of a specific URL",
            Tool::ExtractPage => "Extract page content from supplied HTML, fetching the URL when none is given",
        }
    }

    pub fn parameters(&self) -> Value {
        let file_path = json!({"type": "string", "description": "Path to the file"});
        match self {
            Tool::AnalyzeFile => json!({
                "file_path": file_path,
                "detailed": {"type": "boolean", "description": "Include patterns and suggestions", "default": false}
            }),
            Tool::Analyze
            | Tool::ClassifyPatterns
            | Tool::SynthesizeSuggestions
            | Tool::GetTableSchema => json!({ "file_path": file_path }),
            Tool::EnrichFile => json!({
                "file_path": file_path,
                "missing_fields": {"type": "array", "description": "Fields to look up"}
            }),
            Tool::RunSql => json!({
                "file_path": file_path,
                "query": {"type": "string", "description": "SQL query to run"},
                "limit": {"type": "integer", "description": "Maximum number of rows", "default": 100}
            }),
            Tool::SearchWeb => json!({
                "query": {"type": "string", "description": "Search terms"},
                "max_results": {"type": "integer", "description": "Maximum number of results", "default": 5}
            }),
            Tool::ScrapeUrl => json!({
                "url": {"type": "string", "description": "URL to scrape"},
                "extract_fields": {"type": "array", "description": "Specific fields to extract (optional)"}
            }),
            Tool::ExtractPage => json!({
                "url": {"type": "string", "description": "Page URL, used to resolve relative links"},
                "html": {"type": "string", "description": "Page markup (optional, fetched when absent)"},
                "extract_fields": {"type": "array", "description": "Specific fields to extract (optional)"}
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn ok(result: Value) -> Self {
        Self { success: true, result, error: None }
    }
}

fn default_limit() -> usize {
    100
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileArgs {
    file_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalyzeFileArgs {
    file_path: String,
    #[serde(default)]
    detailed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnrichFileArgs {
    file_path: String,
    #[serde(default)]
    missing_fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunSqlArgs {
    file_path: String,
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchWebArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScrapeUrlArgs {
    url: String,
    #[serde(default)]
    extract_fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExtractPageArgs {
    url: String,
    html: Option<String>,
    #[serde(default)]
    extract_fields: Vec<String>,
}

fn parse_args<T: DeserializeOwned>(tool: Tool, arguments: Value) -> Result<T, AppError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| AppError::InvalidArgument(format!("Bad arguments for {}: {}", tool.name(), e)))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("Failed to serialize result: {}", e)))
}

/// Runs `f` on the blocking pool with the loaded table of `file_path`.
async fn with_table<T, F>(state: &Arc<AppState>, file_path: String, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(LoadedTable) -> Result<T, AppError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let loaded = state.loader.load(&file_path)?;
        f(loaded)
    })
    .await?
}

fn workspace_for(loaded: &LoadedTable) -> Result<SqlWorkspace, AppError> {
    let stem = loaded
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    SqlWorkspace::from_table(&loaded.table, &clean_table_name(stem))
}

pub async fn dispatch(state: &Arc<AppState>, tool: Tool, arguments: Value) -> Result<Value, AppError> {
    let start = std::time::Instant::now();
    info!("Tool call: {}", tool.name());

    let result = match tool {
        Tool::AnalyzeFile => {
            let args: AnalyzeFileArgs = parse_args(tool, arguments)?;
            let report = with_table(state, args.file_path, move |loaded| Ok(FileReport::build(&loaded, args.detailed))).await?;
            to_value(&report)?
        }
        Tool::Analyze => {
            let args: FileArgs = parse_args(tool, arguments)?;
            let profiles = with_table(state, args.file_path, |loaded| Ok(analysis::missing::analyze(&loaded.table))).await?;
            to_value(&profiles)?
        }
        Tool::ClassifyPatterns => {
            let args: FileArgs = parse_args(tool, arguments)?;
            let patterns = with_table(state, args.file_path, |loaded| Ok(analysis::patterns::classify(&loaded.table))).await?;
            to_value(&patterns)?
        }
        Tool::SynthesizeSuggestions => {
            let args: FileArgs = parse_args(tool, arguments)?;
            let suggestions = with_table(state, args.file_path, |loaded| Ok(analysis::run(&loaded.table).suggestions)).await?;
            to_value(&suggestions)?
        }
        Tool::EnrichFile => {
            let args: EnrichFileArgs = parse_args(tool, arguments)?;
            let file_path = args.file_path.clone();
            let rows = with_table(state, args.file_path, |loaded| Ok(loaded.table.row_count())).await?;
            info!("Enrichment request processed for {}", file_path);
            json!({
                "file_path": file_path,
                "fields_to_enrich": args.missing_fields,
                "original_rows": rows,
                "enrichment_status": "pending",
                "message": ENRICHMENT_PENDING,
                "timestamp": Utc::now().to_rfc3339(),
            })
        }
        Tool::RunSql => {
            let args: RunSqlArgs = parse_args(tool, arguments)?;
            let (query, limit) = (args.query, args.limit);
            let result = with_table(state, args.file_path, move |loaded| workspace_for(&loaded)?.query(&query, limit)).await?;
            to_value(&result)?
        }
        Tool::GetTableSchema => {
            let args: FileArgs = parse_args(tool, arguments)?;
            let schema = with_table(state, args.file_path, |loaded| workspace_for(&loaded)?.schema()).await?;
            to_value(&schema)?
        }
        Tool::SearchWeb => {
            let args: SearchWebArgs = parse_args(tool, arguments)?;
            to_value(&state.search.report(&args.query, args.max_results)?)?
        }
        Tool::ScrapeUrl => {
            let args: ScrapeUrlArgs = parse_args(tool, arguments)?;
            let html = state.fetcher.fetch(&args.url).await?;
            to_value(&state.extractor.extract(&args.url, &html, &args.extract_fields))?
        }
        Tool::ExtractPage => {
            let args: ExtractPageArgs = parse_args(tool, arguments)?;
            let html = match args.html {
                Some(html) => html,
                None => state.fetcher.fetch(&args.url).await?,
            };
            to_value(&state.extractor.extract(&args.url, &html, &args.extract_fields))?
        }
    };

    debug!("Tool {} finished in {:?}", tool.name(), start.elapsed());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for tool in Tool::ALL {
            assert_eq!(Tool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(Tool::from_name("drop_everything"), None);
    }

    #[test]
    fn test_defaults_applied() {
        let args: RunSqlArgs =
            parse_args(Tool::RunSql, json!({"file_path": "a.csv", "query": "SELECT 1"})).unwrap();
        assert_eq!(args.limit, 100);

        let args: SearchWebArgs = parse_args(Tool::SearchWeb, json!({"query": "acme"})).unwrap();
        assert_eq!(args.max_results, 5);

        let args: AnalyzeFileArgs = parse_args(Tool::AnalyzeFile, json!({"file_path": "a.csv"})).unwrap();
        assert!(!args.detailed);
    }

    #[test]
    fn test_unknown_and_missing_arguments_rejected() {
        let err = parse_args::<FileArgs>(Tool::Analyze, json!({"file_path": "a.csv", "sheet": 2})).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let err = parse_args::<FileArgs>(Tool::Analyze, Value::Null).unwrap_err();
        assert!(err.to_string().contains("file_path"));
    }

    #[test]
    fn test_parameters_describe_every_tool() {
        for tool in Tool::ALL {
            assert!(tool.parameters().is_object(), "{}", tool.name());
            assert!(!tool.description().is_empty());
        }
    }
}
