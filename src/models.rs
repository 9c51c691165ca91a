use serde::Serialize;
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::services::table::types::{Cell, SAMPLE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    Integer,
    Float,
    Boolean,
    Datetime,
    String,
    Mixed,
    Unknown,
}

impl InferredType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            InferredType::Integer | InferredType::Boolean => "INTEGER",
            InferredType::Float => "REAL",
            _ => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
    pub total_rows: usize,
    pub inferred_type: InferredType,
    pub sample_values: SmallVec<[Cell; SAMPLE_SIZE]>,
    pub is_critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Email,
    Phone,
    Address,
    Url,
    Numeric,
    Text,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct MostCommon {
    pub value: Cell,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternProfile {
    pub column_name: String,
    pub unique_value_count: usize,
    pub most_common: Option<MostCommon>,
    pub pattern_type: PatternType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_stats: Option<NumericStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub column: String,
    pub missing_count: usize,
    pub priority: Priority,
    pub suggested_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLink {
    pub url: String,
    pub text: String,
    pub is_external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageImage {
    pub url: String,
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedPage {
    pub url: String,
    pub title: String,
    pub description: String,
    pub text_excerpt: String,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_fields: Option<BTreeMap<String, String>>,
    pub extraction_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
    pub source: String,
}
