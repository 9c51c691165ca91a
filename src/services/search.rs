use chrono::Utc;
use serde::Serialize;
use std::str::FromStr;
use tracing::info;

use crate::error::AppError;
use crate::models::SearchResult;

/// Backend answering `search_web`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    /// Fixed placeholder results; no network traffic.
    Simulated,
    Disabled,
}

impl FromStr for SearchProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulated" => Ok(SearchProvider::Simulated),
            "disabled" => Ok(SearchProvider::Disabled),
            other => Err(format!(
                "unknown search provider '{}', expected 'simulated' or 'disabled'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub result_count: usize,
    pub search_timestamp: String,
}

impl SearchProvider {
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidArgument("Search query must not be empty".to_string()));
        }
        if max_results == 0 {
            return Err(AppError::InvalidArgument("max_results must be at least 1".to_string()));
        }

        let results = match self {
            SearchProvider::Disabled => {
                return Err(AppError::Unavailable(format!(
                    "Web search is disabled; cannot search for '{}'",
                    query
                )))
            }
            SearchProvider::Simulated => simulated_results(query),
        };

        let results: Vec<SearchResult> = results.into_iter().take(max_results).collect();
        info!("Search completed for query: '{}' ({} results)", query, results.len());
        Ok(results)
    }

    pub fn report(&self, query: &str, max_results: usize) -> Result<SearchReport, AppError> {
        let results = self.search(query, max_results)?;
        Ok(SearchReport {
            query: query.to_string(),
            result_count: results.len(),
            results,
            search_timestamp: Utc::now().to_rfc3339(),
        })
    }
}

fn simulated_results(query: &str) -> Vec<SearchResult> {
    vec![
        SearchResult {
            title: format!("Result for '{}' - Page 1", query),
            url: format!("https://example.com/page1?q={}", query.replace(' ', "+")),
            description: format!(
                "This is a simulated search result for the query '{}'. It contains relevant information about the search topic.",
                query
            ),
            source: "example.com".to_string(),
        },
        SearchResult {
            title: format!("Information about '{}' - Resource 2", query),
            url: format!("https://info-site.com/resource?search={}", query.replace(' ', "-")),
            description: format!("Additional information and details about '{}' can be found here.", query),
            source: "info-site.com".to_string(),
        },
        SearchResult {
            title: format!("Complete guide to '{}'", query),
            url: format!("https://guide.com/topics/{}", query.replace(' ', "-").to_lowercase()),
            description: format!(
                "Comprehensive guide and tutorial about '{}' with examples and best practices.",
                query
            ),
            source: "guide.com".to_string(),
        },
    ]
}
