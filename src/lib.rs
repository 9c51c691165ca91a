pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use std::time::Duration;

use crate::error::AppError;
use crate::services::extractor::ContentExtractor;
use crate::services::fetcher::PageFetcher;
use crate::services::search::SearchProvider;
use crate::services::table::TableLoader;

pub const SERVER_NAME: &str = "sheet-enrichment";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state handed to every handler.
pub struct AppState {
    pub loader: TableLoader,
    pub fetcher: PageFetcher,
    pub search: SearchProvider,
    pub extractor: ContentExtractor,
}

impl AppState {
    pub fn new(config: config::Config) -> Result<Self, AppError> {
        let loader = TableLoader::new(config.max_file_size, config.table_cache_capacity);
        let fetcher = PageFetcher::new(
            Duration::from_secs(config.fetch_timeout_secs),
            Duration::from_millis(config.fetch_interval_ms),
        )?;

        Ok(Self {
            search: config.search_provider,
            loader,
            fetcher,
            extractor: ContentExtractor,
        })
    }
}
