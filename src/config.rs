use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::str::FromStr;

use crate::services::search::SearchProvider;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub fetch_timeout_secs: u64,
    pub fetch_interval_ms: u64,
    pub table_cache_capacity: u64,
    pub search_provider: SearchProvider,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_file_size: default_max_file_size(),
            fetch_timeout_secs: 10,
            fetch_interval_ms: 1000,
            table_cache_capacity: 32,
            search_provider: SearchProvider::Simulated,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port)?,
            max_file_size: env_or("MAX_FILE_SIZE", defaults.max_file_size)?,
            fetch_timeout_secs: env_or("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs)?,
            fetch_interval_ms: env_or("FETCH_INTERVAL_MS", defaults.fetch_interval_ms)?,
            table_cache_capacity: env_or("TABLE_CACHE_CAPACITY", defaults.table_cache_capacity)?,
            search_provider: env_or("SEARCH_PROVIDER", defaults.search_provider)?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to parse {}={:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

pub fn load_config() -> Result<Config> {
    let config = Config::new()?;
    tracing::info!(
        "Configuration loaded: {}:{}, max file size {}KB, search provider {:?}",
        config.host,
        config.port,
        config.max_file_size / 1024,
        config.search_provider
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default_when_unset() {
        let port: u16 = env_or("SHEET_ENRICHMENT_TEST_UNSET_PORT", 4000).unwrap();
        assert_eq!(port, 4000);
    }

    #[test]
    fn test_env_or_parses_and_rejects() {
        std::env::set_var("SHEET_ENRICHMENT_TEST_PROVIDER", " disabled ");
        let provider: SearchProvider = env_or("SHEET_ENRICHMENT_TEST_PROVIDER", SearchProvider::Simulated).unwrap();
        assert_eq!(provider, SearchProvider::Disabled);

        std::env::set_var("SHEET_ENRICHMENT_TEST_BAD_PORT", "eighty");
        let err = env_or::<u16>("SHEET_ENRICHMENT_TEST_BAD_PORT", 80).unwrap_err();
        assert!(err.to_string().contains("SHEET_ENRICHMENT_TEST_BAD_PORT"));
    }
}
