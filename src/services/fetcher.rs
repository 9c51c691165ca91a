use parking_lot::Mutex;
use reqwest::{Client, Url};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::AppError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Minimum spacing between consecutive requests from one process.
pub struct RateLimiter {
    interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Reserves the next slot and returns how long the caller must wait for it.
    fn reserve(&self) -> Duration {
        let now = Instant::now();
        let mut next_allowed = self.next_allowed.lock();
        let slot = match *next_allowed {
            Some(at) if at > now => at,
            _ => now,
        };
        *next_allowed = Some(slot + self.interval);
        slot - now
    }

    pub async fn wait(&self) {
        let delay = self.reserve();
        if !delay.is_zero() {
            debug!("Rate limit: waiting {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

pub struct PageFetcher {
    client: Client,
    limiter: RateLimiter,
}

impl PageFetcher {
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(interval),
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::InvalidArgument(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::InvalidArgument(format!(
                "Unsupported URL scheme '{}' in {}",
                parsed.scheme(),
                url
            )));
        }

        self.limiter.wait().await;

        let start = Instant::now();
        info!("Fetching {}", url);
        let response = self.client.get(parsed).send().await.map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            AppError::fetch(url, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned status {}", url, status);
            return Err(AppError::fetch(url, format!("HTTP status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::fetch(url, format!("Failed to read response body: {}", e)))?;
        info!("Fetched {} ({}KB) in {:?}", url, body.len() / 1024, start.elapsed());
        Ok(body)
    }
}
