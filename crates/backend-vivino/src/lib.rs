//! Vivino ratings feed.
//!
//! Provides the `RatingFeed` trait and two implementations: `VivinoClient`
//! (HTTP, explore API plus per-winery listings) and `FixtureFeed` (JSON file,
//! for offline runs and tests). Matching code only sees `RatingFeed`, so the
//! source can be swapped without touching scoring.

mod client;
mod fixture;

pub use client::{RateLimiter, VivinoClient};
pub use fixture::{FixtureData, FixtureFeed, FixtureWinery};

use std::future::Future;
use thiserror::Error;
use vinolink_model::{ExternalRatingCandidate, WineryRef};

/// Errors from ratings feed operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Rate limited on {url} after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Feed not available")]
    Unavailable,
}

/// One page of the paginated candidate feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    /// 1-based page number
    pub page: u32,
    /// Eligible candidates on this page
    pub candidates: Vec<ExternalRatingCandidate>,
    /// Wineries first seen on this page
    pub wineries: Vec<WineryRef>,
    /// Total records the source reports for the whole query
    pub total: usize,
    pub has_next: bool,
}

impl FeedPage {
    /// Cursor of the following page, if there is one.
    pub fn next_page(&self) -> Option<u32> {
        self.has_next.then_some(self.page + 1)
    }
}

/// Trait for ratings sources (Vivino HTTP, fixtures, etc.)
pub trait RatingFeed {
    /// Fetch one page of the candidate feed (pages start at 1).
    fn fetch_page(&self, page: u32) -> impl Future<Output = Result<FeedPage, BackendError>> + Send;

    /// Fetch every listed wine of one winery.
    fn fetch_winery_wines(
        &self,
        winery: &WineryRef,
    ) -> impl Future<Output = Result<Vec<ExternalRatingCandidate>, BackendError>> + Send;

    /// Get the feed name for logging.
    fn name(&self) -> &'static str;
}

/// Vivino client configuration.
#[derive(Debug, Clone)]
pub struct VivinoConfig {
    pub base_url: String,
    pub country_code: String,
    pub currency_code: String,
    pub per_page: u32,
    /// Minimum interval between explore requests
    pub explore_interval_ms: u64,
    /// Minimum interval between winery requests
    pub winery_interval_ms: u64,
    pub explore_timeout_secs: u64,
    pub winery_timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Linear backoff step between retries
    pub retry_backoff_ms: u64,
    /// Pause after an HTTP 429
    pub rate_limited_pause_secs: u64,
    /// Winery listings below this review count are dropped
    pub min_winery_rating_count: u32,
    pub user_agent: String,
}

impl Default for VivinoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.vivino.com".to_string(),
            country_code: "CA".to_string(),
            currency_code: "CAD".to_string(),
            per_page: 50,
            explore_interval_ms: 400,
            winery_interval_ms: 350,
            explore_timeout_secs: 15,
            winery_timeout_secs: 10,
            max_retries: 3,
            retry_backoff_ms: 500,
            rate_limited_pause_secs: 10,
            min_winery_rating_count: 5,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}
