use crate::{BackendError, FeedPage, RatingFeed, VivinoConfig};
use reqwest::{header::ACCEPT, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use vinolink_model::{ExternalRatingCandidate, WineryRef};

/// Serial rate limiting: enforces a minimum gap between consecutive calls
/// made through the same limiter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep until `min_interval` has passed since the previous call.
    pub async fn wait(&self, min_interval: Duration) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// HTTP client for the Vivino explore and winery APIs.
pub struct VivinoClient {
    config: VivinoConfig,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl VivinoClient {
    pub fn new(config: VivinoConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        Ok(Self {
            config,
            client,
            limiter: RateLimiter::new(),
        })
    }

    pub fn config(&self) -> &VivinoConfig {
        &self.config
    }

    /// Explore query ordered by review count, most reviewed first.
    fn explore_url(&self, page: u32) -> String {
        format!(
            "{}/api/explore/explore?country_code={}&currency_code={}&min_rating=1\
             &order_by=ratings_count&order=desc&page={}&per_page={}",
            self.config.base_url, self.config.country_code, self.config.currency_code, page, self.config.per_page
        )
    }

    fn winery_url(&self, winery_id: u64) -> String {
        format!("{}/api/wineries/{}/wines", self.config.base_url, winery_id)
    }

    /// GET with serial rate limiting and retries. Connection errors and 5xx
    /// back off linearly, 429 pauses longer, other statuses fail at once.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<T, BackendError> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;

        loop {
            self.limiter.wait(interval).await;
            debug!(url = %url, attempt, "Fetching Vivino page");

            let result = self
                .client
                .get(url)
                .header(ACCEPT, "application/json")
                .timeout(timeout)
                .send()
                .await;

            let pause = match result {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<T>()
                        .await
                        .map_err(|e| BackendError::ParseError(e.to_string()));
                }
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    warn!(url = %url, attempt, "Rate limited by Vivino");
                    if attempt >= max_retries {
                        return Err(BackendError::RateLimited {
                            url: url.to_string(),
                            attempts: attempt + 1,
                        });
                    }
                    Duration::from_secs(self.config.rate_limited_pause_secs)
                }
                Ok(response) if response.status().is_server_error() && attempt < max_retries => {
                    warn!(url = %url, attempt, status = %response.status(), "Vivino server error");
                    self.backoff(attempt)
                }
                Ok(response) => {
                    return Err(BackendError::Http {
                        status: response.status().as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(e) if attempt < max_retries => {
                    warn!(url = %url, attempt, error = %e, "Vivino request failed");
                    self.backoff(attempt)
                }
                Err(e) => return Err(BackendError::Connection(e.to_string())),
            };

            tokio::time::sleep(pause).await;
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.retry_backoff_ms * u64::from(attempt + 1))
    }
}

impl RatingFeed for VivinoClient {
    async fn fetch_page(&self, page: u32) -> Result<FeedPage, BackendError> {
        let url = self.explore_url(page);
        let body: ExploreResponse = self
            .get_json(
                &url,
                Duration::from_millis(self.config.explore_interval_ms),
                Duration::from_secs(self.config.explore_timeout_secs),
            )
            .await?;
        Ok(parse_explore(body, page, self.config.per_page, &self.config.base_url))
    }

    async fn fetch_winery_wines(&self, winery: &WineryRef) -> Result<Vec<ExternalRatingCandidate>, BackendError> {
        let url = self.winery_url(winery.id);
        let body: WineryWinesResponse = self
            .get_json(
                &url,
                Duration::from_millis(self.config.winery_interval_ms),
                Duration::from_secs(self.config.winery_timeout_secs),
            )
            .await?;
        Ok(parse_winery_wines(
            body,
            winery,
            &self.config.base_url,
            self.config.min_winery_rating_count,
        ))
    }

    fn name(&self) -> &'static str {
        "vivino"
    }
}

// Explore API payload. Every field is optional upstream.

#[derive(Debug, Default, Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    explore_vintage: Option<ExploreVintage>,
}

#[derive(Debug, Default, Deserialize)]
struct ExploreVintage {
    #[serde(default)]
    records_matched: Option<usize>,
    #[serde(default)]
    matches: Option<Vec<ExploreMatch>>,
}

#[derive(Debug, Deserialize)]
struct ExploreMatch {
    #[serde(default)]
    vintage: Option<Vintage>,
}

#[derive(Debug, Deserialize)]
struct Vintage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    seo_name: Option<String>,
    #[serde(default)]
    statistics: Option<Statistics>,
    #[serde(default)]
    wine: Option<Wine>,
}

#[derive(Debug, Deserialize)]
struct Wine {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    winery: Option<Winery>,
    #[serde(default)]
    region: Option<Region>,
}

#[derive(Debug, Deserialize)]
struct Winery {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    seo_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Region {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<Country>,
}

#[derive(Debug, Deserialize)]
struct Country {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Statistics {
    #[serde(default)]
    ratings_average: Option<f32>,
    #[serde(default)]
    ratings_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct WineryWinesResponse {
    #[serde(default)]
    wines: Option<Vec<WineryWine>>,
}

#[derive(Debug, Deserialize)]
struct WineryWine {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    seo_name: Option<String>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn rating_of(statistics: Option<&Statistics>) -> (f32, u32) {
    statistics.map_or((0.0, 0), |s| {
        (s.ratings_average.unwrap_or(0.0), s.ratings_count.unwrap_or(0))
    })
}

/// Explore matches become candidates; unrated matches and matches without a
/// wine id are dropped.
fn parse_explore(body: ExploreResponse, page: u32, per_page: u32, base_url: &str) -> FeedPage {
    let explore = body.explore_vintage.unwrap_or_default();
    let matches = explore.matches.unwrap_or_default();
    let has_next = matches.len() >= per_page as usize;

    let mut candidates = Vec::new();
    let mut wineries = Vec::new();
    let mut seen_wineries = HashSet::new();

    for vintage in matches.into_iter().filter_map(|m| m.vintage) {
        let Some(wine) = vintage.wine else { continue };
        let Some(wine_id) = wine.id else { continue };

        let (rating, rating_count) = rating_of(vintage.statistics.as_ref());
        if rating <= 0.0 || rating_count == 0 {
            continue;
        }

        let winery = wine.winery;
        let winery_name = winery
            .as_ref()
            .and_then(|w| w.name.clone())
            .unwrap_or_default();
        let winery_seo = winery.as_ref().and_then(|w| non_empty(w.seo_name.clone()));
        let wine_name_only = wine.name.unwrap_or_default();
        let full_name = non_empty(vintage.name)
            .unwrap_or_else(|| format!("{} {}", winery_name, wine_name_only).trim().to_string());

        let direct_url = match (&winery_seo, non_empty(vintage.seo_name)) {
            (Some(winery_seo), Some(vintage_seo)) => format!("{}/{}/{}", base_url, winery_seo, vintage_seo),
            _ => format!("{}/w/{}", base_url, wine_id),
        };

        let (region, country) = match wine.region {
            Some(region) => (
                region.name.unwrap_or_default(),
                region.country.and_then(|c| c.name).unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };

        if let Some(id) = winery.as_ref().and_then(|w| w.id) {
            if seen_wineries.insert(id) {
                wineries.push(WineryRef {
                    id,
                    name: winery_name.clone(),
                    seo_name: winery_seo.clone().unwrap_or_default(),
                });
            }
        }

        candidates.push(ExternalRatingCandidate {
            wine_id,
            winery_name,
            wine_name_only,
            full_name,
            rating,
            rating_count,
            direct_url: Some(direct_url),
            region,
            country,
        });
    }

    FeedPage {
        page,
        candidates,
        wineries,
        total: explore.records_matched.unwrap_or(0),
        has_next,
    }
}

/// Winery listings carry no vintage, so links point at the non-vintage page.
fn parse_winery_wines(
    body: WineryWinesResponse,
    winery: &WineryRef,
    base_url: &str,
    min_rating_count: u32,
) -> Vec<ExternalRatingCandidate> {
    body.wines
        .unwrap_or_default()
        .into_iter()
        .filter_map(|wine| {
            let (rating, rating_count) = rating_of(wine.statistics.as_ref());
            if rating <= 0.0 || rating_count < min_rating_count {
                return None;
            }
            let wine_name = wine.name.unwrap_or_default();
            let direct_url = match non_empty(wine.seo_name) {
                Some(seo) if !winery.seo_name.is_empty() => format!(
                    "{}/{}/{}-{}-nv",
                    base_url, winery.seo_name, winery.seo_name, seo
                ),
                _ => format!("{}/w/{}", base_url, wine.id),
            };
            Some(
                ExternalRatingCandidate::new(wine.id, winery.name.clone(), wine_name, rating, rating_count)
                    .with_direct_url(direct_url),
            )
        })
        .collect()
}
