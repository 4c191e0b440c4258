use crate::{BackendError, FeedPage, RatingFeed};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vinolink_model::{ExternalRatingCandidate, WineryRef};

/// A winery and its full wine list, as served by `fetch_winery_wines`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureWinery {
    #[serde(flatten)]
    pub winery: WineryRef,
    #[serde(default)]
    pub wines: Vec<ExternalRatingCandidate>,
}

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureData {
    /// The explore feed, paged in order
    #[serde(default)]
    pub candidates: Vec<ExternalRatingCandidate>,
    #[serde(default)]
    pub wineries: Vec<FixtureWinery>,
}

/// Offline `RatingFeed` serving candidates from memory.
#[derive(Debug, Clone)]
pub struct FixtureFeed {
    data: FixtureData,
    per_page: usize,
    offline: bool,
}

impl FixtureFeed {
    pub fn new(data: FixtureData) -> Self {
        Self {
            data,
            per_page: 50,
            offline: false,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BackendError::Connection(format!("{}: {}", path.display(), e)))?;
        let data = serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::ParseError(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(data))
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Every call fails with `Unavailable`.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }
}

impl RatingFeed for FixtureFeed {
    async fn fetch_page(&self, page: u32) -> Result<FeedPage, BackendError> {
        if self.offline {
            return Err(BackendError::Unavailable);
        }
        let start = (page.max(1) as usize - 1) * self.per_page;
        let candidates: Vec<ExternalRatingCandidate> = self
            .data
            .candidates
            .iter()
            .skip(start)
            .take(self.per_page)
            .cloned()
            .collect();

        // Wineries are reported with the first page, as a crawl would have
        // seen them by the end.
        let wineries = if page <= 1 {
            self.data.wineries.iter().map(|w| w.winery.clone()).collect()
        } else {
            Vec::new()
        };

        Ok(FeedPage {
            page,
            has_next: start + candidates.len() < self.data.candidates.len(),
            candidates,
            wineries,
            total: self.data.candidates.len(),
        })
    }

    async fn fetch_winery_wines(&self, winery: &WineryRef) -> Result<Vec<ExternalRatingCandidate>, BackendError> {
        if self.offline {
            return Err(BackendError::Unavailable);
        }
        Ok(self
            .data
            .wineries
            .iter()
            .find(|w| w.winery.id == winery.id)
            .map(|w| w.wines.clone())
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed() -> FixtureFeed {
        let data: FixtureData = serde_json::from_value(json!({
            "candidates": [
                { "wineId": 1, "wineryName": "Gato Negro", "wineNameOnly": "Chardonnay",
                  "fullName": "Gato Negro Chardonnay", "rating": 3.6, "ratingCount": 5400 },
                { "wineId": 2, "wineryName": "Tawse", "wineNameOnly": "Riesling",
                  "fullName": "Tawse Riesling", "rating": 4.0, "ratingCount": 300 },
                { "wineId": 3, "wineryName": "Tawse", "wineNameOnly": "Chardonnay",
                  "fullName": "Tawse Chardonnay", "rating": 4.1, "ratingCount": 200 }
            ],
            "wineries": [
                { "id": 88, "name": "Henry of Pelham", "seoName": "henry-of-pelham",
                  "wines": [
                    { "wineId": 9, "wineryName": "Henry of Pelham", "wineNameOnly": "Baco Noir",
                      "fullName": "Henry of Pelham Baco Noir", "rating": 3.7, "ratingCount": 820 }
                  ] }
            ]
        }))
        .unwrap();
        FixtureFeed::new(data).with_per_page(2)
    }

    #[tokio::test]
    async fn test_pages_and_wineries() {
        let feed = feed();
        let first = feed.fetch_page(1).await.unwrap();
        assert_eq!(first.candidates.len(), 2);
        assert_eq!(first.total, 3);
        assert!(first.has_next);
        assert_eq!(first.wineries.len(), 1);

        let second = feed.fetch_page(2).await.unwrap();
        assert_eq!(second.candidates.len(), 1);
        assert!(!second.has_next);
        assert!(second.wineries.is_empty());

        let winery = first.wineries[0].clone();
        let wines = feed.fetch_winery_wines(&winery).await.unwrap();
        assert_eq!(wines[0].full_name, "Henry of Pelham Baco Noir");
    }

    #[tokio::test]
    async fn test_offline_feed_fails() {
        let feed = feed().offline();
        assert!(matches!(feed.fetch_page(1).await, Err(BackendError::Unavailable)));
    }
}
