//! Core domain model for vinolink wine recommendations.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `CatalogFeedItem` / `CatalogEntry`: retailer products and their store listings
//! - `ExternalRatingCandidate`: a wine record from the ratings source
//! - `QualitySignal`: the persisted result of a cross-source match
//! - `RecommendationFilter` / `RecommendationResponse`: the query contract
//!
//! Varietal and producer are `Option<String>` internally. The `sentinel`
//! serde adapters write them as `"Blend"` / `"Unknown Producer"` so stored
//! data keeps its historical shape.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display/storage label for a wine with no recognised grape.
pub const BLEND: &str = "Blend";

/// Display/storage label for a wine whose producer could not be inferred.
pub const UNKNOWN_PRODUCER: &str = "Unknown Producer";

/// Parse a stored varietal label, folding the `"Blend"` sentinel to `None`.
pub fn parse_varietal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(BLEND) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a stored producer label, folding the `"Unknown Producer"` sentinel to `None`.
pub fn parse_producer(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN_PRODUCER) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn varietal_label(varietal: Option<&str>) -> &str {
    varietal.unwrap_or(BLEND)
}

pub fn producer_label(producer: Option<&str>) -> &str {
    producer.unwrap_or(UNKNOWN_PRODUCER)
}

/// Serde adapters that map `Option<String>` to the legacy sentinel strings.
pub mod sentinel {
    pub mod varietal {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(crate::varietal_label(value.as_deref()))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
            let raw = Option::<String>::deserialize(d)?;
            Ok(raw.as_deref().and_then(crate::parse_varietal))
        }
    }

    pub mod producer {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(crate::producer_label(value.as_deref()))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
            let raw = Option::<String>::deserialize(d)?;
            Ok(raw.as_deref().and_then(crate::parse_producer))
        }
    }
}

/// Retail wine category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WineType {
    Red,
    White,
    Rose,
    Bubbly,
    Other,
}

impl Default for WineType {
    fn default() -> Self {
        Self::Other
    }
}

impl WineType {
    pub const ALL: [WineType; 5] = [Self::Red, Self::White, Self::Rose, Self::Bubbly, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::White => "White",
            Self::Rose => "Rose",
            Self::Bubbly => "Bubbly",
            Self::Other => "Other",
        }
    }

    /// Strict parse of one of the five labels (case-insensitive).
    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl From<&str> for WineType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "red" | "red wine" => Self::Red,
            "white" | "white wine" => Self::White,
            "rose" | "rosé" | "rose wine" | "rosé wine" => Self::Rose,
            "bubbly" | "sparkling" | "sparkling wine" | "champagne" => Self::Bubbly,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for WineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store-assigned identifier of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WineId(pub u64);

impl fmt::Display for WineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wine-{}", self.0)
    }
}

/// One record from the retailer catalog feed: a product at a store at a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFeedItem {
    #[garde(length(min = 1))]
    pub external_id: String,

    #[garde(length(min = 1))]
    pub name: String,

    /// Producer as supplied by the feed; the retailer rarely fills it.
    #[serde(default, with = "sentinel::producer")]
    #[garde(skip)]
    pub producer: Option<String>,

    #[serde(rename = "type")]
    #[garde(skip)]
    pub wine_type: WineType,

    #[serde(default, with = "sentinel::varietal")]
    #[garde(skip)]
    pub varietal: Option<String>,

    /// Marketing copy, used as a second source for varietal extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub description: Option<String>,

    #[garde(length(min = 1))]
    pub country: String,

    #[garde(length(min = 1))]
    pub sub_region: String,

    #[garde(length(min = 1))]
    pub region_label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(url)]
    pub lcbo_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(url)]
    pub vivino_url: Option<String>,

    #[garde(length(min = 1))]
    pub store_code: String,

    #[garde(length(min = 1))]
    pub store_label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1))]
    pub store_city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(range(min = -90.0, max = 90.0))]
    pub store_latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(range(min = -180.0, max = 180.0))]
    pub store_longitude: Option<f64>,

    #[garde(skip)]
    pub listed_price_cents: u32,

    #[garde(skip)]
    pub inventory_quantity: u32,

    #[garde(skip)]
    pub in_stock: bool,

    #[garde(skip)]
    pub source_updated_at: DateTime<Utc>,
}

impl CatalogFeedItem {
    /// The per-store part of this feed item.
    pub fn listing(&self) -> StoreListing {
        StoreListing {
            store_code: self.store_code.clone(),
            store_label: self.store_label.clone(),
            store_city: self.store_city.clone(),
            listed_price_cents: self.listed_price_cents,
            inventory_quantity: self.inventory_quantity,
            in_stock: self.in_stock,
            source_updated_at: self.source_updated_at,
        }
    }

    pub fn identity(&self) -> WineIdentity {
        WineIdentity {
            name: self.name.clone(),
            producer: producer_label(self.producer.as_deref()).to_string(),
            varietal: varietal_label(self.varietal.as_deref()).to_string(),
            country: self.country.clone(),
            sub_region: self.sub_region.clone(),
        }
    }
}

/// Availability and price of a wine at one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreListing {
    pub store_code: String,
    pub store_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_city: Option<String>,
    pub listed_price_cents: u32,
    pub inventory_quantity: u32,
    pub in_stock: bool,
    pub source_updated_at: DateTime<Utc>,
}

/// Secondary uniqueness key of a catalog entry, used when the SKU is absent
/// or changes between syncs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WineIdentity {
    pub name: String,
    pub producer: String,
    pub varietal: String,
    pub country: String,
    pub sub_region: String,
}

impl fmt::Display for WineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {} / {}",
            self.name, self.producer, self.varietal, self.country, self.sub_region
        )
    }
}

/// A canonicalized wine as held by the catalog store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: WineId,

    /// Retailer SKU (stable identity anchor when present)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    pub name: String,

    #[serde(default, with = "sentinel::producer")]
    pub producer: Option<String>,

    #[serde(default, with = "sentinel::varietal")]
    pub varietal: Option<String>,

    #[serde(rename = "type")]
    pub wine_type: WineType,

    pub country: String,

    pub sub_region: String,

    #[serde(default)]
    pub region_label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcbo_url: Option<String>,

    /// Direct or search Vivino URL. Direct links are only written by
    /// link-worthy matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vivino_url: Option<String>,

    #[serde(default)]
    pub listings: Vec<StoreListing>,
}

impl CatalogEntry {
    pub fn identity(&self) -> WineIdentity {
        WineIdentity {
            name: self.name.clone(),
            producer: self.producer_label().to_string(),
            varietal: self.varietal_label().to_string(),
            country: self.country.clone(),
            sub_region: self.sub_region.clone(),
        }
    }

    pub fn producer_label(&self) -> &str {
        producer_label(self.producer.as_deref())
    }

    pub fn varietal_label(&self) -> &str {
        varietal_label(self.varietal.as_deref())
    }

    /// Listing at a specific store, if the wine is carried there.
    pub fn listing_at(&self, store_code: &str) -> Option<&StoreListing> {
        self.listings.iter().find(|l| l.store_code == store_code)
    }

    /// Listing used when no store is requested: first in-stock, else first.
    pub fn default_listing(&self) -> Option<&StoreListing> {
        self.listings
            .iter()
            .find(|l| l.in_stock)
            .or_else(|| self.listings.first())
    }
}

/// One wine record from the ratings source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRatingCandidate {
    /// Source-native wine id
    pub wine_id: u64,
    pub winery_name: String,
    pub wine_name_only: String,
    /// Denormalized display name, used as the 1:1 claim key
    pub full_name: String,
    pub rating: f32,
    pub rating_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
}

impl ExternalRatingCandidate {
    /// Create a candidate whose display name is `"<winery> <wine>"`.
    pub fn new(
        wine_id: u64,
        winery_name: impl Into<String>,
        wine_name_only: impl Into<String>,
        rating: f32,
        rating_count: u32,
    ) -> Self {
        let winery_name = winery_name.into();
        let wine_name_only = wine_name_only.into();
        let full_name = format!("{} {}", winery_name, wine_name_only).trim().to_string();
        Self {
            wine_id,
            winery_name,
            wine_name_only,
            full_name,
            rating,
            rating_count,
            direct_url: None,
            region: String::new(),
            country: String::new(),
        }
    }

    pub fn with_direct_url(mut self, url: impl Into<String>) -> Self {
        self.direct_url = Some(url.into());
        self
    }

    /// Zero-signal candidates can never back a rating.
    pub fn is_eligible(&self) -> bool {
        self.rating > 0.0 && self.rating_count > 0
    }

    pub fn claim_key(&self) -> &str {
        &self.full_name
    }
}

/// A winery known to the ratings source, as seen while crawling its feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WineryRef {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub seo_name: String,
}

/// Origin of a quality signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Vivino,
}

impl Default for SignalSource {
    fn default() -> Self {
        Self::Vivino
    }
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vivino => "vivino",
        }
    }
}

/// Persisted rating attached to a catalog entry. At most one per
/// `(wine_id, source)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySignal {
    pub wine_id: WineId,
    #[serde(default)]
    pub source: SignalSource,
    pub rating: f32,
    pub rating_count: u32,
    /// Match confidence (0.0 - 1.0)
    pub confidence_score: f32,
    pub fetched_at: DateTime<Utc>,
}

/// One record from a pre-matched signal feed, keyed by retailer SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignalFeedItem {
    #[garde(length(min = 1))]
    pub external_id: String,

    #[garde(skip)]
    pub source: SignalSource,

    #[garde(range(min = 0.0, max = 5.0))]
    pub rating: f32,

    #[garde(skip)]
    pub rating_count: u32,

    #[garde(range(min = 0.0, max = 1.0))]
    pub confidence_score: f32,

    #[garde(skip)]
    pub fetched_at: DateTime<Utc>,
}

/// Pipeline stage that rejected a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadLetterStage {
    Adapter,
    Sync,
}

/// A rejected feed record preserved with its rejection reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    pub source: String,
    pub stage: DeadLetterStage,
    pub reason: String,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Book-keeping for one sync of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRun {
    pub id: RunId,
    pub source: String,
    pub status: RunStatus,
    pub items_read: usize,
    pub items_written: usize,
    pub rejected_items: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// How a recommendation's rating was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingSource {
    /// Trusted direct match
    #[serde(rename = "direct")]
    Direct,
    /// Averaged from other wines by the same producer
    #[serde(rename = "producer_avg")]
    ProducerAvg,
    /// No usable rating
    #[serde(rename = "none")]
    Unrated,
}

impl RatingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ProducerAvg => "producer_avg",
            Self::Unrated => "none",
        }
    }
}

/// The rating a recommendation is ranked on, with its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingBasis {
    Direct {
        rating: f32,
        rating_count: u32,
        confidence: f32,
    },
    ProducerAverage {
        rating: f32,
        sample_size: usize,
    },
    Unrated,
}

impl RatingBasis {
    pub fn source(&self) -> RatingSource {
        match self {
            Self::Direct { .. } => RatingSource::Direct,
            Self::ProducerAverage { .. } => RatingSource::ProducerAvg,
            Self::Unrated => RatingSource::Unrated,
        }
    }

    pub fn rating(&self) -> Option<f32> {
        match self {
            Self::Direct { rating, .. } | Self::ProducerAverage { rating, .. } => Some(*rating),
            Self::Unrated => None,
        }
    }

    /// Only direct matches carry a real review count.
    pub fn rating_count(&self) -> Option<u32> {
        match self {
            Self::Direct { rating_count, .. } => Some(*rating_count),
            _ => None,
        }
    }

    pub fn confidence(&self) -> Option<f32> {
        match self {
            Self::Direct { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }
}

/// High when confirmed in stock at the targeted (or any) store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockConfidence {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    VerifiedProduct,
    SearchFallback,
}

/// Filters accepted by the recommendation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationFilter {
    #[serde(default)]
    pub search: String,

    #[serde(default)]
    pub types: Vec<WineType>,

    #[serde(default)]
    pub varietals: Vec<String>,

    #[serde(default)]
    pub countries: Vec<String>,

    #[serde(default)]
    pub sub_regions: Vec<String>,

    #[serde(default = "default_min_price")]
    pub min_price: f32,

    #[serde(default = "default_max_price")]
    pub max_price: f32,

    /// Inclusive lower bound on the displayed rating
    #[serde(default = "default_min_rating")]
    pub min_rating: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
}

pub fn default_min_price() -> f32 {
    15.0
}

pub fn default_max_price() -> f32 {
    500.0
}

pub fn default_min_rating() -> f32 {
    4.0
}

impl Default for RecommendationFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            types: Vec::new(),
            varietals: Vec::new(),
            countries: Vec::new(),
            sub_regions: Vec::new(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            min_rating: default_min_rating(),
            store_id: None,
        }
    }
}

impl RecommendationFilter {
    pub fn with_store(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    pub fn with_min_rating(mut self, min_rating: f32) -> Self {
        self.min_rating = min_rating;
        self
    }

    pub fn with_price_range(mut self, min_price: f32, max_price: f32) -> Self {
        self.min_price = min_price;
        self.max_price = max_price;
        self
    }

    pub fn with_types(mut self, types: Vec<WineType>) -> Self {
        self.types = types;
        self
    }
}

/// One ranked wine in a recommendation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationWine {
    pub id: WineId,
    pub name: String,
    pub producer: String,
    #[serde(rename = "type")]
    pub wine_type: WineType,
    pub varietal: String,
    pub country: String,
    pub sub_region: String,
    pub region: String,
    /// Shelf price in dollars
    pub price: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    /// Absent for producer averages, which have no real review count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u32>,
    pub rating_source: RatingSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vivino_match_confidence: Option<f32>,
    pub match_score: f32,
    pub stock_confidence: StockConfidence,
    pub why: Vec<String>,
    pub store_id: String,
    pub store_label: String,
    pub lcbo_url: String,
    pub lcbo_link_type: LinkType,
    pub vivino_url: String,
}

/// Response of the recommendation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub query: RecommendationFilter,
    pub available_countries: Vec<String>,
    pub available_sub_regions: Vec<String>,
    pub quality_rule: String,
    pub ranking_rule: String,
    pub store_fallback_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_fallback_note: Option<String>,
    pub recommendations: Vec<RecommendationWine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_wine_type_from_str() {
        assert_eq!(WineType::from("RED"), WineType::Red);
        assert_eq!(WineType::from("Rosé"), WineType::Rose);
        assert_eq!(WineType::from("sparkling"), WineType::Bubbly);
        assert_eq!(WineType::from("fortified"), WineType::Other);
        assert_eq!(WineType::from_label("white"), Some(WineType::White));
        assert_eq!(WineType::from_label("orange"), None);
    }

    #[test]
    fn test_sentinels_fold_to_none() {
        assert_eq!(parse_varietal("Blend"), None);
        assert_eq!(parse_varietal(" "), None);
        assert_eq!(parse_varietal("Merlot"), Some("Merlot".to_string()));
        assert_eq!(parse_producer("unknown producer"), None);
        assert_eq!(parse_producer("Tawse"), Some("Tawse".to_string()));
    }

    #[test]
    fn test_feed_item_sentinel_round_trip() {
        let raw = json!({
            "externalId": "12345",
            "name": "Gato Negro Chardonnay",
            "producer": null,
            "type": "White",
            "varietal": "Blend",
            "country": "Chile",
            "subRegion": "Central Valley",
            "regionLabel": "Chile, Central Valley",
            "storeCode": "217",
            "storeLabel": "Queens Quay",
            "listedPriceCents": 995,
            "inventoryQuantity": 12,
            "inStock": true,
            "sourceUpdatedAt": "2025-01-01T00:00:00Z"
        });
        let item: CatalogFeedItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.producer, None);
        assert_eq!(item.varietal, None);
        assert!(item.validate().is_ok());

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["producer"], json!("Unknown Producer"));
        assert_eq!(back["varietal"], json!("Blend"));
    }

    #[test]
    fn test_feed_item_validation_rejects_empty_fields() {
        let raw = json!({
            "externalId": "",
            "name": "X",
            "type": "Red",
            "country": "Canada",
            "subRegion": "Ontario",
            "regionLabel": "Canada, Ontario",
            "storeCode": "1",
            "storeLabel": "Store",
            "storeLatitude": 123.0,
            "listedPriceCents": 1000,
            "inventoryQuantity": 1,
            "inStock": true,
            "sourceUpdatedAt": "2025-01-01T00:00:00Z"
        });
        let item: CatalogFeedItem = serde_json::from_value(raw).unwrap();
        let report = item.validate().unwrap_err();
        let fields: Vec<String> = report.iter().map(|(path, _)| path.to_string()).collect();
        assert!(fields.iter().any(|f| f.contains("external_id")));
        assert!(fields.iter().any(|f| f.contains("store_latitude")));
    }

    #[test]
    fn test_candidate_full_name_and_eligibility() {
        let c = ExternalRatingCandidate::new(7, "Gato Negro", "Chardonnay", 4.1, 120);
        assert_eq!(c.full_name, "Gato Negro Chardonnay");
        assert!(c.is_eligible());
        assert!(!ExternalRatingCandidate::new(8, "X", "Y", 0.0, 10).is_eligible());
        assert!(!ExternalRatingCandidate::new(9, "X", "Y", 4.0, 0).is_eligible());
    }

    #[test]
    fn test_rating_source_serialization() {
        assert_eq!(serde_json::to_string(&RatingSource::ProducerAvg).unwrap(), "\"producer_avg\"");
        assert_eq!(serde_json::to_string(&RatingSource::Unrated).unwrap(), "\"none\"");
    }

    #[test]
    fn test_rating_basis_accessors() {
        let direct = RatingBasis::Direct {
            rating: 4.3,
            rating_count: 210,
            confidence: 0.8,
        };
        assert_eq!(direct.source(), RatingSource::Direct);
        assert_eq!(direct.rating_count(), Some(210));

        let average = RatingBasis::ProducerAverage {
            rating: 4.1,
            sample_size: 3,
        };
        assert_eq!(average.rating(), Some(4.1));
        assert_eq!(average.rating_count(), None);
        assert_eq!(average.confidence(), None);
        assert_eq!(RatingBasis::Unrated.rating(), None);
    }

    #[test]
    fn test_default_listing_prefers_in_stock() {
        let now = Utc::now();
        let listing = |code: &str, in_stock: bool| StoreListing {
            store_code: code.into(),
            store_label: code.into(),
            store_city: None,
            listed_price_cents: 1000,
            inventory_quantity: if in_stock { 5 } else { 0 },
            in_stock,
            source_updated_at: now,
        };
        let entry = CatalogEntry {
            id: WineId(1),
            external_id: None,
            name: "X".into(),
            producer: None,
            varietal: None,
            wine_type: WineType::Red,
            country: "Canada".into(),
            sub_region: "Ontario".into(),
            region_label: String::new(),
            lcbo_url: None,
            vivino_url: None,
            listings: vec![listing("a", false), listing("b", true)],
        };
        assert_eq!(entry.default_listing().unwrap().store_code, "b");
        assert_eq!(entry.listing_at("a").unwrap().store_code, "a");
        assert_eq!(entry.producer_label(), UNKNOWN_PRODUCER);
        assert_eq!(entry.identity().varietal, BLEND);
    }
}
