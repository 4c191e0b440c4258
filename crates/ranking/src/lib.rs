//! Trust-tiered ranking of catalog wines.
//!
//! Every wine that survives the filters lands in exactly one tier:
//! a trusted direct match, a producer-average estimate, or unrated.
//! Tiers are concatenated in that order, so an estimate never outranks a
//! verified rating whatever the numbers say.

mod cohort;

pub use cohort::{CohortKey, ProducerCohorts};

use std::cmp::Ordering;
use tracing::debug;
use vinolink_explain::{explain_recommendation, lcbo_link, resolve_vivino_url, RecommendationContext};
use vinolink_model::{
    CatalogEntry, QualitySignal, RatingBasis, RatingSource, RecommendationFilter,
    RecommendationResponse, RecommendationWine, StockConfidence, StoreListing,
};

/// Configuration for the ranking engine.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Minimum match confidence for a signal to count as a direct rating
    pub trust_floor: f32,
    /// Trusted wines a cohort needs before its average is used
    pub producer_avg_min_sample: usize,
    /// Normalized producer names too ambiguous to average over
    pub generic_producers: Vec<String>,
    /// Display score for wines without a direct rating
    pub unrated_match_score: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            trust_floor: 0.72,
            producer_avg_min_sample: 3,
            generic_producers: [
                "chateau", "domaine", "estate", "estates", "bodega", "bodegas", "cantina",
                "tenuta", "weingut", "quinta", "winery", "wines", "vineyards", "cellars", "cave",
                "caves", "maison", "casa", "vina",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            unrated_match_score: 3.3,
        }
    }
}

impl RankingConfig {
    pub fn is_generic_producer(&self, normalized: &str) -> bool {
        self.generic_producers.iter().any(|g| g == normalized)
    }
}

/// A catalog entry with its stored Vivino signal, if any.
#[derive(Debug, Clone)]
pub struct CandidateWine {
    pub entry: CatalogEntry,
    pub signal: Option<QualitySignal>,
}

/// Whether a match confidence is high enough to show its rating as-is.
pub fn is_trusted_signal(confidence: Option<f32>, trust_floor: f32) -> bool {
    match confidence {
        Some(confidence) if confidence.is_finite() => confidence >= trust_floor,
        _ => false,
    }
}

/// Tier of one wine. `None` when its trusted direct rating is below
/// `min_rating`: a verified low score is not replaced by a guess.
pub fn classify(
    candidate: &CandidateWine,
    cohorts: &ProducerCohorts,
    min_rating: f32,
    config: &RankingConfig,
) -> Option<RatingBasis> {
    if let Some(signal) = candidate
        .signal
        .as_ref()
        .filter(|s| is_trusted_signal(Some(s.confidence_score), config.trust_floor))
    {
        return (signal.rating >= min_rating).then_some(RatingBasis::Direct {
            rating: signal.rating,
            rating_count: signal.rating_count,
            confidence: signal.confidence_score,
        });
    }

    let average = CohortKey::for_entry(&candidate.entry, config).and_then(|key| cohorts.average(&key));
    match average {
        Some((rating, sample_size)) if rating >= min_rating => Some(RatingBasis::ProducerAverage {
            rating,
            sample_size,
        }),
        _ => Some(RatingBasis::Unrated),
    }
}

/// Displayed 0-5 score: direct rating nudged by confidence, else a flat
/// placeholder.
pub fn match_score(basis: &RatingBasis, config: &RankingConfig) -> f32 {
    match basis {
        RatingBasis::Direct {
            rating, confidence, ..
        } => (rating + confidence * 0.3).clamp(3.5, 5.0),
        _ => config.unrated_match_score,
    }
}

fn stock_rank(stock: StockConfidence) -> u8 {
    match stock {
        StockConfidence::High => 0,
        StockConfidence::Medium => 1,
    }
}

/// Tier, then stock confidence, then rating and review count (rated tiers
/// only), then name.
pub fn compare_recommendations(a: &RecommendationWine, b: &RecommendationWine) -> Ordering {
    let tier = |w: &RecommendationWine| match w.rating_source {
        RatingSource::Direct => 0,
        RatingSource::ProducerAvg => 1,
        RatingSource::Unrated => 2,
    };

    tier(a)
        .cmp(&tier(b))
        .then_with(|| stock_rank(a.stock_confidence).cmp(&stock_rank(b.stock_confidence)))
        .then_with(|| {
            b.rating
                .unwrap_or(0.0)
                .partial_cmp(&a.rating.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.rating_count.unwrap_or(0).cmp(&a.rating_count.unwrap_or(0)))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Which listing a wine is judged on.
#[derive(Debug, Clone, Copy)]
enum StoreScope<'a> {
    /// Only this store, and only when in stock there
    Store(&'a str),
    /// Any store, in stock somewhere
    AnyInStock,
    /// Any store; prefer an in-stock listing
    Any,
}

impl StoreScope<'_> {
    fn listing<'e>(&self, entry: &'e CatalogEntry) -> Option<&'e StoreListing> {
        match self {
            Self::Store(code) => entry.listing_at(code).filter(|l| l.in_stock),
            Self::AnyInStock => entry.listings.iter().find(|l| l.in_stock),
            Self::Any => entry.default_listing(),
        }
    }
}

fn contains_or_empty(wanted: &[String], value: &str) -> bool {
    wanted.is_empty() || wanted.iter().any(|w| w == value)
}

fn matches_search(entry: &CatalogEntry, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack = format!(
        "{} {} {} {}",
        entry.name,
        entry.producer_label(),
        entry.varietal_label(),
        entry.region_label
    )
    .to_lowercase();
    haystack.contains(needle)
}

fn build_recommendation(
    entry: &CatalogEntry,
    signal: Option<&QualitySignal>,
    listing: &StoreListing,
    basis: RatingBasis,
    config: &RankingConfig,
) -> RecommendationWine {
    let stock_confidence = if listing.in_stock {
        StockConfidence::High
    } else {
        StockConfidence::Medium
    };
    let direct_signal = match (&basis, signal) {
        (RatingBasis::Direct { .. }, Some(signal)) => Some(signal),
        _ => None,
    };
    let refreshed_at = direct_signal.map_or(listing.source_updated_at, |s| s.fetched_at);
    let why = explain_recommendation(&RecommendationContext {
        basis,
        producer: entry.producer.as_deref(),
        in_stock: listing.in_stock,
        refreshed_at,
    });
    let (lcbo_url, lcbo_link_type) =
        lcbo_link(entry.lcbo_url.as_deref(), &entry.name, entry.producer.as_deref());

    RecommendationWine {
        id: entry.id,
        name: entry.name.clone(),
        producer: entry.producer_label().to_string(),
        wine_type: entry.wine_type,
        varietal: entry.varietal_label().to_string(),
        country: entry.country.clone(),
        sub_region: entry.sub_region.clone(),
        region: entry.region_label.clone(),
        price: listing.listed_price_cents as f32 / 100.0,
        rating: basis.rating(),
        rating_count: basis.rating_count(),
        rating_source: basis.source(),
        vivino_match_confidence: direct_signal.map(|s| s.confidence_score),
        match_score: match_score(&basis, config),
        stock_confidence,
        why,
        store_id: listing.store_code.clone(),
        store_label: listing.store_label.clone(),
        lcbo_url,
        lcbo_link_type,
        vivino_url: resolve_vivino_url(
            entry.vivino_url.as_deref(),
            &entry.name,
            entry.producer.as_deref(),
            &entry.country,
        ),
    }
}

struct Ranked {
    recommendations: Vec<RecommendationWine>,
    available_countries: Vec<String>,
    available_sub_regions: Vec<String>,
}

fn rank_scope(
    candidates: &[CandidateWine],
    cohorts: &ProducerCohorts,
    filter: &RecommendationFilter,
    scope: StoreScope<'_>,
    config: &RankingConfig,
) -> Ranked {
    let type_names: Vec<String> = filter.types.iter().map(|t| t.as_str().to_string()).collect();

    let pool: Vec<(&CandidateWine, RatingBasis)> = candidates
        .iter()
        .filter(|c| contains_or_empty(&type_names, c.entry.wine_type.as_str()))
        .filter(|c| contains_or_empty(&filter.varietals, c.entry.varietal_label()))
        .filter(|c| contains_or_empty(&filter.countries, &c.entry.country))
        .filter_map(|c| classify(c, cohorts, filter.min_rating, config).map(|basis| (c, basis)))
        .collect();

    let mut available_countries: Vec<String> =
        pool.iter().map(|(c, _)| c.entry.country.clone()).collect();
    available_countries.sort();
    available_countries.dedup();
    let mut available_sub_regions: Vec<String> =
        pool.iter().map(|(c, _)| c.entry.sub_region.clone()).collect();
    available_sub_regions.sort();
    available_sub_regions.dedup();

    let mut recommendations: Vec<RecommendationWine> = pool
        .into_iter()
        .filter(|(c, _)| contains_or_empty(&filter.sub_regions, &c.entry.sub_region))
        .filter(|(c, _)| matches_search(&c.entry, &filter.search))
        .filter_map(|(c, basis)| {
            let listing = scope.listing(&c.entry)?;
            let price = listing.listed_price_cents as f32 / 100.0;
            if price < filter.min_price || price > filter.max_price {
                return None;
            }
            Some(build_recommendation(&c.entry, c.signal.as_ref(), listing, basis, config))
        })
        .collect();

    recommendations.sort_by(compare_recommendations);

    Ranked {
        recommendations,
        available_countries,
        available_sub_regions,
    }
}

pub const QUALITY_RULE: &str = "Wines with a trusted Vivino match must be rated at or above the minimum rating; \
     producer estimates below it are shown as unrated.";

pub const RANKING_RULE: &str = "Direct Vivino matches first, then producer-average estimates, then unrated wines; \
     within each group in-stock wines lead, then rating (desc) and review count (desc).";

/// Rank the candidate pool for a filter, widening to every store when the
/// requested store has nothing in stock.
pub fn rank(
    candidates: &[CandidateWine],
    filter: &RecommendationFilter,
    config: &RankingConfig,
) -> RecommendationResponse {
    let mut query = filter.clone();
    query.search = query.search.trim().to_lowercase();
    query.store_id = query
        .store_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let cohorts = ProducerCohorts::build(candidates, config);

    let scope = match query.store_id.as_deref() {
        Some(store) => StoreScope::Store(store),
        None => StoreScope::Any,
    };
    let mut ranked = rank_scope(candidates, &cohorts, &query, scope, config);

    let mut store_fallback_applied = false;
    let mut store_fallback_note = None;
    if let Some(store) = query.store_id.as_deref() {
        if ranked.recommendations.is_empty() {
            let wider = rank_scope(candidates, &cohorts, &query, StoreScope::AnyInStock, config);
            debug!(
                store,
                widened = wider.recommendations.len(),
                "no in-stock matches at store, widening"
            );
            if !wider.recommendations.is_empty() {
                store_fallback_applied = true;
                store_fallback_note = Some(format!(
                    "No matching wines are in stock at store {}; showing wines in stock at other stores.",
                    store
                ));
                ranked = wider;
            }
        }
    }

    RecommendationResponse {
        query,
        available_countries: ranked.available_countries,
        available_sub_regions: ranked.available_sub_regions,
        quality_rule: QUALITY_RULE.to_string(),
        ranking_rule: RANKING_RULE.to_string(),
        store_fallback_applied,
        store_fallback_note,
        recommendations: ranked.recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use vinolink_model::{SignalSource, WineId, WineType};

    fn listing(store: &str, price_cents: u32, in_stock: bool) -> StoreListing {
        StoreListing {
            store_code: store.to_string(),
            store_label: format!("Store {}", store),
            store_city: None,
            listed_price_cents: price_cents,
            inventory_quantity: if in_stock { 6 } else { 0 },
            in_stock,
            source_updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn wine(id: u64, name: &str, producer: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            id: WineId(id),
            external_id: Some(id.to_string()),
            name: name.to_string(),
            producer: producer.map(str::to_string),
            varietal: None,
            wine_type: WineType::Red,
            country: "Canada".to_string(),
            sub_region: "Ontario".to_string(),
            region_label: "Canada - Ontario".to_string(),
            lcbo_url: None,
            vivino_url: None,
            listings: vec![listing("store-a", 3000, true)],
        }
    }

    fn signal(id: u64, rating: f32, count: u32, confidence: f32) -> QualitySignal {
        QualitySignal {
            wine_id: WineId(id),
            source: SignalSource::Vivino,
            rating,
            rating_count: count,
            confidence_score: confidence,
            fetched_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    fn candidate(entry: CatalogEntry, signal: Option<QualitySignal>) -> CandidateWine {
        CandidateWine { entry, signal }
    }

    fn filter() -> RecommendationFilter {
        RecommendationFilter::default().with_price_range(10.0, 100.0)
    }

    fn ids(response: &RecommendationResponse) -> Vec<u64> {
        response.recommendations.iter().map(|w| w.id.0).collect()
    }

    #[test]
    fn test_trusted_signal_threshold() {
        assert!(!is_trusted_signal(Some(0.71), 0.72));
        assert!(is_trusted_signal(Some(0.72), 0.72));
        assert!(!is_trusted_signal(None, 0.72));
        assert!(!is_trusted_signal(Some(f32::NAN), 0.72));
    }

    #[test]
    fn test_trusted_matches_first_and_search_only_fallback_kept() {
        let candidates = vec![
            candidate(wine(1, "Trusted Match", Some("Alpha")), Some(signal(1, 4.4, 150, 0.82))),
            candidate(wine(2, "Low Rated Trusted", Some("Beta")), Some(signal(2, 3.8, 180, 0.81))),
            candidate(wine(3, "Fallback Search", None), None),
        ];
        let response = rank(&candidates, &filter().with_store("store-a"), &RankingConfig::default());
        assert_eq!(ids(&response), vec![1, 3]);
        assert_eq!(response.recommendations[1].rating_source, RatingSource::Unrated);
        assert!(!response.store_fallback_applied);
    }

    #[test]
    fn test_direct_outranks_higher_producer_average() {
        let mut candidates = vec![candidate(
            wine(1, "Direct Red", Some("Gamma")),
            Some(signal(1, 3.9, 40, 0.9)),
        )];
        for id in 10..13 {
            candidates.push(candidate(
                wine(id, &format!("Tawse Wine {}", id), Some("Tawse")),
                Some(signal(id, 4.8, 100, 0.9)),
            ));
        }
        candidates.push(candidate(wine(20, "Tawse Unmatched", Some("Tawse")), None));

        let response = rank(&candidates, &filter().with_min_rating(3.5), &RankingConfig::default());
        let sources: Vec<RatingSource> =
            response.recommendations.iter().map(|w| w.rating_source).collect();
        let last = response.recommendations.last().unwrap();
        assert_eq!(last.id, WineId(20));
        assert_eq!(last.rating_source, RatingSource::ProducerAvg);
        assert_eq!(last.rating, Some(4.8));
        assert_eq!(last.rating_count, None);
        assert_eq!(
            sources,
            vec![
                RatingSource::Direct,
                RatingSource::Direct,
                RatingSource::Direct,
                RatingSource::Direct,
                RatingSource::ProducerAvg
            ]
        );
        // 3.9 direct still above the 4.8 estimate
        assert!(response.recommendations.iter().position(|w| w.id == WineId(1)).unwrap() < 4);
    }

    #[test]
    fn test_producer_average_needs_sample_and_specific_producer() {
        let mut candidates = Vec::new();
        for id in 1..3 {
            candidates.push(candidate(
                wine(id, &format!("Small {}", id), Some("Small Producer")),
                Some(signal(id, 4.5, 10, 0.9)),
            ));
        }
        candidates.push(candidate(wine(5, "Small Unmatched", Some("Small Producer")), None));
        for id in 10..14 {
            candidates.push(candidate(
                wine(id, &format!("Generic {}", id), Some("Chateau")),
                Some(signal(id, 4.5, 10, 0.9)),
            ));
        }
        candidates.push(candidate(wine(20, "Generic Unmatched", Some("Château")), None));

        let config = RankingConfig::default();
        let cohorts = ProducerCohorts::build(&candidates, &config);
        let small = candidates.iter().find(|c| c.entry.id == WineId(5)).unwrap();
        let generic = candidates.iter().find(|c| c.entry.id == WineId(20)).unwrap();
        assert_eq!(classify(small, &cohorts, 4.0, &config), Some(RatingBasis::Unrated));
        assert_eq!(classify(generic, &cohorts, 4.0, &config), Some(RatingBasis::Unrated));
    }

    #[test]
    fn test_untrusted_signal_does_not_feed_cohort() {
        let mut candidates = Vec::new();
        for id in 1..4 {
            candidates.push(candidate(
                wine(id, &format!("Weak {}", id), Some("Weak")),
                Some(signal(id, 4.6, 10, 0.6)),
            ));
        }
        let config = RankingConfig::default();
        let cohorts = ProducerCohorts::build(&candidates, &config);
        assert!(cohorts.is_empty());
        assert_eq!(classify(&candidates[0], &cohorts, 4.0, &config), Some(RatingBasis::Unrated));
    }

    #[test]
    fn test_min_rating_is_inclusive() {
        let candidates = vec![
            candidate(wine(1, "At Threshold", Some("A")), Some(signal(1, 4.0, 10, 0.9))),
            candidate(wine(2, "Just Below", Some("B")), Some(signal(2, 3.99, 10, 0.9))),
        ];
        let response = rank(&candidates, &filter(), &RankingConfig::default());
        assert_eq!(ids(&response), vec![1]);
    }

    #[test]
    fn test_stock_then_rating_then_count_within_tier() {
        let mut out_of_stock = wine(1, "Out Of Stock", Some("A"));
        out_of_stock.listings = vec![listing("store-a", 3000, false)];
        let candidates = vec![
            candidate(out_of_stock, Some(signal(1, 4.9, 500, 0.9))),
            candidate(wine(2, "Fewer Reviews", Some("B")), Some(signal(2, 4.3, 10, 0.9))),
            candidate(wine(3, "More Reviews", Some("C")), Some(signal(3, 4.3, 900, 0.9))),
            candidate(wine(4, "Best Rated", Some("D")), Some(signal(4, 4.6, 5, 0.9))),
        ];
        let response = rank(&candidates, &filter(), &RankingConfig::default());
        assert_eq!(ids(&response), vec![4, 3, 2, 1]);
        assert_eq!(response.recommendations[3].stock_confidence, StockConfidence::Medium);
    }

    #[test]
    fn test_unrated_tier_sorted_by_name() {
        let candidates = vec![
            candidate(wine(1, "Zinfandel Thing", None), None),
            candidate(wine(2, "Albarino Thing", None), None),
        ];
        let response = rank(&candidates, &filter(), &RankingConfig::default());
        assert_eq!(ids(&response), vec![2, 1]);
        assert_eq!(response.recommendations[0].match_score, 3.3);
    }

    #[test]
    fn test_store_fallback_widens_to_other_stores() {
        let mut elsewhere = wine(1, "Other Store Trusted", Some("A"));
        elsewhere.listings = vec![listing("store-b", 3000, true)];
        let candidates = vec![candidate(elsewhere, Some(signal(1, 4.2, 210, 0.9)))];

        let response = rank(&candidates, &filter().with_store("store-a"), &RankingConfig::default());
        assert!(response.store_fallback_applied);
        assert!(response.store_fallback_note.is_some());
        assert_eq!(ids(&response), vec![1]);
        assert_eq!(response.recommendations[0].store_id, "store-b");
    }

    #[test]
    fn test_store_fallback_requires_stock_somewhere() {
        let mut nowhere = wine(1, "Not In Stock", Some("A"));
        nowhere.listings = vec![listing("store-b", 3000, false)];
        let candidates = vec![candidate(nowhere, Some(signal(1, 4.2, 210, 0.9)))];

        let response = rank(&candidates, &filter().with_store("store-a"), &RankingConfig::default());
        assert!(!response.store_fallback_applied);
        assert!(response.recommendations.is_empty());
    }

    #[test]
    fn test_filters_and_available_facets() {
        let mut white = wine(1, "Cloudy Bay Sauvignon Blanc", Some("Cloudy Bay"));
        white.wine_type = WineType::White;
        white.country = "New Zealand".to_string();
        white.sub_region = "Marlborough".to_string();
        white.varietal = Some("Sauvignon Blanc".to_string());
        let mut pricey = wine(2, "Expensive Red", Some("B"));
        pricey.listings = vec![listing("store-a", 25_000, true)];
        let candidates = vec![
            candidate(white, Some(signal(1, 4.2, 900, 0.9))),
            candidate(pricey, Some(signal(2, 4.5, 100, 0.9))),
            candidate(wine(3, "Plain Red", Some("C")), Some(signal(3, 4.1, 100, 0.9))),
        ];

        let response = rank(&candidates, &filter(), &RankingConfig::default());
        assert_eq!(ids(&response), vec![1, 3]);
        assert_eq!(response.available_countries, vec!["Canada", "New Zealand"]);

        let whites = rank(
            &candidates,
            &filter().with_types(vec![WineType::White]),
            &RankingConfig::default(),
        );
        assert_eq!(ids(&whites), vec![1]);
        assert_eq!(whites.available_sub_regions, vec!["Marlborough"]);

        let mut searched = filter();
        searched.search = "  CLOUDY ".to_string();
        assert_eq!(ids(&rank(&candidates, &searched, &RankingConfig::default())), vec![1]);

        let mut by_varietal = filter();
        by_varietal.varietals = vec!["Blend".to_string()];
        assert_eq!(ids(&rank(&candidates, &by_varietal, &RankingConfig::default())), vec![3]);
    }

    #[test]
    fn test_recommendation_fields() {
        let candidates = vec![candidate(
            wine(1, "Tawse Cabernet Franc Icewine VQA", Some("Tawse")),
            Some(signal(1, 4.4, 150, 0.8)),
        )];
        let response = rank(&candidates, &filter(), &RankingConfig::default());
        let top = &response.recommendations[0];
        assert_eq!(top.price, 30.0);
        assert!((top.match_score - 4.64).abs() < 1e-4);
        assert_eq!(top.vivino_match_confidence, Some(0.8));
        assert_eq!(top.why[0], "Vivino 4.4 with 150 reviews");
        assert_eq!(top.why[2], "Source refreshed 2025-02-01");
        assert!(top.vivino_url.starts_with("https://www.vivino.com/search/wines?q="));
        assert_eq!(response.quality_rule, QUALITY_RULE);
    }

    #[test]
    fn test_match_confidence_only_on_direct_tier() {
        let mut candidates: Vec<CandidateWine> = (10..13)
            .map(|id| {
                candidate(
                    wine(id, &format!("Tawse Wine {}", id), Some("Tawse")),
                    Some(signal(id, 4.5, 100, 0.9)),
                )
            })
            .collect();
        candidates.push(candidate(
            wine(20, "Tawse Loose Match", Some("Tawse")),
            Some(signal(20, 3.1, 12, 0.6)),
        ));
        candidates.push(candidate(
            wine(30, "Lonely Loose Match", Some("Omega")),
            Some(signal(30, 4.9, 12, 0.6)),
        ));

        let response = rank(&candidates, &filter(), &RankingConfig::default());
        let confidence = |id: u64| {
            let wine = response.recommendations.iter().find(|w| w.id == WineId(id)).unwrap();
            (wine.rating_source, wine.vivino_match_confidence)
        };
        assert_eq!(confidence(10), (RatingSource::Direct, Some(0.9)));
        assert_eq!(confidence(20), (RatingSource::ProducerAvg, None));
        assert_eq!(confidence(30), (RatingSource::Unrated, None));
    }
}
