use crate::ServiceError;
use std::collections::HashMap;
use tracing::debug;
use vinolink_model::{RecommendationFilter, RecommendationResponse, SignalSource};
use vinolink_query::{parse_filters, parse_query_string};
use vinolink_ranking::{rank, CandidateWine, RankingConfig};
use vinolink_store::CatalogStore;

/// Rank every stored entry, paired with its Vivino signal, for `filter`.
pub async fn recommend<S: CatalogStore>(
    store: &S,
    filter: &RecommendationFilter,
    config: &RankingConfig,
) -> Result<RecommendationResponse, ServiceError> {
    let mut signals: HashMap<_, _> = store
        .signals()
        .await?
        .into_iter()
        .filter(|s| s.source == SignalSource::Vivino)
        .map(|s| (s.wine_id, s))
        .collect();

    let candidates: Vec<CandidateWine> = store
        .entries()
        .await?
        .into_iter()
        .map(|entry| CandidateWine {
            signal: signals.remove(&entry.id),
            entry,
        })
        .collect();

    let response = rank(&candidates, filter, config);
    debug!(
        pool = candidates.len(),
        returned = response.recommendations.len(),
        fallback = response.store_fallback_applied,
        "Recommendations ranked"
    );
    Ok(response)
}

/// `recommend` for a raw `a=1&b=2` query string.
pub async fn recommend_query<S: CatalogStore>(
    store: &S,
    raw_query: &str,
    config: &RankingConfig,
) -> Result<RecommendationResponse, ServiceError> {
    let params = parse_query_string(raw_query)?;
    let filter = parse_filters(&params)?;
    recommend(store, &filter, config).await
}
