//! Catalog and signal ingestion.

use crate::{ServiceError, CATALOG_SOURCE, SIGNAL_SOURCE};
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, info, warn};
use vinolink_features::{extract_producer, extract_varietal};
use vinolink_model::{
    CatalogFeedItem, DeadLetterRecord, DeadLetterStage, QualitySignal, RunId, SignalFeedItem,
};
use vinolink_store::{CatalogStore, EntryFields, RunCompletion, StoreError};

/// Feed items split into accepted records and dead letters.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub items: Vec<T>,
    pub dead_letters: Vec<DeadLetterRecord>,
}

/// Counters of one completed sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: RunId,
    pub items_read: usize,
    pub items_written: usize,
    pub rejected_items: usize,
    /// Catalog writes resolved through the identity fallback
    pub identity_fallbacks: usize,
    /// Signal items whose SKU is not in the catalog
    pub unknown_items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SyncOutcome {
    Synced(SyncReport),
    /// The upstream feed could not be read; stored data was left untouched.
    Skipped { source: String, reason: String },
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn dead_letter(source: &str, reason: String, payload: &Value) -> DeadLetterRecord {
    DeadLetterRecord {
        source: source.to_string(),
        stage: DeadLetterStage::Sync,
        reason,
        payload: payload.clone(),
        external_id: payload
            .get("externalId")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Deserialize and validate each raw item; failures become dead letters
/// whose reason lists every offending field.
fn validate_items<T>(
    raw: &[Value],
    source: &str,
    extra_checks: impl Fn(&T) -> Vec<String>,
) -> Validated<T>
where
    T: DeserializeOwned + Validate<Context = ()>,
{
    let mut items = Vec::new();
    let mut dead_letters = Vec::new();

    for payload in raw {
        let item: T = match serde_json::from_value(payload.clone()) {
            Ok(item) => item,
            Err(e) => {
                dead_letters.push(dead_letter(source, e.to_string(), payload));
                continue;
            }
        };

        let mut problems: Vec<String> = match item.validate() {
            Ok(()) => Vec::new(),
            Err(report) => report
                .iter()
                .map(|(path, error)| format!("{}: {}", path, error))
                .collect(),
        };
        problems.extend(extra_checks(&item));

        if problems.is_empty() {
            items.push(item);
        } else {
            dead_letters.push(dead_letter(source, problems.join("; "), payload));
        }
    }

    Validated { items, dead_letters }
}

/// Validate raw catalog feed items.
pub fn validate_catalog_feed(raw: &[Value]) -> Validated<CatalogFeedItem> {
    validate_items(raw, CATALOG_SOURCE, |item: &CatalogFeedItem| {
        [("lcbo_url", &item.lcbo_url), ("vivino_url", &item.vivino_url)]
            .into_iter()
            .filter_map(|(field, url)| match url {
                Some(url) if !is_http_url(url) => Some(format!("{}: not an http(s) url", field)),
                _ => None,
            })
            .collect()
    })
}

/// Validate raw signal feed items.
pub fn validate_signal_feed(raw: &[Value]) -> Validated<SignalFeedItem> {
    validate_items(raw, SIGNAL_SOURCE, |_: &SignalFeedItem| Vec::new())
}

/// Map the varietal onto the lexicon (the feed's own value first, then the
/// name, then the description) and fill a missing producer from the name.
pub fn canonicalize(mut item: CatalogFeedItem) -> CatalogFeedItem {
    item.varietal = item
        .varietal
        .as_deref()
        .and_then(|supplied| extract_varietal(supplied, None))
        .or_else(|| extract_varietal(&item.name, item.description.as_deref()))
        .map(str::to_string);
    if item.producer.is_none() {
        item.producer = extract_producer(&item.name, item.varietal.as_deref());
    }
    item
}

/// Upsert by SKU, falling back to identity when the SKU path collides.
/// Returns whether the fallback was used.
async fn write_catalog_item<S: CatalogStore>(store: &S, item: &CatalogFeedItem) -> Result<bool, StoreError> {
    let fields = EntryFields::from_feed(item);
    let (id, fallback) = match store.upsert_by_external_id(fields.clone()).await {
        Ok(id) => (id, false),
        Err(StoreError::IdentityCollision { identity, holder }) => {
            debug!(%identity, %holder, sku = %item.external_id, "Resolving identity collision");
            (store.update_by_identity(fields).await?, true)
        }
        Err(e) => return Err(e),
    };
    store.replace_listing(id, item.listing()).await?;
    Ok(fallback)
}

/// Close a run as failed, then hand the original error back.
async fn fail_run<S: CatalogStore>(
    store: &S,
    run_id: RunId,
    items_written: usize,
    error: StoreError,
) -> ServiceError {
    let completion = RunCompletion::failed(items_written, error.to_string(), Utc::now());
    if let Err(finish_error) = store.finish_run(run_id, completion).await {
        warn!(?run_id, error = %finish_error, "Could not mark run as failed");
    }
    error.into()
}

/// Sync a catalog feed: validate, record dead letters, canonicalize, then
/// upsert entry and listing per item. Each item is written on its own, so a
/// failure keeps the items already written.
pub async fn sync_catalog<S: CatalogStore>(
    store: &S,
    raw: &[Value],
    now: DateTime<Utc>,
) -> Result<SyncReport, ServiceError> {
    let Validated { items, dead_letters } = validate_catalog_feed(raw);
    let rejected_items = dead_letters.len();

    let run_id = store
        .start_run(CATALOG_SOURCE, raw.len(), rejected_items, now)
        .await?;
    store.record_dead_letters(Some(run_id), dead_letters, now).await?;

    let mut items_written = 0;
    let mut identity_fallbacks = 0;
    for item in items.into_iter().map(canonicalize) {
        match write_catalog_item(store, &item).await {
            Ok(fallback) => {
                items_written += 1;
                identity_fallbacks += usize::from(fallback);
            }
            Err(e) => return Err(fail_run(store, run_id, items_written, e).await),
        }
    }

    store
        .finish_run(run_id, RunCompletion::completed(items_written, Utc::now()))
        .await?;
    info!(
        ?run_id,
        items_read = raw.len(),
        items_written,
        rejected_items,
        identity_fallbacks,
        "Catalog sync completed"
    );

    Ok(SyncReport {
        run_id,
        items_read: raw.len(),
        items_written,
        rejected_items,
        identity_fallbacks,
        unknown_items: 0,
    })
}

/// Sync a pre-matched signal feed keyed by SKU. Unknown SKUs are skipped.
pub async fn sync_signals<S: CatalogStore>(
    store: &S,
    raw: &[Value],
    now: DateTime<Utc>,
) -> Result<SyncReport, ServiceError> {
    let Validated { items, dead_letters } = validate_signal_feed(raw);
    let rejected_items = dead_letters.len();

    let run_id = store
        .start_run(SIGNAL_SOURCE, raw.len(), rejected_items, now)
        .await?;
    store.record_dead_letters(Some(run_id), dead_letters, now).await?;

    let mut items_written = 0;
    let mut unknown_items = 0;
    for item in items {
        let entry = match store.entry_by_external_id(&item.external_id).await {
            Ok(entry) => entry,
            Err(e) => return Err(fail_run(store, run_id, items_written, e).await),
        };
        let Some(entry) = entry else {
            unknown_items += 1;
            continue;
        };

        let signal = QualitySignal {
            wine_id: entry.id,
            source: item.source,
            rating: item.rating,
            rating_count: item.rating_count,
            confidence_score: item.confidence_score,
            fetched_at: item.fetched_at,
        };
        if let Err(e) = store.replace_signal(signal).await {
            return Err(fail_run(store, run_id, items_written, e).await);
        }
        items_written += 1;
    }

    store
        .finish_run(run_id, RunCompletion::completed(items_written, Utc::now()))
        .await?;
    info!(?run_id, items_written, rejected_items, unknown_items, "Signal sync completed");

    Ok(SyncReport {
        run_id,
        items_read: raw.len(),
        items_written,
        rejected_items,
        identity_fallbacks: 0,
        unknown_items,
    })
}

async fn fetch_or_skip<Fut, E>(source: &str, fetch: Fut) -> Result<Vec<Value>, SyncOutcome>
where
    Fut: Future<Output = Result<Vec<Value>, E>>,
    E: Display,
{
    fetch.await.map_err(|e| {
        warn!(source, error = %e, "Upstream feed unavailable, keeping last-known-good data");
        SyncOutcome::Skipped {
            source: source.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Fetch the catalog feed and sync it. An unreachable feed skips the whole
/// sync instead of writing an empty or partial catalog.
pub async fn sync_catalog_feed<S, Fut, E>(
    store: &S,
    fetch: Fut,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, ServiceError>
where
    S: CatalogStore,
    Fut: Future<Output = Result<Vec<Value>, E>>,
    E: Display,
{
    match fetch_or_skip(CATALOG_SOURCE, fetch).await {
        Ok(raw) => sync_catalog(store, &raw, now).await.map(SyncOutcome::Synced),
        Err(skipped) => Ok(skipped),
    }
}

/// Signal counterpart of `sync_catalog_feed`.
pub async fn sync_signals_feed<S, Fut, E>(
    store: &S,
    fetch: Fut,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, ServiceError>
where
    S: CatalogStore,
    Fut: Future<Output = Result<Vec<Value>, E>>,
    E: Display,
{
    match fetch_or_skip(SIGNAL_SOURCE, fetch).await {
        Ok(raw) => sync_signals(store, &raw, now).await.map(SyncOutcome::Synced),
        Err(skipped) => Ok(skipped),
    }
}
