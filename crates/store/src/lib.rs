//! Persistence for the catalog, quality signals and ingestion bookkeeping.
//!
//! Provides the `CatalogStore` trait and an in-memory implementation that can
//! snapshot itself to a JSON file. Sync and matching code only talk to the
//! trait, so a database-backed store can replace it without touching them.
//!
//! Uniqueness rules the store enforces:
//! - at most one entry per retailer SKU (`external_id`)
//! - at most one entry per `WineIdentity`
//! - at most one signal per `(wine_id, source)`

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use vinolink_model::{
    producer_label, varietal_label, CatalogEntry, CatalogFeedItem, DeadLetterRecord, IngestionRun,
    QualitySignal, RunId, RunStatus, SignalSource, StoreListing, WineId, WineIdentity, WineType,
};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Identity already held by {holder}: {identity}")]
    IdentityCollision {
        identity: WineIdentity,
        holder: WineId,
    },

    #[error("No wine with identity {0}")]
    IdentityNotFound(WineIdentity),

    #[error("Wine not found: {0}")]
    WineNotFound(WineId),

    #[error("Ingestion run not found: {0:?}")]
    RunNotFound(RunId),

    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wine-level fields written by a catalog sync. Listings are written
/// separately, one store at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFields {
    pub external_id: Option<String>,
    pub name: String,
    pub producer: Option<String>,
    pub varietal: Option<String>,
    pub wine_type: WineType,
    pub country: String,
    pub sub_region: String,
    pub region_label: String,
    /// `None` keeps whatever link the entry already has
    pub lcbo_url: Option<String>,
    /// `None` keeps whatever link the entry already has
    pub vivino_url: Option<String>,
}

impl EntryFields {
    pub fn from_feed(item: &CatalogFeedItem) -> Self {
        Self {
            external_id: Some(item.external_id.clone()),
            name: item.name.clone(),
            producer: item.producer.clone(),
            varietal: item.varietal.clone(),
            wine_type: item.wine_type,
            country: item.country.clone(),
            sub_region: item.sub_region.clone(),
            region_label: item.region_label.clone(),
            lcbo_url: item.lcbo_url.clone(),
            vivino_url: item.vivino_url.clone(),
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

/// A dead letter as persisted, with the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDeadLetter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub letter: DeadLetterRecord,
}

/// Final state of an ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub items_written: usize,
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl RunCompletion {
    pub fn completed(items_written: usize, completed_at: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Completed,
            items_written,
            error_message: None,
            completed_at,
        }
    }

    pub fn failed(items_written: usize, error: impl Into<String>, completed_at: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Failed,
            items_written,
            error_message: Some(error.into()),
            completed_at,
        }
    }
}

/// Storage seam for catalog entries, signals and ingestion runs.
///
/// Every write is its own atomic unit; there is no run-wide transaction.
pub trait CatalogStore: Send + Sync {
    /// All entries, ordered by id.
    fn entries(&self) -> impl Future<Output = Result<Vec<CatalogEntry>, StoreError>> + Send;

    fn entry(&self, id: WineId)
        -> impl Future<Output = Result<Option<CatalogEntry>, StoreError>> + Send;

    fn entry_by_external_id(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<CatalogEntry>, StoreError>> + Send;

    /// Create or update the entry owning `fields.external_id`. Fails with
    /// `IdentityCollision` when the resulting identity belongs to another entry.
    fn upsert_by_external_id(
        &self,
        fields: EntryFields,
    ) -> impl Future<Output = Result<WineId, StoreError>> + Send;

    /// Update the entry found by `fields.identity()`. An SKU already on that
    /// entry is kept.
    fn update_by_identity(
        &self,
        fields: EntryFields,
    ) -> impl Future<Output = Result<WineId, StoreError>> + Send;

    /// Delete-then-create of the entry's listing at `listing.store_code`.
    fn replace_listing(
        &self,
        id: WineId,
        listing: StoreListing,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Rewrite producer and varietal, keeping identities unique.
    fn update_attributes(
        &self,
        id: WineId,
        producer: Option<String>,
        varietal: Option<String>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn set_vivino_url(
        &self,
        id: WineId,
        url: Option<String>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn signals(&self) -> impl Future<Output = Result<Vec<QualitySignal>, StoreError>> + Send;

    fn signal(
        &self,
        id: WineId,
        source: SignalSource,
    ) -> impl Future<Output = Result<Option<QualitySignal>, StoreError>> + Send;

    /// Replace-on-write per `(wine_id, source)`.
    fn replace_signal(
        &self,
        signal: QualitySignal,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns whether a signal was removed.
    fn remove_signal(
        &self,
        id: WineId,
        source: SignalSource,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn record_dead_letters(
        &self,
        run_id: Option<RunId>,
        letters: Vec<DeadLetterRecord>,
        received_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Dead letters received at or after `since`, newest first.
    fn dead_letters_since(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<StoredDeadLetter>, StoreError>> + Send;

    /// Open a run in the `Running` state.
    fn start_run(
        &self,
        source: &str,
        items_read: usize,
        rejected_items: usize,
        started_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<RunId, StoreError>> + Send;

    fn finish_run(
        &self,
        id: RunId,
        completion: RunCompletion,
    ) -> impl Future<Output = Result<IngestionRun, StoreError>> + Send;

    /// Latest runs across all sources, newest first.
    fn recent_runs(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<IngestionRun>, StoreError>> + Send;

    fn last_completed_run(
        &self,
        source: &str,
    ) -> impl Future<Output = Result<Option<IngestionRun>, StoreError>> + Send;
}
