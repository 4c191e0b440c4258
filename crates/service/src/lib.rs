//! Orchestration of syncs, match runs and queries over a `CatalogStore`.
//!
//! - `ingest`: catalog and signal feeds (validation, dead letters, upserts)
//! - `matching`: crawl the ratings feed, broad and expansion passes
//! - `cleanup` / `backfill`: maintenance passes over stored data
//! - `health`: ingestion health from run history and dead letters
//! - `recommend`: ranked recommendations from stored entries and signals

pub mod backfill;
pub mod cleanup;
pub mod health;
pub mod ingest;
pub mod matching;
pub mod recommend;

pub use backfill::{backfill_attributes, BackfillReport};
pub use cleanup::{cleanup_duplicate_matches, CleanupReport};
pub use health::{
    aggregate_status, compute_source_status, current_health, dead_letter_status, HealthReport,
    HealthStatus, HealthThresholds, SourceHealth,
};
pub use ingest::{
    canonicalize, sync_catalog, sync_catalog_feed, sync_signals, sync_signals_feed,
    validate_catalog_feed, validate_signal_feed, SyncOutcome, SyncReport, Validated,
};
pub use matching::{run_matching, MatchOutcome, MatchPass, MatchReport, MatchRunOptions, MatchSample};
pub use recommend::{recommend, recommend_query};

use thiserror::Error;
use vinolink_backend_vivino::BackendError;
use vinolink_query::QueryError;
use vinolink_store::StoreError;

/// Run source recorded for catalog syncs.
pub const CATALOG_SOURCE: &str = "lcbo_catalog";

/// Run source recorded for signal syncs and match runs.
pub const SIGNAL_SOURCE: &str = "vivino_signals";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Query(#[from] QueryError),
}
