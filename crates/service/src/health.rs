//! Ingestion health from run history and the dead-letter rate.
//!
//! Each source is judged on how long ago its last completed run finished
//! and on recent failures; the dead-letter volume of the last day is judged
//! on its own. The overall status is the worst of all of them.

use crate::{ServiceError, CATALOG_SOURCE, SIGNAL_SOURCE};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vinolink_model::{IngestionRun, RunStatus};
use vinolink_store::{CatalogStore, StoredDeadLetter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthThresholds {
    pub catalog_stale_minutes: i64,
    pub signal_stale_minutes: i64,
    /// Failed runs among the sampled runs that degrade every source
    pub max_failed_runs: usize,
    pub run_sample: usize,
    /// Dead letters per 24 hours before degrading
    pub max_dead_letters_24h: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            catalog_stale_minutes: 1440,
            signal_stale_minutes: 1440,
            max_failed_runs: 1,
            run_sample: 10,
            max_dead_letters_24h: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHealth {
    pub status: HealthStatus,
    /// `None` when the source never completed a run
    pub stale_minutes: Option<i64>,
    pub threshold_minutes: i64,
    pub latest_completed_at: Option<DateTime<Utc>>,
    pub failed_runs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterHealth {
    pub status: HealthStatus,
    pub last_24h: usize,
    pub threshold: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceHealth>,
    pub dead_letters: DeadLetterHealth,
    pub latest_runs: Vec<IngestionRun>,
    pub latest_dead_letters: Vec<StoredDeadLetter>,
    pub thresholds: HealthThresholds,
    pub summary: String,
}

/// Status of one source. A source that never completed is unhealthy, as is
/// one stale for more than twice its threshold.
pub fn compute_source_status(
    stale_minutes: Option<i64>,
    threshold_minutes: i64,
    failed_runs: usize,
    max_failed_runs: usize,
) -> HealthStatus {
    let Some(stale) = stale_minutes else {
        return HealthStatus::Unhealthy;
    };
    if stale > threshold_minutes * 2 {
        HealthStatus::Unhealthy
    } else if stale > threshold_minutes || (max_failed_runs > 0 && failed_runs >= max_failed_runs) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

pub fn dead_letter_status(count: usize, max: usize) -> HealthStatus {
    if count > max * 2 {
        HealthStatus::Unhealthy
    } else if count > max {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// The worst of `statuses`; healthy when empty.
pub fn aggregate_status(statuses: &[HealthStatus]) -> HealthStatus {
    statuses.iter().copied().max().unwrap_or(HealthStatus::Healthy)
}

fn stale_minutes(completed_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    ((now - completed_at).num_seconds() as f64 / 60.0).round() as i64
}

pub async fn current_health<S: CatalogStore>(
    store: &S,
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> Result<HealthReport, ServiceError> {
    let latest_runs = store.recent_runs(thresholds.run_sample).await?;
    let failed_runs = latest_runs
        .iter()
        .filter(|run| run.status == RunStatus::Failed)
        .count();

    let mut sources = BTreeMap::new();
    for (source, threshold) in [
        (CATALOG_SOURCE, thresholds.catalog_stale_minutes),
        (SIGNAL_SOURCE, thresholds.signal_stale_minutes),
    ] {
        let latest_completed_at = store
            .last_completed_run(source)
            .await?
            .and_then(|run| run.completed_at);
        let stale = latest_completed_at.map(|at| stale_minutes(at, now));
        sources.insert(
            source.to_string(),
            SourceHealth {
                status: compute_source_status(stale, threshold, failed_runs, thresholds.max_failed_runs),
                stale_minutes: stale,
                threshold_minutes: threshold,
                latest_completed_at,
                failed_runs,
            },
        );
    }

    let mut recent_letters = store.dead_letters_since(now - Duration::hours(24)).await?;
    let dead_letters = DeadLetterHealth {
        status: dead_letter_status(recent_letters.len(), thresholds.max_dead_letters_24h),
        last_24h: recent_letters.len(),
        threshold: thresholds.max_dead_letters_24h,
    };
    recent_letters.truncate(thresholds.run_sample);

    let mut statuses: Vec<HealthStatus> = sources.values().map(|s| s.status).collect();
    statuses.push(dead_letters.status);
    let status = aggregate_status(&statuses);

    let summary = match status {
        HealthStatus::Healthy => "All ingestion sources are healthy".to_string(),
        _ => {
            let mut problems: Vec<String> = sources
                .iter()
                .filter(|(_, health)| health.status != HealthStatus::Healthy)
                .map(|(source, health)| match health.stale_minutes {
                    Some(stale) => format!("{} is {:?} ({} min since last run)", source, health.status, stale),
                    None => format!("{} has never completed a run", source),
                })
                .collect();
            if dead_letters.status != HealthStatus::Healthy {
                problems.push(format!("{} dead letters in the last 24h", dead_letters.last_24h));
            }
            problems.join("; ")
        }
    };

    Ok(HealthReport {
        status,
        checked_at: now,
        sources,
        dead_letters,
        latest_runs,
        latest_dead_letters: recent_letters,
        thresholds: thresholds.clone(),
        summary,
    })
}
