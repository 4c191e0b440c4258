use crate::ServiceError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use vinolink_explain::is_direct_vivino_url;
use vinolink_model::{SignalSource, WineId};
use vinolink_store::CatalogStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub dry_run: bool,
    /// Entries pointing at a bottle page
    pub direct_urls: usize,
    pub unique_groups: usize,
    /// Bottle pages shared by more than one entry
    pub duplicate_groups: usize,
    pub kept: usize,
    pub signals_deleted: usize,
    pub urls_reset: usize,
}

/// Repair N:1 matches left by runs that predate claim arbitration: when
/// several entries share one bottle page, the entry with the most confident
/// Vivino signal keeps it and the others lose both signal and link.
///
/// Ties go to the lowest entry id.
pub async fn cleanup_duplicate_matches<S: CatalogStore>(
    store: &S,
    dry_run: bool,
) -> Result<CleanupReport, ServiceError> {
    let entries = store.entries().await?;
    let confidence: HashMap<WineId, f32> = store
        .signals()
        .await?
        .into_iter()
        .filter(|s| s.source == SignalSource::Vivino)
        .map(|s| (s.wine_id, s.confidence_score))
        .collect();

    let mut groups: BTreeMap<&str, Vec<WineId>> = BTreeMap::new();
    for entry in &entries {
        if let Some(url) = entry.vivino_url.as_deref().filter(|u| is_direct_vivino_url(Some(u))) {
            groups.entry(url).or_default().push(entry.id);
        }
    }

    let mut report = CleanupReport {
        dry_run,
        direct_urls: groups.values().map(Vec::len).sum(),
        unique_groups: groups.len(),
        ..CleanupReport::default()
    };

    for (url, mut ids) in groups {
        if ids.len() < 2 {
            continue;
        }
        report.duplicate_groups += 1;
        report.kept += 1;

        let score = |id: &WineId| confidence.get(id).copied().unwrap_or(0.0);
        // Highest confidence first; entries() is id-ordered and the sort is stable.
        ids.sort_by(|a, b| score(b).total_cmp(&score(a)));
        let (keeper, losers) = ids.split_at(1);
        debug!(url, keeper = %keeper[0], losers = losers.len(), "Duplicate bottle page");

        for &loser in losers {
            if dry_run {
                report.signals_deleted += usize::from(confidence.contains_key(&loser));
                report.urls_reset += 1;
                continue;
            }
            if store.remove_signal(loser, SignalSource::Vivino).await? {
                report.signals_deleted += 1;
            }
            store.set_vivino_url(loser, None).await?;
            report.urls_reset += 1;
        }
    }

    info!(
        duplicate_groups = report.duplicate_groups,
        signals_deleted = report.signals_deleted,
        urls_reset = report.urls_reset,
        dry_run,
        "Duplicate match cleanup finished"
    );
    Ok(report)
}
