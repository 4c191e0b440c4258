use crate::ServiceError;
use serde::Serialize;
use tracing::{debug, info};
use vinolink_explain::{build_vivino_search_url, is_direct_vivino_url};
use vinolink_features::{extract_producer, extract_varietal};
use vinolink_store::{CatalogStore, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub producers_updated: usize,
    pub varietals_updated: usize,
    /// Producer was already stored
    pub already_known: usize,
    /// Producer is unknown and extraction found nothing
    pub still_unknown: usize,
    /// Updates skipped because the new identity belongs to another entry
    pub collisions: usize,
    pub urls_updated: usize,
}

/// Re-run varietal and producer extraction over stored entries whose
/// attributes are unknown, for rows written before extraction improved.
///
/// Entries that gain a producer get a fresh Vivino search link unless they
/// already point at a bottle page.
pub async fn backfill_attributes<S: CatalogStore>(
    store: &S,
    dry_run: bool,
) -> Result<BackfillReport, ServiceError> {
    let entries = store.entries().await?;
    let mut report = BackfillReport {
        dry_run,
        scanned: entries.len(),
        ..BackfillReport::default()
    };

    for entry in entries {
        let varietal = entry
            .varietal
            .clone()
            .or_else(|| extract_varietal(&entry.name, None).map(str::to_string));
        let producer = match &entry.producer {
            Some(_) => {
                report.already_known += 1;
                entry.producer.clone()
            }
            None => {
                let found = extract_producer(&entry.name, varietal.as_deref());
                if found.is_none() {
                    report.still_unknown += 1;
                }
                found
            }
        };

        let producer_changed = producer != entry.producer;
        let varietal_changed = varietal != entry.varietal;
        if !producer_changed && !varietal_changed {
            continue;
        }
        let refresh_url = producer_changed && !is_direct_vivino_url(entry.vivino_url.as_deref());

        if !dry_run {
            match store
                .update_attributes(entry.id, producer.clone(), varietal.clone())
                .await
            {
                Ok(()) => {}
                Err(StoreError::IdentityCollision { identity, holder }) => {
                    debug!(wine = %entry.id, %identity, %holder, "Backfill would collide, skipping");
                    report.collisions += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            if refresh_url {
                let url = build_vivino_search_url(&entry.name, producer.as_deref(), Some(&entry.country));
                store.set_vivino_url(entry.id, Some(url)).await?;
            }
        }

        report.producers_updated += usize::from(producer_changed);
        report.varietals_updated += usize::from(varietal_changed);
        report.urls_updated += usize::from(refresh_url);
    }

    info!(
        scanned = report.scanned,
        producers = report.producers_updated,
        varietals = report.varietals_updated,
        still_unknown = report.still_unknown,
        collisions = report.collisions,
        dry_run,
        "Attribute backfill finished"
    );
    Ok(report)
}
