//! Match runs: crawl the ratings feed, then match the catalog against it in
//! a broad pass over everything and an expansion pass over each unmatched
//! producer's full winery listing. Both passes share one `ClaimArbiter`, so
//! no candidate backs two entries.

use crate::{ServiceError, SIGNAL_SOURCE};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};
use vinolink_backend_vivino::RatingFeed;
use vinolink_explain::{explain_match, is_direct_vivino_url, Explanation};
use vinolink_features::normalize_text;
use vinolink_matcher::{
    evaluate, CandidateMatch, CandidatePool, ClaimArbiter, ClaimOutcome, MatchConfig, MatchDecision,
    MatchTarget, WineryDirectory,
};
use vinolink_model::{CatalogEntry, QualitySignal, RunId, SignalSource, WineId};
use vinolink_store::{CatalogStore, RunCompletion, StoreError};

/// Per-run knobs.
#[derive(Debug, Clone)]
pub struct MatchRunOptions {
    pub max_pages: u32,
    pub skip_expansion: bool,
    /// Compute everything, write nothing
    pub dry_run: bool,
    /// Accepted matches kept in the report for review
    pub sample_limit: usize,
    /// Stop crawling once this many candidates past the reported total
    pub crawl_overshoot: usize,
    /// Confidence at or above which a match counts as high
    pub high_confidence: f32,
}

impl Default for MatchRunOptions {
    fn default() -> Self {
        Self {
            max_pages: 1025,
            skip_expansion: false,
            dry_run: false,
            sample_limit: 10,
            crawl_overshoot: 200,
            high_confidence: 0.72,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPass {
    Broad,
    Expansion,
}

/// An accepted match, kept for the run report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSample {
    pub wine_id: WineId,
    pub catalog_name: String,
    pub candidate_name: String,
    pub rating: f32,
    pub confidence: f32,
    pub pass: MatchPass,
    pub explanation: Explanation,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub dry_run: bool,
    pub catalog_size: usize,
    pub pages_crawled: u32,
    pub candidates_crawled: usize,
    pub wineries_known: usize,
    /// Entries holding a match at the end of the run, by pass
    pub matched_broad: usize,
    pub matched_expansion: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub no_candidates: usize,
    pub vetoed: usize,
    pub below_floor: usize,
    pub lost_claims: usize,
    pub evictions: usize,
    pub winery_lookups: usize,
    pub urls_updated: usize,
    pub samples: Vec<MatchSample>,
}

impl MatchReport {
    pub fn matched(&self) -> usize {
        self.matched_broad + self.matched_expansion
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum MatchOutcome {
    Completed(MatchReport),
    /// The first feed page could not be fetched; nothing was written.
    Skipped { reason: String },
}

/// Everything gathered from the feed before matching starts.
struct Crawl {
    pool: CandidatePool,
    directory: WineryDirectory,
    pages: u32,
}

async fn crawl<F: RatingFeed>(feed: &F, options: &MatchRunOptions) -> Result<Crawl, String> {
    let mut crawl = Crawl {
        pool: CandidatePool::default(),
        directory: WineryDirectory::new(),
        pages: 0,
    };
    let mut reported_total = 0;
    let mut page = 1;

    while page <= options.max_pages {
        let fetched = match feed.fetch_page(page).await {
            Ok(fetched) => fetched,
            Err(e) if page == 1 => return Err(e.to_string()),
            Err(e) => {
                warn!(feed = feed.name(), page, error = %e, "Page fetch failed, ending crawl");
                break;
            }
        };
        if page == 1 {
            reported_total = fetched.total;
            info!(feed = feed.name(), total = reported_total, "Crawling ratings feed");
        }
        let next = fetched.next_page();
        crawl.directory.extend(fetched.wineries);
        if fetched.candidates.is_empty() || crawl.pool.len() >= reported_total + options.crawl_overshoot {
            break;
        }

        for candidate in fetched.candidates {
            crawl.pool.push(candidate);
        }
        crawl.pages = page;

        if page % 25 == 0 {
            debug!(page, candidates = crawl.pool.len(), wineries = crawl.directory.len(), "Crawl progress");
        }
        match next {
            Some(next) => page = next,
            None => break,
        }
    }

    Ok(crawl)
}

/// Run-scoped state shared by both passes.
struct MatchRun<'a, S> {
    store: &'a S,
    config: &'a MatchConfig,
    options: &'a MatchRunOptions,
    now: DateTime<Utc>,
    arbiter: ClaimArbiter,
    /// Entries currently holding a claim, with how they won it
    held: HashMap<WineId, (MatchPass, f32)>,
    /// Links replaced by this run, with the value they replaced
    links_replaced: HashMap<WineId, Option<String>>,
    report: MatchReport,
}

impl<S: CatalogStore> MatchRun<'_, S> {
    fn count_rejection(&mut self, decision: &MatchDecision<'_>) {
        match decision {
            MatchDecision::NoCandidates => self.report.no_candidates += 1,
            MatchDecision::AllVetoed { .. } => self.report.vetoed += 1,
            MatchDecision::BelowFloor { .. } => self.report.below_floor += 1,
            MatchDecision::Matched(_) => {}
        }
    }

    /// Match one entry against a pool. Returns `Some(evicted)` when the claim
    /// was taken from another entry, and whether this entry now holds a match.
    async fn match_entry(
        &mut self,
        entry: &CatalogEntry,
        pool: &CandidatePool,
        pass: MatchPass,
    ) -> Result<(bool, Option<WineId>), StoreError> {
        let target = MatchTarget::new(&entry.name, entry.producer.as_deref());
        let decision = evaluate(&target, pool, self.config);
        let MatchDecision::Matched(found) = decision else {
            self.count_rejection(&decision);
            return Ok((false, None));
        };

        let evicted = match self.arbiter.propose(found.candidate.claim_key(), entry.id, found.total()) {
            ClaimOutcome::Accepted => None,
            ClaimOutcome::Replaced { evicted, .. } => Some(evicted),
            ClaimOutcome::Rejected { holder, holder_score } => {
                debug!(
                    wine = %entry.id,
                    %holder,
                    holder_score,
                    score = found.total(),
                    candidate = %found.candidate.full_name,
                    "Lost claim"
                );
                self.report.lost_claims += 1;
                return Ok((false, None));
            }
        };

        if let Some(evicted) = evicted {
            self.report.evictions += 1;
            self.release(evicted).await?;
        }
        self.accept(entry, &found, pass).await?;
        Ok((true, evicted))
    }

    /// Persist an accepted match: replace the signal and, when the match is
    /// link-worthy, point the entry at the bottle page.
    async fn accept(
        &mut self,
        entry: &CatalogEntry,
        found: &CandidateMatch<'_>,
        pass: MatchPass,
    ) -> Result<(), StoreError> {
        let confidence = self.config.confidence(found.total());
        let candidate = found.candidate;
        self.held.insert(entry.id, (pass, confidence));

        if self.report.samples.len() < self.options.sample_limit {
            self.report.samples.push(MatchSample {
                wine_id: entry.id,
                catalog_name: entry.name.clone(),
                candidate_name: candidate.full_name.clone(),
                rating: candidate.rating,
                confidence,
                pass,
                explanation: explain_match(&entry.name, &candidate.full_name, &found.score),
            });
        }

        let direct_url = candidate
            .direct_url
            .as_deref()
            .filter(|url| is_direct_vivino_url(Some(url)) && self.config.is_link_worthy(confidence));
        if direct_url.is_some() {
            self.report.urls_updated += 1;
        }
        if self.options.dry_run {
            return Ok(());
        }

        self.store
            .replace_signal(QualitySignal {
                wine_id: entry.id,
                source: SignalSource::Vivino,
                rating: (candidate.rating * 100.0).round() / 100.0,
                rating_count: candidate.rating_count,
                confidence_score: confidence,
                fetched_at: self.now,
            })
            .await?;
        if let Some(url) = direct_url {
            self.store.set_vivino_url(entry.id, Some(url.to_string())).await?;
            self.links_replaced.entry(entry.id).or_insert_with(|| entry.vivino_url.clone());
        }
        Ok(())
    }

    /// Undo this run's write for an entry that lost its claim.
    async fn release(&mut self, wine_id: WineId) -> Result<(), StoreError> {
        self.held.remove(&wine_id);
        if self.options.dry_run {
            return Ok(());
        }
        self.store.remove_signal(wine_id, SignalSource::Vivino).await?;
        if let Some(previous) = self.links_replaced.remove(&wine_id) {
            self.store.set_vivino_url(wine_id, previous).await?;
        }
        Ok(())
    }

    async fn broad_pass(&mut self, entries: &[CatalogEntry], pool: &CandidatePool) -> Result<Vec<WineId>, StoreError> {
        let mut unmatched = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let (matched, evicted) = self.match_entry(entry, pool, MatchPass::Broad).await?;
            if !matched {
                unmatched.push(entry.id);
            }
            unmatched.extend(evicted);
            if (i + 1) % 1000 == 0 {
                debug!(processed = i + 1, held = self.held.len(), "Broad pass progress");
            }
        }
        Ok(unmatched)
    }

    async fn expansion_pass<F: RatingFeed>(
        &mut self,
        feed: &F,
        directory: &WineryDirectory,
        unmatched: Vec<&CatalogEntry>,
    ) -> Result<(), StoreError> {
        let mut groups: BTreeMap<String, Vec<&CatalogEntry>> = BTreeMap::new();
        for entry in unmatched {
            let Some(producer) = entry.producer.as_deref() else {
                continue;
            };
            let key = normalize_text(producer);
            if !key.is_empty() {
                groups.entry(key).or_default().push(entry);
            }
        }
        debug!(producers = groups.len(), "Expansion pass");

        for (producer, entries) in groups {
            let Some((winery, resolution)) = directory.resolve(&producer) else {
                continue;
            };
            let wines = match feed.fetch_winery_wines(winery).await {
                Ok(wines) => wines,
                Err(e) => {
                    warn!(winery = %winery.name, error = %e, "Winery fetch failed, skipping");
                    continue;
                }
            };
            if wines.is_empty() {
                continue;
            }
            self.report.winery_lookups += 1;
            debug!(%producer, winery = %winery.name, ?resolution, wines = wines.len(), "Winery lookup");

            let mini_pool = CandidatePool::new(wines);
            for entry in entries {
                // Already re-matched by an earlier group through an eviction chain
                if self.held.contains_key(&entry.id) {
                    continue;
                }
                self.match_entry(entry, &mini_pool, MatchPass::Expansion).await?;
            }
        }
        Ok(())
    }

    fn finish_report(mut self) -> MatchReport {
        for (pass, confidence) in self.held.values() {
            match pass {
                MatchPass::Broad => self.report.matched_broad += 1,
                MatchPass::Expansion => self.report.matched_expansion += 1,
            }
            if *confidence >= self.options.high_confidence {
                self.report.high_confidence += 1;
            } else {
                self.report.medium_confidence += 1;
            }
        }
        self.report
    }
}

/// Crawl `feed` and match the whole catalog against it.
///
/// Every accepted match replaces the entry's signal immediately; a run that
/// fails midway keeps what it wrote. When the first page cannot be fetched
/// the run is skipped and nothing is touched.
pub async fn run_matching<S: CatalogStore, F: RatingFeed>(
    store: &S,
    feed: &F,
    config: &MatchConfig,
    options: &MatchRunOptions,
    now: DateTime<Utc>,
) -> Result<MatchOutcome, ServiceError> {
    let crawl = match crawl(feed, options).await {
        Ok(crawl) => crawl,
        Err(reason) => {
            warn!(feed = feed.name(), %reason, "Ratings feed unavailable, skipping match run");
            return Ok(MatchOutcome::Skipped { reason });
        }
    };
    info!(
        candidates = crawl.pool.len(),
        wineries = crawl.directory.len(),
        pages = crawl.pages,
        "Crawl finished"
    );

    let entries = store.entries().await?;
    let run_id = if options.dry_run {
        None
    } else {
        Some(store.start_run(SIGNAL_SOURCE, entries.len(), 0, now).await?)
    };

    let mut run = MatchRun {
        store,
        config,
        options,
        now,
        arbiter: ClaimArbiter::new(),
        held: HashMap::new(),
        links_replaced: HashMap::new(),
        report: MatchReport {
            run_id,
            dry_run: options.dry_run,
            catalog_size: entries.len(),
            pages_crawled: crawl.pages,
            candidates_crawled: crawl.pool.len(),
            wineries_known: crawl.directory.len(),
            ..MatchReport::default()
        },
    };

    let passes = async {
        let unmatched = run.broad_pass(&entries, &crawl.pool).await?;
        info!(held = run.held.len(), unmatched = unmatched.len(), "Broad pass finished");

        if !options.skip_expansion {
            let by_id: HashMap<WineId, &CatalogEntry> = entries.iter().map(|e| (e.id, e)).collect();
            let unmatched = unmatched
                .iter()
                .filter(|id| !run.held.contains_key(*id))
                .filter_map(|id| by_id.get(id).copied())
                .collect();
            run.expansion_pass(feed, &crawl.directory, unmatched).await?;
        }
        Ok::<(), StoreError>(())
    }
    .await;

    let written = run.held.len();
    if let Err(e) = passes {
        if let Some(run_id) = run_id {
            let completion = RunCompletion::failed(written, e.to_string(), Utc::now());
            if let Err(finish_error) = store.finish_run(run_id, completion).await {
                warn!(?run_id, error = %finish_error, "Could not mark run as failed");
            }
        }
        return Err(e.into());
    }

    if let Some(run_id) = run_id {
        store
            .finish_run(run_id, RunCompletion::completed(written, Utc::now()))
            .await?;
    }

    let report = run.finish_report();
    info!(
        matched = report.matched(),
        broad = report.matched_broad,
        expansion = report.matched_expansion,
        high = report.high_confidence,
        lost_claims = report.lost_claims,
        evictions = report.evictions,
        below_floor = report.below_floor,
        vetoed = report.vetoed,
        dry_run = report.dry_run,
        "Match run finished"
    );
    Ok(MatchOutcome::Completed(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::sync_catalog;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use vinolink_backend_vivino::{FixtureData, FixtureFeed, FixtureWinery};
    use vinolink_model::{ExternalRatingCandidate, RunStatus, WineryRef};
    use vinolink_store::MemoryStore;

    fn now() -> DateTime<Utc> {
        "2025-03-14T08:00:00Z".parse().unwrap()
    }

    fn item(sku: &str, name: &str, wine_type: &str, country: &str) -> Value {
        json!({
            "externalId": sku,
            "name": name,
            "type": wine_type,
            "country": country,
            "subRegion": "Region",
            "regionLabel": format!("{}, Region", country),
            "storeCode": "217",
            "storeLabel": "Queens Quay",
            "listedPriceCents": 1895,
            "inventoryQuantity": 10,
            "inStock": true,
            "sourceUpdatedAt": "2025-03-14T06:00:00Z"
        })
    }

    fn candidate(id: u64, winery: &str, wine: &str, rating: f32, count: u32) -> ExternalRatingCandidate {
        ExternalRatingCandidate::new(id, winery, wine, rating, count)
            .with_direct_url(format!("https://www.vivino.com/w/{}", id))
    }

    async fn seeded(items: Vec<Value>) -> MemoryStore {
        let store = MemoryStore::new();
        sync_catalog(&store, &items, now()).await.unwrap();
        store
    }

    fn completed(outcome: MatchOutcome) -> MatchReport {
        match outcome {
            MatchOutcome::Completed(report) => report,
            MatchOutcome::Skipped { reason } => panic!("run skipped: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_gato_negro_end_to_end() {
        let store = seeded(vec![item("1", "Gato Negro Chardonnay", "White", "Chile")]).await;
        let feed = FixtureFeed::new(FixtureData {
            candidates: vec![
                candidate(10, "Gato Negro", "Chardonnay", 4.1, 900),
                candidate(11, "Gato Negro", "Merlot", 3.5, 800),
            ],
            wineries: Vec::new(),
        });

        let report = completed(
            run_matching(&store, &feed, &MatchConfig::default(), &MatchRunOptions::default(), now())
                .await
                .unwrap(),
        );
        assert_eq!(report.matched_broad, 1);
        assert_eq!(report.urls_updated, 1);

        let entry = store.entry_by_external_id("1").await.unwrap().unwrap();
        assert_eq!(entry.producer.as_deref(), Some("Gato Negro"));
        assert_eq!(entry.varietal.as_deref(), Some("Chardonnay"));
        assert_eq!(entry.vivino_url.as_deref(), Some("https://www.vivino.com/w/10"));

        let signal = store.signal(entry.id, SignalSource::Vivino).await.unwrap().unwrap();
        assert_eq!(signal.rating, 4.1);
        assert!((0.55..=0.95).contains(&signal.confidence_score));
        assert_eq!(signal.fetched_at, now());

        let runs = store.recent_runs(1).await.unwrap();
        assert_eq!(runs[0].source, "vivino_signals");
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(runs[0].items_written, 1);
    }

    #[tokio::test]
    async fn test_henry_of_pelham_one_to_one() {
        let store = seeded(vec![
            item("1", "Henry of Pelham Baco Noir 2021", "Red", "Canada"),
            item("2", "Henry of Pelham Baco Noir 2022", "Red", "Canada"),
        ])
        .await;
        let feed = FixtureFeed::new(FixtureData {
            candidates: vec![candidate(20, "Henry of Pelham", "Baco Noir", 3.7, 820)],
            wineries: Vec::new(),
        });

        let report = completed(
            run_matching(&store, &feed, &MatchConfig::default(), &MatchRunOptions::default(), now())
                .await
                .unwrap(),
        );
        assert_eq!(report.matched(), 1);
        assert_eq!(report.lost_claims, 1);

        // Equal scores: the first entry keeps the claim.
        let signals = store.signals().await.unwrap();
        assert_eq!(signals.len(), 1);
        let first = store.entry_by_external_id("1").await.unwrap().unwrap();
        assert_eq!(signals[0].wine_id, first.id);
    }

    #[tokio::test]
    async fn test_stronger_claim_evicts_earlier_write() {
        // The first entry matches weakly (no producer agreement on the name),
        // the second matches exactly and takes the candidate.
        let store = seeded(vec![
            item("1", "Cloudy Bay Te Koko Sauvignon Blanc Marlborough", "White", "New Zealand"),
            item("2", "Cloudy Bay Sauvignon Blanc", "White", "New Zealand"),
        ])
        .await;
        let feed = FixtureFeed::new(FixtureData {
            candidates: vec![candidate(30, "Cloudy Bay", "Sauvignon Blanc", 4.0, 5000)],
            wineries: Vec::new(),
        });

        let report = completed(
            run_matching(&store, &feed, &MatchConfig::default(), &MatchRunOptions::default(), now())
                .await
                .unwrap(),
        );
        assert_eq!(report.evictions, 1);
        assert_eq!(report.matched(), 1);

        let loser = store.entry_by_external_id("1").await.unwrap().unwrap();
        let winner = store.entry_by_external_id("2").await.unwrap().unwrap();
        assert!(store.signal(loser.id, SignalSource::Vivino).await.unwrap().is_none());
        assert_eq!(loser.vivino_url, None);
        assert!(store.signal(winner.id, SignalSource::Vivino).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expansion_pass_uses_winery_listing() {
        let store = seeded(vec![
            item("1", "Tawse Cabernet Franc Icewine", "Other", "Canada"),
            item("2", "Tawse Riesling", "White", "Canada"),
        ])
        .await;
        let tawse = WineryRef {
            id: 500,
            name: "Tawse".to_string(),
            seo_name: "tawse".to_string(),
        };
        let feed = FixtureFeed::new(FixtureData {
            candidates: vec![candidate(40, "Tawse", "Riesling", 4.0, 300)],
            wineries: vec![FixtureWinery {
                winery: tawse,
                wines: vec![candidate(41, "Tawse", "Cabernet Franc Icewine", 4.4, 150)],
            }],
        });

        let report = completed(
            run_matching(&store, &feed, &MatchConfig::default(), &MatchRunOptions::default(), now())
                .await
                .unwrap(),
        );
        assert_eq!(report.matched_broad, 1);
        assert_eq!(report.matched_expansion, 1);
        assert_eq!(report.winery_lookups, 1);

        let icewine = store.entry_by_external_id("1").await.unwrap().unwrap();
        let signal = store.signal(icewine.id, SignalSource::Vivino).await.unwrap().unwrap();
        assert_eq!(signal.rating, 4.4);

        let skipped = completed(
            run_matching(
                &seeded(vec![item("1", "Tawse Cabernet Franc Icewine", "Other", "Canada")]).await,
                &feed,
                &MatchConfig::default(),
                &MatchRunOptions {
                    skip_expansion: true,
                    ..MatchRunOptions::default()
                },
                now(),
            )
            .await
            .unwrap(),
        );
        assert_eq!(skipped.matched(), 0);
        assert_eq!(skipped.winery_lookups, 0);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = seeded(vec![item("1", "Gato Negro Chardonnay", "White", "Chile")]).await;
        let feed = FixtureFeed::new(FixtureData {
            candidates: vec![candidate(10, "Gato Negro", "Chardonnay", 4.1, 900)],
            wineries: Vec::new(),
        });
        let options = MatchRunOptions {
            dry_run: true,
            ..MatchRunOptions::default()
        };

        let report = completed(
            run_matching(&store, &feed, &MatchConfig::default(), &options, now())
                .await
                .unwrap(),
        );
        assert_eq!(report.matched(), 1);
        assert_eq!(report.run_id, None);
        assert_eq!(report.samples.len(), 1);
        assert!(store.signals().await.unwrap().is_empty());
        assert_eq!(store.recent_runs(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_feed_skips_run() {
        let store = seeded(vec![item("1", "Gato Negro Chardonnay", "White", "Chile")]).await;
        let feed = FixtureFeed::new(FixtureData::default()).offline();

        let outcome = run_matching(&store, &feed, &MatchConfig::default(), &MatchRunOptions::default(), now())
            .await
            .unwrap();
        assert!(matches!(outcome, MatchOutcome::Skipped { .. }));
        assert!(store.signals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crawl_respects_max_pages() {
        let feed = FixtureFeed::new(FixtureData {
            candidates: (0..10)
                .map(|i| candidate(100 + i, &format!("Winery {}", i), "Red", 4.0, 10))
                .collect(),
            wineries: Vec::new(),
        })
        .with_per_page(3);

        let options = MatchRunOptions {
            max_pages: 2,
            ..MatchRunOptions::default()
        };
        let crawl = crawl(&feed, &options).await.unwrap();
        assert_eq!(crawl.pages, 2);
        assert_eq!(crawl.pool.len(), 6);

        let all = super::crawl(&feed, &MatchRunOptions::default()).await.unwrap();
        assert_eq!(all.pages, 4);
        assert_eq!(all.pool.len(), 10);
    }

    #[tokio::test]
    async fn test_no_candidate_backs_two_entries() {
        let store = seeded(vec![
            item("1", "Gato Negro Chardonnay", "White", "Chile"),
            item("2", "Gato Negro Chardonnay Reserva", "White", "Chile"),
            item("3", "Gato Negro Merlot", "Red", "Chile"),
            item("4", "Gato Negro Merlot Gran Reserva", "Red", "Chile"),
        ])
        .await;
        let feed = FixtureFeed::new(FixtureData {
            candidates: vec![
                candidate(10, "Gato Negro", "Chardonnay", 4.1, 900),
                candidate(11, "Gato Negro", "Merlot", 3.5, 800),
            ],
            wineries: Vec::new(),
        });

        completed(
            run_matching(&store, &feed, &MatchConfig::default(), &MatchRunOptions::default(), now())
                .await
                .unwrap(),
        );

        let entries = store.entries().await.unwrap();
        let urls: Vec<&str> = entries.iter().filter_map(|e| e.vivino_url.as_deref()).collect();
        let unique: HashSet<&str> = urls.iter().copied().collect();
        assert_eq!(urls.len(), unique.len());
        assert_eq!(store.signals().await.unwrap().len(), 2);
    }
}
