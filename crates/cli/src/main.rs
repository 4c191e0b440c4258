//! Command-line entry point for catalog syncs, match runs and queries.
//!
//! Usage:
//!     vinolink sync-catalog feeds/lcbo.json
//!     vinolink match --max-pages 40 --dry-run
//!     vinolink recommend --types Red --store 217 --min-rating 4.2
//!     vinolink health --format json --snapshot data/vinolink.json

mod settings;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use settings::Settings;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;
use vinolink_backend_vivino::{FixtureFeed, RatingFeed, VivinoClient};
use vinolink_matcher::MatchConfig;
use vinolink_model::RecommendationResponse;
use vinolink_query::parse_filters;
use vinolink_service::{
    backfill_attributes, cleanup_duplicate_matches, current_health, recommend, run_matching,
    sync_catalog_feed, sync_signals_feed, HealthReport, HealthStatus, MatchOutcome, MatchReport,
    MatchRunOptions, SyncOutcome,
};
use vinolink_store::MemoryStore;

#[derive(Parser)]
#[command(name = "vinolink")]
#[command(about = "Match a retail wine catalog against Vivino ratings and recommend bottles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store snapshot (overrides VINOLINK_STORE_PATH)
    #[arg(long = "snapshot", global = true)]
    snapshot: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a catalog feed (JSON array of store listings)
    SyncCatalog { file: PathBuf },

    /// Ingest a quality-signal feed (JSON array)
    SyncSignals { file: PathBuf },

    /// Crawl Vivino and match the catalog
    Match {
        /// Read candidates from a fixture file instead of Vivino
        #[arg(long)]
        candidates: Option<PathBuf>,

        #[arg(long, default_value = "1025")]
        max_pages: u32,

        /// Skip the per-winery expansion pass
        #[arg(long)]
        skip_expansion: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Remove duplicate matches sharing one Vivino bottle page
    Cleanup {
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-extract unknown producers and varietals
    Backfill {
        #[arg(long)]
        dry_run: bool,
    },

    /// Recommend wines
    Recommend {
        /// Free-text search over name, producer, varietal and region
        #[arg(short, long)]
        search: Option<String>,

        /// Wine types (comma-separated)
        #[arg(short, long)]
        types: Option<String>,

        /// Varietals (comma-separated)
        #[arg(long)]
        varietals: Option<String>,

        /// Countries (comma-separated)
        #[arg(long)]
        countries: Option<String>,

        /// Sub-regions (comma-separated)
        #[arg(long)]
        sub_regions: Option<String>,

        #[arg(long)]
        min_price: Option<String>,

        #[arg(long)]
        max_price: Option<String>,

        #[arg(long)]
        min_rating: Option<String>,

        /// Store code to prefer
        #[arg(long)]
        store: Option<String>,

        /// Maximum results shown
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Ingestion health (exits 1 when unhealthy)
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vinolink=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("reading VINOLINK_* settings")?;
    let store_path = cli.snapshot.clone().unwrap_or_else(|| settings.store_path.clone());
    let store = MemoryStore::open(&store_path)
        .await
        .with_context(|| format!("opening store {}", store_path.display()))?;

    match cli.command {
        Commands::SyncCatalog { file } => {
            let outcome = sync_catalog_feed(&store, read_feed(&file), Utc::now()).await?;
            store.save().await?;
            print_sync(&outcome, cli.format)?;
        }
        Commands::SyncSignals { file } => {
            let outcome = sync_signals_feed(&store, read_feed(&file), Utc::now()).await?;
            store.save().await?;
            print_sync(&outcome, cli.format)?;
        }
        Commands::Match {
            candidates,
            max_pages,
            skip_expansion,
            dry_run,
        } => {
            let options = MatchRunOptions {
                max_pages,
                skip_expansion,
                dry_run,
                ..MatchRunOptions::default()
            };
            let outcome = match candidates {
                Some(path) => {
                    let feed = FixtureFeed::from_path(&path).await?;
                    run_match(&store, &feed, &options).await?
                }
                None => {
                    let feed = VivinoClient::new(settings.vivino_config())?;
                    run_match(&store, &feed, &options).await?
                }
            };
            print_match(&outcome, cli.format)?;
        }
        Commands::Cleanup { dry_run } => {
            let report = cleanup_duplicate_matches(&store, dry_run).await?;
            if !dry_run {
                store.save().await?;
            }
            print_report(&report, cli.format)?;
        }
        Commands::Backfill { dry_run } => {
            let report = backfill_attributes(&store, dry_run).await?;
            if !dry_run {
                store.save().await?;
            }
            print_report(&report, cli.format)?;
        }
        Commands::Recommend {
            search,
            types,
            varietals,
            countries,
            sub_regions,
            min_price,
            max_price,
            min_rating,
            store: store_id,
            limit,
        } => {
            let params: HashMap<String, String> = [
                ("search", search),
                ("types", types),
                ("varietals", varietals),
                ("countries", countries),
                ("subRegions", sub_regions),
                ("minPrice", min_price),
                ("maxPrice", max_price),
                ("minRating", min_rating),
                ("storeId", store_id),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();
            let filter = parse_filters(&params)?;
            let response = recommend(&store, &filter, &settings.ranking_config()).await?;
            print_recommendations(&response, limit, cli.format)?;
        }
        Commands::Health => {
            let report = current_health(&store, &settings.health_thresholds(), Utc::now()).await?;
            print_health(&report, cli.format)?;
            if report.status == HealthStatus::Unhealthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Feed file contents; a read failure is reported as a skipped sync.
async fn read_feed(path: &Path) -> Result<Vec<Value>, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("{}: {}", path.display(), e))
}

async fn run_match<F: RatingFeed>(
    store: &MemoryStore,
    feed: &F,
    options: &MatchRunOptions,
) -> Result<MatchOutcome> {
    info!(feed = feed.name(), dry_run = options.dry_run, "Starting match run");
    let outcome = run_matching(store, feed, &MatchConfig::default(), options, Utc::now()).await;
    // Matches written before a failure are kept, so persist either way.
    if !options.dry_run {
        store.save().await?;
    }
    Ok(outcome?)
}

fn print_report<T: Serialize>(report: &T, format: Format) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match format {
        Format::Json => println!("{}", json),
        Format::Text => {
            let Value::Object(fields) = serde_json::to_value(report)? else {
                println!("{}", json);
                return Ok(());
            };
            for (key, value) in fields {
                println!("{:>20}: {}", key, value);
            }
        }
    }
    Ok(())
}

fn print_sync(outcome: &SyncOutcome, format: Format) -> Result<()> {
    match (outcome, format) {
        (_, Format::Json) => print_report(outcome, format),
        (SyncOutcome::Skipped { source, reason }, Format::Text) => {
            println!("Skipped {} sync, store left as is: {}", source, reason);
            Ok(())
        }
        (SyncOutcome::Synced(report), Format::Text) => print_report(report, format),
    }
}

fn print_match(outcome: &MatchOutcome, format: Format) -> Result<()> {
    let report = match (outcome, format) {
        (_, Format::Json) => return print_report(outcome, format),
        (MatchOutcome::Skipped { reason }, Format::Text) => {
            println!("Match run skipped: {}", reason);
            return Ok(());
        }
        (MatchOutcome::Completed(report), Format::Text) => report,
    };
    print_match_text(report);
    Ok(())
}

fn print_match_text(report: &MatchReport) {
    if report.dry_run {
        println!("(dry run, nothing written)");
    }
    println!(
        "Crawled {} candidates over {} pages, {} wineries",
        report.candidates_crawled, report.pages_crawled, report.wineries_known
    );
    println!(
        "Matched {} of {} ({} broad, {} expansion; {} high, {} medium confidence)",
        report.matched(),
        report.catalog_size,
        report.matched_broad,
        report.matched_expansion,
        report.high_confidence,
        report.medium_confidence
    );
    println!(
        "Rejected: {} no candidates, {} vetoed, {} below floor, {} lost claims; {} evictions",
        report.no_candidates, report.vetoed, report.below_floor, report.lost_claims, report.evictions
    );
    println!(
        "Winery lookups: {} | Direct links written: {}",
        report.winery_lookups, report.urls_updated
    );

    if !report.samples.is_empty() {
        println!("---");
    }
    for sample in &report.samples {
        println!(
            "{} -> {} ({:.1}, confidence {:.2}, {:?})",
            sample.catalog_name, sample.candidate_name, sample.rating, sample.confidence, sample.pass
        );
        println!("   {}", sample.explanation.summary);
    }
}

fn print_recommendations(response: &RecommendationResponse, limit: usize, format: Format) -> Result<()> {
    if format == Format::Json {
        return print_report(response, format);
    }

    if let Some(note) = &response.store_fallback_note {
        println!("{}", note);
    }
    for (i, wine) in response.recommendations.iter().take(limit).enumerate() {
        let rating = match (wine.rating, wine.rating_count) {
            (Some(rating), Some(count)) => format!("{:.1} ({} ratings)", rating, count),
            (Some(rating), None) => format!("~{:.1}", rating),
            _ => "unrated".to_string(),
        };
        println!("\n{}. {} | {}", i + 1, wine.name, wine.producer);
        println!(
            "   {} {} | {}, {} | ${:.2} at {}",
            wine.wine_type, wine.varietal, wine.country, wine.sub_region, wine.price, wine.store_label
        );
        println!("   Rating: {} [{}]", rating, wine.rating_source.as_str());
        for line in &wine.why {
            println!("   - {}", line);
        }
        println!("   {}", wine.vivino_url);
    }

    println!("\n---");
    println!(
        "Showing {} of {} results",
        response.recommendations.len().min(limit),
        response.recommendations.len()
    );
    Ok(())
}

fn print_health(report: &HealthReport, format: Format) -> Result<()> {
    if format == Format::Json {
        return print_report(report, format);
    }

    println!("Status: {:?}", report.status);
    for (source, health) in &report.sources {
        let stale = health
            .stale_minutes
            .map(|m| format!("{} min ago", m))
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {:<16} {:<10} last completed {} (threshold {} min)",
            source,
            format!("{:?}", health.status),
            stale,
            health.threshold_minutes
        );
    }
    println!(
        "  {:<16} {:<10} {} in the last 24h (threshold {})",
        "dead letters",
        format!("{:?}", report.dead_letters.status),
        report.dead_letters.last_24h,
        report.dead_letters.threshold
    );
    println!("{}", report.summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_match_flags() {
        let cli = Cli::try_parse_from(["vinolink", "match", "--max-pages", "3", "--dry-run", "--format", "json"])
            .unwrap();
        assert_eq!(cli.format, Format::Json);
        match cli.command {
            Commands::Match {
                max_pages,
                dry_run,
                skip_expansion,
                candidates,
            } => {
                assert_eq!(max_pages, 3);
                assert!(dry_run);
                assert!(!skip_expansion);
                assert_eq!(candidates, None);
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn test_cli_parses_recommend_filters() {
        let cli = Cli::try_parse_from([
            "vinolink", "recommend", "--types", "Red,White", "--store", "217", "--min-rating", "4.2",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Recommend { ref types, ref store, .. }
                if types.as_deref() == Some("Red,White") && store.as_deref() == Some("217")
        ));
    }

    #[test]
    fn test_snapshot_flag_is_separate_from_store_filter() {
        let cli = Cli::try_parse_from([
            "vinolink", "recommend", "--store", "217", "--snapshot", "/tmp/wines.json",
        ])
        .unwrap();
        assert_eq!(cli.snapshot, Some(PathBuf::from("/tmp/wines.json")));
        assert!(matches!(
            cli.command,
            Commands::Recommend { ref store, .. } if store.as_deref() == Some("217")
        ));

        let cli = Cli::try_parse_from(["vinolink", "--snapshot", "/tmp/wines.json", "health"]).unwrap();
        assert_eq!(cli.snapshot, Some(PathBuf::from("/tmp/wines.json")));
        assert!(matches!(cli.command, Commands::Health));
    }

    #[tokio::test]
    async fn test_unreadable_feed_is_a_string_error() {
        let err = read_feed(Path::new("/nonexistent/feed.json")).await.unwrap_err();
        assert!(err.contains("/nonexistent/feed.json"));
    }
}
