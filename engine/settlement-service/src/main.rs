//! Football Pool CLI
//!
//! Entry point for the weekly jobs:
//! - settle: compute and persist the current week's payouts
//! - reconcile: remove duplicate payout rows
//! - preview: show who is currently ahead, without writing anything
//! - seed: load a season roster
//! - schedule: run settle + reconcile every week

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pool_engine::season::season_label;
use pool_engine::{Roster, ScoreFeed, StaticFeed};
use pool_store::PgStore;
use scores_fetcher::EspnScoreFeed;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use settlement_service::{
    initialize_logging_with_config, preview_week, reconcile_duplicates, run_weekly_settlement,
    seed_roster, ServiceConfig, SettlementScheduler,
};

#[derive(Parser)]
#[command(name = "football-pool")]
#[command(about = "Weekly payout settlement for the football pool")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); falls back to $POOL_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read the scoreboard from a saved JSON payload instead of the live feed
    #[arg(long, global = true)]
    payload: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and persist this week's payouts
    Settle,

    /// Delete duplicate payout rows
    Reconcile,

    /// Show the current leaders without writing anything
    Preview,

    /// Load teams and owners for a season
    Seed {
        /// Roster JSON file
        #[arg(short, long)]
        roster: PathBuf,
    },

    /// Run settlement and reconciliation every week
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(|| std::env::var_os("POOL_CONFIG").map(PathBuf::from));
    let config = ServiceConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    initialize_logging_with_config(&config.logging.level, &config.logging.format)?;
    info!("Starting football-pool v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Preview => {
            let feed = build_feed(&config, cli.payload.as_deref())?;
            let preview = preview_week(feed.as_ref(), &config.rules).await?;

            println!("Week {} ({:?})", preview.week, preview.kind);
            for (category, teams) in preview.categories() {
                let teams: Vec<&str> = teams.iter().map(|t| t.as_str()).collect();
                println!("  {:<10} {}", category.as_str(), teams.join(", "));
            }
            let leaders: Vec<&str> = preview.leaders.iter().map(|t| t.as_str()).collect();
            println!("Leaders: {}", leaders.join(", "));
        }
        Commands::Settle => {
            let feed = build_feed(&config, cli.payload.as_deref())?;
            let store = connect_store(&config).await?;
            let season = config.season.resolve_start_year(Utc::now().date_naive());

            let report = run_weekly_settlement(feed.as_ref(), &store, &config.rules, season).await?;
            println!(
                "{} season, {}: {} payouts written, {} already logged, ${} credited, pot ${} -> ${}",
                season_label(season),
                report.week,
                report.inserted,
                report.skipped_duplicates,
                report.credited,
                report.pot_before,
                report.pot_after
            );
            if report.superseded > 0 {
                println!(
                    "Results changed since the last run: {} payouts removed, ${} taken back",
                    report.superseded, report.reversed
                );
            }
        }
        Commands::Reconcile => {
            let store = connect_store(&config).await?;
            let deleted = reconcile_duplicates(&store).await?;
            println!("Removed {} duplicate payout rows", deleted);
        }
        Commands::Seed { roster } => {
            let raw = std::fs::read_to_string(&roster)
                .with_context(|| format!("Failed to read roster file: {:?}", roster))?;
            let roster = Roster::from_json(&raw).context("Failed to parse roster")?;
            let store = connect_store(&config).await?;

            let report = seed_roster(&store, &roster, config.season.expected_owner_count).await?;
            println!(
                "Seeded {} season: {} teams, {} owners",
                season_label(report.season_start_year),
                report.teams,
                report.owners
            );
        }
        Commands::Schedule => {
            let feed = build_feed(&config, cli.payload.as_deref())?;
            let store = Arc::new(connect_store(&config).await?);
            let scheduler = SettlementScheduler::new(config, feed, store);
            scheduler.start().await?;
        }
    }

    Ok(())
}

fn build_feed(config: &ServiceConfig, payload: Option<&Path>) -> Result<Arc<dyn ScoreFeed>> {
    match payload {
        Some(path) => {
            info!("Using saved scoreboard payload: {:?}", path);
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read payload file: {:?}", path))?;
            let value: serde_json::Value = serde_json::from_str(&raw).context("Failed to parse payload JSON")?;
            Ok(Arc::new(StaticFeed::new(value)))
        }
        None => Ok(Arc::new(EspnScoreFeed::new(config.feed.clone())?)),
    }
}

async fn connect_store(config: &ServiceConfig) -> Result<PgStore> {
    let store = PgStore::connect(&config.database).await.context("Failed to connect to database")?;
    store.ensure_schema(config.rules.pot_reset).await.context("Failed to prepare database schema")?;
    Ok(store)
}
