// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Solar Ledger.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Solar Ledger - records collector telemetry and keeps the daily ledger
//!
//! Reads JSON-lines collector messages, compacts raw events into priced daily
//! summaries once a day and answers ledger queries as JSON.

mod config;
mod input;
mod output;
mod schedule;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use solar_ledger_core::{Clock, RangeDuration, SolarLedger, SqliteStore, SystemClock};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use crate::config::LedgerConfig;
use crate::output::{HistoryEntry, PanelReport, print_json};

type Engine = SolarLedger<SqliteStore, SystemClock>;

#[derive(Parser)]
#[command(name = "solar-ledger", version)]
#[command(
    about = "Daily energy and tariff ledger for a home solar installation",
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SOLAR_LEDGER_CONFIG", default_value = "solar-ledger.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record collector messages from stdin and compact once a day
    Run,
    /// Record collector messages from stdin until it closes
    Record,
    /// Compact everything before local midnight and print the report
    Compact,
    /// Totals for the current local day
    Today,
    /// Panel ranking of the latest event and per-panel production today
    Panels,
    /// Gap-free daily history ending today
    History {
        /// One of: day, week, month, year
        #[arg(short, long, default_value = "week")]
        duration: RangeDuration,
    },
    /// Tariff in force on a date (default today)
    Rate {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Every stored tariff version
    Tariffs,
    /// Monitored device and last read time
    Installation,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let cli = Cli::parse();
    let config = LedgerConfig::from_file(&cli.config)?;
    let engine = open(&config)?;

    match cli.command {
        Commands::Run => run(Arc::new(engine), config.schedule.compaction_delay_minutes).await,
        Commands::Record => record(&engine),
        Commands::Compact => print_json(&engine.compact_now()?),
        Commands::Today => print_json(&engine.today_totals()?),
        Commands::Panels => print_json(&PanelReport {
            max: engine.max_panel_production(),
            ranking: engine.panel_ranking(),
            today: engine.panel_production_today()?,
        }),
        Commands::History { duration } => {
            let entries: Vec<HistoryEntry> = engine
                .history(duration)?
                .into_iter()
                .map(HistoryEntry::from)
                .collect();
            print_json(&entries)
        }
        Commands::Rate { date } => {
            print_json(&engine.rate_for(date.unwrap_or_else(|| engine.clock().today()))?)
        }
        Commands::Tariffs => print_json(&engine.tariffs()?),
        Commands::Installation => print_json(&engine.installation()?),
    }
}

/// Opens the store and runs the startup sequence.
fn open(config: &LedgerConfig) -> Result<Engine> {
    let store = SqliteStore::open(&config.database.path)
        .with_context(|| format!("Failed to open ledger database {}", config.database.path))?;
    let engine = SolarLedger::new(store, config.clock()?, config.engine_settings());

    let startup = engine.initialize().context("Ledger startup failed")?;
    info!(
        "Ledger ready: timezone {}, interval {} min, tariff {:?}",
        config.installation.timezone,
        engine.settings().interval_minutes,
        startup.tariff
    );
    Ok(engine)
}

fn record(engine: &Engine) -> Result<()> {
    let mut recorded = 0_usize;
    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read collector input")?;
        match input::handle_line(engine, &line) {
            Ok(true) => recorded += 1,
            Ok(false) => {}
            Err(e) => error!("Skipping collector message: {e:#}"),
        }
    }
    info!("Recorded {recorded} collector messages");
    Ok(())
}

async fn run(engine: Arc<Engine>, delay_minutes: u32) -> Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Next compaction at {}",
        schedule::next_compaction(engine.clock().now(), delay_minutes)
    );

    loop {
        let wait = schedule::until_next_compaction(
            &engine.clock().timezone(),
            Utc::now(),
            delay_minutes,
        );

        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            () = tokio::time::sleep(wait) => {
                let worker = Arc::clone(&engine);
                let compaction = tokio::task::spawn_blocking(move || worker.run_daily_compaction());
                if let Err(e) = compaction.await {
                    error!("Compaction task failed: {e}");
                }
                info!(
                    "Next compaction at {}",
                    schedule::next_compaction(engine.clock().now(), delay_minutes)
                );
            }
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = input::handle_line(&engine, &line) {
                        error!("Skipping collector message: {e:#}");
                    }
                }
                Ok(None) => {
                    info!("Collector input closed, continuing with scheduled compaction only");
                    input_open = false;
                }
                Err(e) => {
                    error!("Collector input failed: {e}");
                    input_open = false;
                }
            },
        }
    }

    Ok(())
}
