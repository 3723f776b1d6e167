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

//! Aggregation and tariff-versioning engine for a home solar installation.
//!
//! Raw measurement events are recorded as they arrive and compacted once a day
//! into per-date summaries priced with the tariff version that was active on
//! that date. Queries reconstruct gap-free daily series from the summaries.

pub mod clock;
pub mod compactor;
pub mod db;
pub mod engine;
pub mod error;
pub mod financial;
pub mod query;
pub mod series;
pub mod store;
pub mod tariff;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use compactor::{compact_before, run_daily_compaction};
pub use db::SqliteStore;
pub use engine::{EngineSettings, SolarLedger, StartupReport};
pub use error::{LedgerError, Result};
pub use query::{PanelBucket, PanelPeak, PanelProduction, TodayTotals, rank_panels};
pub use series::{RangeDuration, continuous_range};
pub use store::{Ledger, LedgerStore};
pub use tariff::{TariffSettings, TariffUpgrade, active_tariff, upgrade_tariff};
pub use types::*;
