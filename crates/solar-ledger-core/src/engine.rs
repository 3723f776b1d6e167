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

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::compactor;
use crate::error::Result;
use crate::store::LedgerStore;
use crate::tariff::{TariffSettings, TariffUpgrade, upgrade_tariff};
use crate::types::{CompactionReport, MeasurementEvent};

/// Installation parameters the engine needs at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Collection interval length in minutes; converts watt sums to kWh
    pub interval_minutes: Decimal,
    /// Width of the watt buckets used by the panel ranking
    pub panel_bucket_watts: i64,
    pub tariff: TariffSettings,
}

/// What happened during [`SolarLedger::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub tariff: TariffUpgrade,
    /// Legacy summaries that received the current conversion factor
    pub backfilled: usize,
    /// `None` when the startup compaction failed and was rolled back
    pub compaction: Option<CompactionReport>,
}

/// Aggregation and tariff engine for one monitored installation.
///
/// Owns the store and the local clock. Recording and compaction go through
/// write scopes; queries (see the `query` module) only ever read.
#[derive(Debug)]
pub struct SolarLedger<S, C> {
    pub(crate) store: S,
    pub(crate) clock: C,
    pub(crate) settings: EngineSettings,
}

impl<S: LedgerStore, C: Clock> SolarLedger<S, C> {
    pub fn new(store: S, clock: C, settings: EngineSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Startup sequence. Must complete before the first event is recorded or
    /// any financial figure is queried.
    ///
    /// Reconciles the tariff table with the configuration and back-fills the
    /// conversion factor of legacy summaries in one write, then compacts
    /// whatever history is left from before today.
    pub fn initialize(&self) -> Result<StartupReport> {
        let today = self.clock.today();
        let (tariff, backfilled) = self.store.write(|ledger| {
            let tariff = upgrade_tariff(ledger, &self.settings.tariff, today)?;
            let backfilled = ledger.backfill_conversion(self.settings.interval_minutes)?;
            Ok((tariff, backfilled))
        })?;

        if backfilled > 0 {
            info!(
                "Back-filled conversion factor {} on {backfilled} summaries",
                self.settings.interval_minutes
            );
        }

        let compaction = self.run_daily_compaction();
        Ok(StartupReport {
            tariff,
            backfilled,
            compaction,
        })
    }

    /// Appends an event and advances the installation's last read time.
    pub fn record_event(&self, event: &MeasurementEvent) -> Result<i64> {
        let id = self.store.write(|ledger| {
            let id = ledger.insert_event(event)?;
            let mut state = ledger.installation()?;
            if state.last_read_time.is_none_or(|last| last <= event.timestamp) {
                state.last_read_time = Some(event.timestamp);
                ledger.save_installation(&state)?;
            }
            Ok(id)
        })?;

        debug!(
            "Recorded event {id} at {}: {} W produced, {} W consumed, {} panels",
            event.timestamp,
            event.production_watts,
            event.consumption_watts,
            event.panels.len()
        );
        Ok(id)
    }

    /// Stores the device identity reported by the collector.
    pub fn record_system_info(&self, serial_number: &str, software_version: &str) -> Result<()> {
        self.store.write(|ledger| {
            let mut state = ledger.installation()?;
            state.serial_number = Some(serial_number.to_owned());
            state.software_version = Some(software_version.to_owned());
            ledger.save_installation(&state)
        })?;
        info!("Installation {serial_number} running software {software_version}");
        Ok(())
    }

    /// Compacts everything before local midnight; failures are logged only.
    pub fn run_daily_compaction(&self) -> Option<CompactionReport> {
        compactor::run_daily_compaction(
            &self.store,
            self.clock.midnight(),
            self.settings.interval_minutes,
        )
    }

    /// Same pass as [`Self::run_daily_compaction`] but propagates failures.
    pub fn compact_now(&self) -> Result<CompactionReport> {
        compactor::compact_before(
            &self.store,
            self.clock.midnight(),
            self.settings.interval_minutes,
        )
    }
}
