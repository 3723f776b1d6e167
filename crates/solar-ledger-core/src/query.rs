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

//! Read-only queries over the ledger
//!
//! Every query runs in a read scope and returns zero-valued results when there
//! is no data. "Today" means events at or after local midnight.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::clock::Clock;
use crate::engine::SolarLedger;
use crate::error::Result;
use crate::financial;
use crate::series::{RangeDuration, continuous_range};
use crate::store::LedgerStore;
use crate::tariff::active_tariff;
use crate::types::{
    DailySummary, InstallationState, MeasurementEvent, PanelReading, TariffVersion,
};

/// Running totals for the current local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayTotals {
    pub date: NaiveDate,
    pub cost: Decimal,
    pub payment: Decimal,
    pub savings: Decimal,
    pub peak_production_watts: i64,
    pub imported_kwh: Decimal,
    pub exported_kwh: Decimal,
    pub production_kwh: Decimal,
    pub consumption_kwh: Decimal,
    pub events: i64,
    /// Tariff the figures were priced with
    pub tariff: TariffVersion,
}

/// Panels of the latest event whose output falls in the same watt bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelBucket {
    /// Lower bound of the bucket
    pub watts: i64,
    /// Descending by output
    pub panels: Vec<PanelReading>,
}

/// Highest panel bucket of the latest event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPeak {
    pub watts: i64,
    pub panel_count: usize,
}

/// Output of one panel since local midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelProduction {
    pub panel_id: String,
    pub peak_watts: i64,
    pub production_kwh: Decimal,
    pub readings: i64,
}

/// Groups readings into `bucket_watts` wide buckets, highest bucket first.
///
/// Panels inside a bucket keep descending order of output. A non-positive
/// width puts every panel in its own exact-watt bucket.
pub fn rank_panels(panels: &[PanelReading], bucket_watts: i64) -> Vec<PanelBucket> {
    let mut sorted = panels.to_vec();
    sorted.sort_by(|a, b| b.watts.cmp(&a.watts).then_with(|| a.panel_id.cmp(&b.panel_id)));

    let mut buckets: Vec<PanelBucket> = Vec::new();
    for panel in sorted {
        let bucket = if bucket_watts > 0 {
            panel.watts.div_euclid(bucket_watts) * bucket_watts
        } else {
            panel.watts
        };
        match buckets.last_mut() {
            Some(last) if last.watts == bucket => last.panels.push(panel),
            _ => buckets.push(PanelBucket {
                watts: bucket,
                panels: vec![panel],
            }),
        }
    }
    buckets
}

impl<S: LedgerStore, C: Clock> SolarLedger<S, C> {
    pub fn today_totals(&self) -> Result<TodayTotals> {
        let date = self.clock.today();
        let midnight = self.clock.midnight();
        let interval = self.settings.interval_minutes;

        let (totals, tariff) = self.store.read(|ledger| {
            Ok((ledger.totals_since(midnight)?, active_tariff(ledger, date)?))
        })?;

        Ok(TodayTotals {
            date,
            cost: financial::cost(totals.excess_consumption_watts, tariff.charge_per_kwh, interval),
            payment: financial::payment(
                totals.excess_production_watts,
                tariff.payment_per_kwh,
                interval,
            ),
            savings: financial::savings(
                totals.production_watts,
                totals.excess_production_watts,
                tariff.charge_per_kwh,
                interval,
            ),
            peak_production_watts: totals.peak_production_watts,
            imported_kwh: financial::to_kwh(totals.excess_consumption_watts, interval),
            exported_kwh: financial::to_kwh(totals.excess_production_watts, interval),
            production_kwh: financial::to_kwh(totals.production_watts, interval),
            consumption_kwh: financial::to_kwh(totals.consumption_watts, interval),
            events: totals.events,
            tariff,
        })
    }

    /// Most recently recorded event, located through the installation's last
    /// read time.
    pub fn last_event(&self) -> Result<Option<MeasurementEvent>> {
        self.store.read(|ledger| match ledger.installation()?.last_read_time {
            Some(timestamp) => ledger.event_at(timestamp),
            None => Ok(None),
        })
    }

    /// Panels of the latest event ranked into watt buckets.
    ///
    /// Never fails: a storage error is logged and yields an empty ranking.
    pub fn panel_ranking(&self) -> Vec<PanelBucket> {
        match self.last_event() {
            Ok(Some(event)) => rank_panels(&event.panels, self.settings.panel_bucket_watts),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Failed to load the latest panel readings: {e}");
                Vec::new()
            }
        }
    }

    pub fn max_panel_production(&self) -> PanelPeak {
        self.panel_ranking()
            .first()
            .map(|bucket| PanelPeak {
                watts: bucket.watts,
                panel_count: bucket.panels.len(),
            })
            .unwrap_or_default()
    }

    pub fn panel_production_today(&self) -> Result<Vec<PanelProduction>> {
        let midnight = self.clock.midnight();
        let interval = self.settings.interval_minutes;
        let totals = self.store.read(|ledger| ledger.panel_totals_since(midnight))?;

        Ok(totals
            .into_iter()
            .map(|panel| PanelProduction {
                production_kwh: financial::to_kwh(panel.total_watts, interval),
                panel_id: panel.panel_id,
                peak_watts: panel.peak_watts,
                readings: panel.readings,
            })
            .collect())
    }

    pub fn events_today(&self) -> Result<Vec<MeasurementEvent>> {
        let midnight = self.clock.midnight();
        self.store.read(|ledger| ledger.events_since(midnight))
    }

    /// Gap-free daily series for the window ending today.
    pub fn history(&self, duration: RangeDuration) -> Result<Vec<DailySummary>> {
        let (start, end) = duration.range(self.clock.today());
        let persisted = self.summaries(start, end)?;
        Ok(continuous_range(persisted, start, end))
    }

    /// [`Self::history`] for a duration given by name.
    pub fn history_named(&self, duration: &str) -> Result<Vec<DailySummary>> {
        let duration = duration.parse::<RangeDuration>().inspect_err(|e| warn!("{e}"))?;
        self.history(duration)
    }

    /// Persisted summaries in `[from, to]`, without placeholders.
    pub fn summaries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailySummary>> {
        self.store.read(|ledger| ledger.summaries_between(from, to))
    }

    pub fn rate_for(&self, date: NaiveDate) -> Result<TariffVersion> {
        self.store.read(|ledger| active_tariff(ledger, date))
    }

    pub fn tariffs(&self) -> Result<Vec<TariffVersion>> {
        self.store.read(|ledger| ledger.tariffs())
    }

    pub fn installation(&self) -> Result<InstallationState> {
        self.store.read(|ledger| ledger.installation())
    }
}
