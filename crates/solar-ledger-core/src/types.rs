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

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::financial;

/// Instantaneous output of a single micro-inverter panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelReading {
    pub panel_id: String,
    pub watts: i64,
}

/// One collection interval reported by the monitoring device.
///
/// `timestamp` is the installation-local wall clock time of the reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementEvent {
    pub timestamp: NaiveDateTime,
    pub production_watts: i64,
    pub consumption_watts: i64,
    #[serde(default)]
    pub voltage: Decimal,
    #[serde(default)]
    pub panels: Vec<PanelReading>,
}

impl MeasurementEvent {
    /// Production not consumed locally during this interval (grid export).
    pub fn excess_production(&self) -> i64 {
        (self.production_watts - self.consumption_watts).max(0)
    }

    /// Consumption not covered by production during this interval (grid import).
    pub fn excess_consumption(&self) -> i64 {
        (self.consumption_watts - self.production_watts).max(0)
    }
}

/// An effective-dated electricity rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffVersion {
    /// Paid by the retailer for each exported kWh
    pub payment_per_kwh: Decimal,
    /// Charged by the retailer for each imported kWh
    pub charge_per_kwh: Decimal,
    /// Fixed charge per calendar day
    pub daily_supply_charge: Decimal,
    pub effective_from: NaiveDate,
}

impl TariffVersion {
    /// The rate that applies when no version has been recorded for a date.
    #[must_use]
    pub fn zero(date: NaiveDate) -> Self {
        Self {
            payment_per_kwh: Decimal::ZERO,
            charge_per_kwh: Decimal::ZERO,
            daily_supply_charge: Decimal::ZERO,
            effective_from: date,
        }
    }
}

/// Watt sums over a set of collection intervals.
///
/// Every field except `events` is a sum of per-interval watt readings (or a
/// maximum for `peak_production_watts`), convert with [`financial::to_kwh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalTotals {
    pub production_watts: i64,
    pub consumption_watts: i64,
    pub excess_production_watts: i64,
    pub excess_consumption_watts: i64,
    pub peak_production_watts: i64,
    pub events: i64,
}

/// Interval totals for one calendar date, as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub totals: IntervalTotals,
}

/// Compacted energy and tariff figures for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub production_watts: i64,
    pub consumption_watts: i64,
    /// Sum of excess consumption, i.e. grid import
    pub imported_watts: i64,
    /// Sum of excess production, i.e. grid export
    pub exported_watts: i64,
    pub peak_production_watts: i64,
    /// Collection interval length (minutes) the watt sums were recorded at
    pub conversion_minutes: Decimal,
    /// Tariff that was active on `date` when the summary was written
    pub tariff: Option<TariffVersion>,
}

impl DailySummary {
    /// Empty entry used to fill dates without a persisted summary.
    #[must_use]
    pub fn placeholder(date: NaiveDate) -> Self {
        Self {
            date,
            production_watts: 0,
            consumption_watts: 0,
            imported_watts: 0,
            exported_watts: 0,
            peak_production_watts: 0,
            conversion_minutes: Decimal::ZERO,
            tariff: None,
        }
    }

    #[must_use]
    pub fn from_totals(
        daily: &DailyTotals,
        conversion_minutes: Decimal,
        tariff: TariffVersion,
    ) -> Self {
        let totals = &daily.totals;
        Self {
            date: daily.date,
            production_watts: totals.production_watts,
            consumption_watts: totals.consumption_watts,
            imported_watts: totals.excess_consumption_watts,
            exported_watts: totals.excess_production_watts,
            peak_production_watts: totals.peak_production_watts,
            conversion_minutes,
            tariff: Some(tariff),
        }
    }

    /// Adds the totals of events recorded for this date after it was summarized.
    ///
    /// Watt sums accumulate and the peak keeps the larger value. The tariff
    /// snapshot and conversion factor stay as first written.
    pub fn absorb(&mut self, late: &IntervalTotals) {
        self.production_watts += late.production_watts;
        self.consumption_watts += late.consumption_watts;
        self.imported_watts += late.excess_consumption_watts;
        self.exported_watts += late.excess_production_watts;
        self.peak_production_watts = self.peak_production_watts.max(late.peak_production_watts);
    }

    pub fn is_placeholder(&self) -> bool {
        self.tariff.is_none() && self.production_watts == 0 && self.consumption_watts == 0
    }

    pub fn imported_kwh(&self) -> Decimal {
        financial::to_kwh(self.imported_watts, self.conversion_minutes)
    }

    pub fn exported_kwh(&self) -> Decimal {
        financial::to_kwh(self.exported_watts, self.conversion_minutes)
    }

    pub fn production_kwh(&self) -> Decimal {
        financial::to_kwh(self.production_watts, self.conversion_minutes)
    }

    pub fn consumption_kwh(&self) -> Decimal {
        financial::to_kwh(self.consumption_watts, self.conversion_minutes)
    }

    pub fn cost(&self) -> Decimal {
        self.tariff.as_ref().map_or(Decimal::ZERO, |t| {
            financial::cost(self.imported_watts, t.charge_per_kwh, self.conversion_minutes)
        })
    }

    pub fn payment(&self) -> Decimal {
        self.tariff.as_ref().map_or(Decimal::ZERO, |t| {
            financial::payment(self.exported_watts, t.payment_per_kwh, self.conversion_minutes)
        })
    }

    pub fn savings(&self) -> Decimal {
        self.tariff.as_ref().map_or(Decimal::ZERO, |t| {
            financial::savings(
                self.production_watts,
                self.exported_watts,
                t.charge_per_kwh,
                self.conversion_minutes,
            )
        })
    }

    /// Amount owed to the retailer for the day: cost plus supply charge, less payment.
    pub fn net(&self) -> Decimal {
        self.tariff.as_ref().map_or(Decimal::ZERO, |t| {
            financial::net(self.cost(), self.payment(), t.daily_supply_charge)
        })
    }
}

/// Singleton describing the monitored installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationState {
    /// Timestamp of the most recently recorded event
    pub last_read_time: Option<NaiveDateTime>,
    pub serial_number: Option<String>,
    pub software_version: Option<String>,
}

/// Per-panel aggregates over a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelTotals {
    pub panel_id: String,
    pub peak_watts: i64,
    pub total_watts: i64,
    pub readings: i64,
}

/// Outcome of one compaction pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub cutoff: NaiveDateTime,
    /// Dates that received a (new or overwritten) summary
    pub days: Vec<NaiveDate>,
    pub purged_events: usize,
    pub purged_panels: usize,
}
