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

//! Storage contracts the engine relies on.
//!
//! Aggregates (excess sums, maxima) are part of the contract so that callers
//! never have to load raw history into memory. Time windows are half open:
//! `*_before(cutoff)` covers `timestamp < cutoff`, `*_since(start)` covers
//! `timestamp >= start`, so the two never overlap.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::types::{
    DailySummary, DailyTotals, InstallationState, IntervalTotals, MeasurementEvent, PanelTotals,
    TariffVersion,
};

/// Queries and commands over the persisted ledger.
pub trait Ledger {
    // Events

    /// Appends an event together with its panel readings, returning its row id.
    fn insert_event(&self, event: &MeasurementEvent) -> Result<i64>;

    /// Most recently inserted event recorded exactly at `timestamp`.
    fn event_at(&self, timestamp: NaiveDateTime) -> Result<Option<MeasurementEvent>>;

    /// Events at or after `start`, oldest first.
    fn events_since(&self, start: NaiveDateTime) -> Result<Vec<MeasurementEvent>>;

    fn totals_since(&self, start: NaiveDateTime) -> Result<IntervalTotals>;

    fn panel_totals_since(&self, start: NaiveDateTime) -> Result<Vec<PanelTotals>>;

    /// Per-date totals of every event before `cutoff`, ascending by date.
    fn daily_totals_before(&self, cutoff: NaiveDateTime) -> Result<Vec<DailyTotals>>;

    /// Deletes the panel readings of events before `cutoff`. Must run before
    /// [`Ledger::delete_events_before`].
    fn delete_panels_before(&self, cutoff: NaiveDateTime) -> Result<usize>;

    fn delete_events_before(&self, cutoff: NaiveDateTime) -> Result<usize>;

    // Summaries

    /// Inserts the summary or replaces the one already stored for its date.
    fn upsert_summary(&self, summary: &DailySummary) -> Result<()>;

    fn first_summary_date(&self) -> Result<Option<NaiveDate>>;

    /// Summaries dated within `[from, to]`, ascending by date.
    fn summaries_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailySummary>>;

    /// Sets the conversion factor on summaries stored without one.
    fn backfill_conversion(&self, interval_minutes: Decimal) -> Result<usize>;

    // Tariffs

    /// Version with the greatest `effective_from <= date`.
    fn tariff_on(&self, date: NaiveDate) -> Result<Option<TariffVersion>>;

    fn insert_tariff(&self, tariff: &TariffVersion) -> Result<()>;

    /// Every stored version, ascending by effective date.
    fn tariffs(&self) -> Result<Vec<TariffVersion>>;

    // Installation

    fn installation(&self) -> Result<InstallationState>;

    fn save_installation(&self, state: &InstallationState) -> Result<()>;
}

/// Hands out [`Ledger`] access scoped to a transaction.
///
/// Everything done inside one `write` call becomes visible atomically, or not
/// at all if the closure returns an error. A `read` never observes a `write`
/// that is still in progress.
pub trait LedgerStore: Send + Sync {
    fn read<T>(&self, work: impl FnOnce(&dyn Ledger) -> Result<T>) -> Result<T>;

    fn write<T>(&self, work: impl FnOnce(&dyn Ledger) -> Result<T>) -> Result<T>;
}
