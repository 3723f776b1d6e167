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

//! Daily compaction of raw events into per-date summaries
//!
//! A pass runs inside a single write scope: it writes one summary for every
//! date that still has raw events before the cutoff, snapshotting the tariff
//! active on that date, then purges those events and their panel readings.
//! If any step fails nothing is applied, so raw events are never deleted
//! without their summary. Events that arrive after their date was summarized
//! are added to the existing summary on the next pass.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::store::LedgerStore;
use crate::tariff::active_tariff;
use crate::types::{CompactionReport, DailySummary};

/// Summarizes and purges every event recorded before `cutoff`.
///
/// Re-running with no new events before `cutoff` is a no-op. Events arriving
/// late for an already summarized date are merged into that date's summary.
pub fn compact_before<S: LedgerStore>(
    store: &S,
    cutoff: NaiveDateTime,
    interval_minutes: Decimal,
) -> Result<CompactionReport> {
    store.write(|ledger| {
        let daily = ledger.daily_totals_before(cutoff)?;
        let mut days = Vec::with_capacity(daily.len());

        for totals in &daily {
            let existing = ledger.summaries_between(totals.date, totals.date)?.pop();
            let summary = match existing {
                Some(mut summary) => {
                    debug!("Merging {} late events into {}", totals.totals.events, summary.date);
                    summary.absorb(&totals.totals);
                    if summary.conversion_minutes.is_zero() {
                        summary.conversion_minutes = interval_minutes;
                    }
                    if summary.tariff.is_none() {
                        summary.tariff = Some(active_tariff(ledger, totals.date)?);
                    }
                    summary
                }
                None => {
                    let tariff = active_tariff(ledger, totals.date)?;
                    DailySummary::from_totals(totals, interval_minutes, tariff)
                }
            };
            debug!(
                "Summarizing {}: {} events, {} W imported, {} W exported",
                summary.date, totals.totals.events, summary.imported_watts, summary.exported_watts
            );
            ledger.upsert_summary(&summary)?;
            days.push(summary.date);
        }

        let purged_panels = ledger.delete_panels_before(cutoff)?;
        let purged_events = ledger.delete_events_before(cutoff)?;

        Ok(CompactionReport {
            cutoff,
            days,
            purged_events,
            purged_panels,
        })
    })
}

/// Scheduled entry point; a failed pass is logged and retried on the next run.
pub fn run_daily_compaction<S: LedgerStore>(
    store: &S,
    cutoff: NaiveDateTime,
    interval_minutes: Decimal,
) -> Option<CompactionReport> {
    match compact_before(store, cutoff, interval_minutes) {
        Ok(report) => {
            if report.days.is_empty() {
                debug!("Nothing to compact before {cutoff}");
            } else {
                info!(
                    "Compacted {} day(s) before {cutoff}, purged {} events and {} panel readings",
                    report.days.len(),
                    report.purged_events,
                    report.purged_panels
                );
            }
            Some(report)
        }
        Err(e) => {
            error!("Compaction before {cutoff} failed, raw events kept: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::types::{MeasurementEvent, PanelReading, TariffVersion};
    use chrono::NaiveDate;
    use rust_decimal::dec;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn event(timestamp: NaiveDateTime, production: i64, consumption: i64) -> MeasurementEvent {
        MeasurementEvent {
            timestamp,
            production_watts: production,
            consumption_watts: consumption,
            voltage: dec!(240),
            panels: vec![PanelReading {
                panel_id: "A1".to_owned(),
                watts: production,
            }],
        }
    }

    #[test]
    fn test_compacts_only_before_cutoff() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .write(|ledger| {
                ledger.insert_event(&event(at(1, 10, 0), 500, 200))?;
                ledger.insert_event(&event(at(1, 23, 59), 0, 300))?;
                ledger.insert_event(&event(at(2, 0, 0), 100, 100))?;
                Ok(())
            })
            .unwrap();

        let report = compact_before(&store, at(2, 0, 0), dec!(5)).unwrap();
        assert_eq!(report.days, vec![at(1, 0, 0).date()]);
        assert_eq!(report.purged_events, 2);
        assert_eq!(report.purged_panels, 2);

        let remaining = store.read(|ledger| ledger.events_since(at(1, 0, 0))).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, at(2, 0, 0));

        let summary = store
            .read(|ledger| ledger.summaries_between(at(1, 0, 0).date(), at(1, 0, 0).date()))
            .unwrap();
        assert_eq!(summary[0].exported_watts, 300);
        assert_eq!(summary[0].imported_watts, 300);
        assert_eq!(
            summary[0].tariff,
            Some(TariffVersion::zero(at(1, 0, 0).date()))
        );
    }

    #[test]
    fn test_empty_store_is_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = run_daily_compaction(&store, at(2, 0, 0), dec!(5)).unwrap();
        assert!(report.days.is_empty());
        assert_eq!(report.purged_events, 0);
    }
}
