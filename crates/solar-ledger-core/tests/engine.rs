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

//! End-to-end flow through the engine: startup, recording, the daily trigger,
//! tariff changes across restarts and history queries

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, dec};
use solar_ledger_core::{
    EngineSettings, FixedClock, MeasurementEvent, PanelReading, RangeDuration, SolarLedger,
    SqliteStore, TariffSettings, TariffUpgrade,
};

fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

fn settings(charge: Decimal, effective_date: Option<NaiveDate>) -> EngineSettings {
    EngineSettings {
        interval_minutes: dec!(5),
        panel_bucket_watts: 25,
        tariff: TariffSettings {
            payment_per_kwh: dec!(0.10),
            charge_per_kwh: charge,
            daily_supply_charge: dec!(1.00),
            effective_date,
        },
    }
}

fn start(
    path: &Path,
    now: NaiveDateTime,
    settings: EngineSettings,
) -> SolarLedger<SqliteStore, FixedClock> {
    let engine = SolarLedger::new(
        SqliteStore::open(path).unwrap(),
        FixedClock::new(now),
        settings,
    );
    engine.initialize().unwrap();
    engine
}

fn event(timestamp: NaiveDateTime, production: i64, consumption: i64) -> MeasurementEvent {
    MeasurementEvent {
        timestamp,
        production_watts: production,
        consumption_watts: consumption,
        voltage: dec!(240.1),
        panels: vec![
            PanelReading {
                panel_id: "roof-1".to_owned(),
                watts: production * 3 / 5,
            },
            PanelReading {
                panel_id: "roof-2".to_owned(),
                watts: production * 2 / 5,
            },
        ],
    }
}

#[test]
fn test_day_is_compacted_and_priced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let engine = start(&path, at(1, 10, 0), settings(dec!(0.25), None));

    engine.record_event(&event(at(1, 12, 0), 1200, 0)).unwrap();
    engine.record_event(&event(at(1, 12, 5), 0, 400)).unwrap();

    let today = engine.today_totals().unwrap();
    assert_eq!(today.payment, dec!(0.01));
    assert_eq!(today.cost.round_dp(5), dec!(0.00833));
    assert_eq!(engine.panel_ranking().len(), 1);

    engine.clock().set(at(2, 0, 30));
    let report = engine.run_daily_compaction().unwrap();
    assert_eq!(report.days, vec![date(1)]);
    assert!(engine.events_today().unwrap().is_empty());

    let summary = &engine.summaries(date(1), date(1)).unwrap()[0];
    assert_eq!(summary.payment(), dec!(0.01));
    assert_eq!(summary.cost().round_dp(5), dec!(0.00833));
    assert_eq!(summary.net().round_dp(5), dec!(0.99833));

    // The new day starts from zero
    let today = engine.today_totals().unwrap();
    assert_eq!(today.date, date(2));
    assert_eq!(today.events, 0);
    assert_eq!(today.cost, Decimal::ZERO);
}

#[test]
fn test_tariff_changes_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    {
        let engine = start(&path, at(1, 10, 0), settings(dec!(0.25), None));
        engine.record_event(&event(at(1, 12, 0), 0, 1200)).unwrap();
    }

    // Restart a day later with a scheduled price rise
    let engine = SolarLedger::new(
        SqliteStore::open(&path).unwrap(),
        FixedClock::new(at(2, 8, 0)),
        settings(dec!(0.30), Some(date(10))),
    );
    let startup = engine.initialize().unwrap();
    assert!(matches!(startup.tariff, TariffUpgrade::Scheduled(_)));
    assert_eq!(startup.compaction.map(|r| r.days), Some(vec![date(1)]));

    assert_eq!(engine.rate_for(date(9)).unwrap().charge_per_kwh, dec!(0.25));
    assert_eq!(engine.rate_for(date(10)).unwrap().charge_per_kwh, dec!(0.30));
    assert_eq!(engine.tariffs().unwrap().len(), 2);
    drop(engine);

    // Restarting before the scheduled date leaves the table alone
    let engine = SolarLedger::new(
        SqliteStore::open(&path).unwrap(),
        FixedClock::new(at(5, 8, 0)),
        settings(dec!(0.30), Some(date(10))),
    );
    assert_eq!(engine.initialize().unwrap().tariff, TariffUpgrade::Unchanged);
    assert_eq!(engine.tariffs().unwrap().len(), 2);
    drop(engine);

    // Restart again with an undated change; applies from that day
    let engine = start(&path, at(12, 9, 0), settings(dec!(0.35), None));
    assert_eq!(engine.rate_for(date(11)).unwrap().charge_per_kwh, dec!(0.30));
    assert_eq!(engine.rate_for(date(12)).unwrap().charge_per_kwh, dec!(0.35));

    // Summary of the first day keeps its original price
    let history = engine.history(RangeDuration::Month).unwrap();
    assert_eq!(history.len(), 30);
    assert_eq!(history.last().map(|s| s.date), Some(date(12)));
    let first_day = history.iter().find(|s| s.date == date(1)).unwrap();
    assert_eq!(first_day.tariff.as_ref().map(|t| t.charge_per_kwh), Some(dec!(0.25)));
    assert_eq!(first_day.cost(), dec!(0.025));
    assert_eq!(history.iter().filter(|s| !s.is_placeholder()).count(), 1);
}

#[test]
fn test_year_history_on_empty_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let engine = start(
        &dir.path().join("ledger.db"),
        at(1, 10, 0),
        settings(dec!(0.25), None),
    );
    let year = engine.history_named("year").unwrap();
    assert_eq!(year.len(), 365);
    assert!(year.iter().all(|s| s.is_placeholder()));
    assert_eq!(engine.max_panel_production().panel_count, 0);
}
