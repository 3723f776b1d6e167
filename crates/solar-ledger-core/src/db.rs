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

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::store::{Ledger, LedgerStore};
use crate::types::{
    DailySummary, DailyTotals, InstallationState, IntervalTotals, MeasurementEvent, PanelReading,
    PanelTotals, TariffVersion,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS events (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        recorded_at        TEXT NOT NULL,
        production_watts   INTEGER NOT NULL,
        consumption_watts  INTEGER NOT NULL,
        voltage            TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_events_recorded_at ON events(recorded_at);

    CREATE TABLE IF NOT EXISTS panel_readings (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id           INTEGER NOT NULL,
        panel_id           TEXT NOT NULL,
        watts              INTEGER NOT NULL,
        FOREIGN KEY (event_id) REFERENCES events(id)
    );

    CREATE INDEX IF NOT EXISTS idx_panel_readings_event ON panel_readings(event_id);

    CREATE TABLE IF NOT EXISTS summaries (
        day                    TEXT PRIMARY KEY,
        production_watts       INTEGER NOT NULL,
        consumption_watts      INTEGER NOT NULL,
        imported_watts         INTEGER NOT NULL,
        exported_watts         INTEGER NOT NULL,
        peak_production_watts  INTEGER NOT NULL,
        tariff_effective_from  TEXT,
        payment_per_kwh        TEXT,
        charge_per_kwh         TEXT,
        daily_supply_charge    TEXT
    );

    CREATE TABLE IF NOT EXISTS tariffs (
        id                   INTEGER PRIMARY KEY AUTOINCREMENT,
        effective_from       TEXT NOT NULL,
        payment_per_kwh      TEXT NOT NULL,
        charge_per_kwh       TEXT NOT NULL,
        daily_supply_charge  TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tariffs_effective ON tariffs(effective_from);

    CREATE TABLE IF NOT EXISTS installation (
        id                 INTEGER PRIMARY KEY CHECK (id = 1),
        last_read_time     TEXT,
        serial_number      TEXT,
        software_version   TEXT
    );";

/// SQLite-backed ledger. A single connection serializes all access.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Opening ledger database at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        // Databases written before conversion tracking lack the column; the
        // error for an existing column is expected and ignored.
        let _ = conn.execute_batch("ALTER TABLE summaries ADD COLUMN conversion_minutes TEXT");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl LedgerStore for SqliteStore {
    fn read<T>(&self, work: impl FnOnce(&dyn Ledger) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        // Dropped without commit: a read scope never changes anything.
        let tx = conn.transaction()?;
        work(&SqliteLedger { conn: &tx })
    }

    fn write<T>(&self, work: impl FnOnce(&dyn Ledger) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let output = work(&SqliteLedger { conn: &tx })?;
        tx.commit()?;
        Ok(output)
    }
}

/// [`Ledger`] over a connection that is already inside a transaction.
struct SqliteLedger<'c> {
    conn: &'c Connection,
}

fn parse_decimal(column: &'static str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| LedgerError::CorruptValue {
        column,
        value: value.to_owned(),
        reason: e.to_string(),
    })
}

struct EventRow {
    id: i64,
    recorded_at: NaiveDateTime,
    production_watts: i64,
    consumption_watts: i64,
    voltage: String,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            recorded_at: row.get(1)?,
            production_watts: row.get(2)?,
            consumption_watts: row.get(3)?,
            voltage: row.get(4)?,
        })
    }

    fn into_event(self, panels: Vec<PanelReading>) -> Result<MeasurementEvent> {
        Ok(MeasurementEvent {
            timestamp: self.recorded_at,
            production_watts: self.production_watts,
            consumption_watts: self.consumption_watts,
            voltage: parse_decimal("events.voltage", &self.voltage)?,
            panels,
        })
    }
}

struct SummaryRow {
    day: NaiveDate,
    production_watts: i64,
    consumption_watts: i64,
    imported_watts: i64,
    exported_watts: i64,
    peak_production_watts: i64,
    conversion_minutes: Option<String>,
    tariff_effective_from: Option<NaiveDate>,
    payment_per_kwh: Option<String>,
    charge_per_kwh: Option<String>,
    daily_supply_charge: Option<String>,
}

impl SummaryRow {
    fn into_summary(self) -> Result<DailySummary> {
        let conversion_minutes = match self.conversion_minutes.as_deref() {
            Some(value) => parse_decimal("summaries.conversion_minutes", value)?,
            None => Decimal::ZERO,
        };
        let tariff = match (
            self.tariff_effective_from,
            self.payment_per_kwh.as_deref(),
            self.charge_per_kwh.as_deref(),
            self.daily_supply_charge.as_deref(),
        ) {
            (Some(effective_from), Some(payment), Some(charge), Some(supply)) => {
                Some(TariffVersion {
                    payment_per_kwh: parse_decimal("summaries.payment_per_kwh", payment)?,
                    charge_per_kwh: parse_decimal("summaries.charge_per_kwh", charge)?,
                    daily_supply_charge: parse_decimal("summaries.daily_supply_charge", supply)?,
                    effective_from,
                })
            }
            _ => None,
        };

        Ok(DailySummary {
            date: self.day,
            production_watts: self.production_watts,
            consumption_watts: self.consumption_watts,
            imported_watts: self.imported_watts,
            exported_watts: self.exported_watts,
            peak_production_watts: self.peak_production_watts,
            conversion_minutes,
            tariff,
        })
    }
}

struct TariffRow {
    effective_from: NaiveDate,
    payment_per_kwh: String,
    charge_per_kwh: String,
    daily_supply_charge: String,
}

impl TariffRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            effective_from: row.get(0)?,
            payment_per_kwh: row.get(1)?,
            charge_per_kwh: row.get(2)?,
            daily_supply_charge: row.get(3)?,
        })
    }

    fn into_tariff(self) -> Result<TariffVersion> {
        Ok(TariffVersion {
            payment_per_kwh: parse_decimal("tariffs.payment_per_kwh", &self.payment_per_kwh)?,
            charge_per_kwh: parse_decimal("tariffs.charge_per_kwh", &self.charge_per_kwh)?,
            daily_supply_charge: parse_decimal(
                "tariffs.daily_supply_charge",
                &self.daily_supply_charge,
            )?,
            effective_from: self.effective_from,
        })
    }
}

fn interval_totals(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<IntervalTotals> {
    Ok(IntervalTotals {
        production_watts: row.get(offset)?,
        consumption_watts: row.get(offset + 1)?,
        excess_production_watts: row.get(offset + 2)?,
        excess_consumption_watts: row.get(offset + 3)?,
        peak_production_watts: row.get(offset + 4)?,
        events: row.get(offset + 5)?,
    })
}

const TOTALS_COLUMNS: &str = "COALESCE(SUM(production_watts), 0),
        COALESCE(SUM(consumption_watts), 0),
        COALESCE(SUM(MAX(production_watts - consumption_watts, 0)), 0),
        COALESCE(SUM(MAX(consumption_watts - production_watts, 0)), 0),
        COALESCE(MAX(production_watts), 0),
        COUNT(*)";

impl SqliteLedger<'_> {
    fn panels_of(&self, event_id: i64) -> Result<Vec<PanelReading>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT panel_id, watts FROM panel_readings WHERE event_id = ?1 ORDER BY id ASC",
        )?;
        let panels = stmt
            .query_map(params![event_id], |row| {
                Ok(PanelReading {
                    panel_id: row.get(0)?,
                    watts: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(panels)
    }
}

impl Ledger for SqliteLedger<'_> {
    fn insert_event(&self, event: &MeasurementEvent) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO events (recorded_at, production_watts, consumption_watts, voltage)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.timestamp,
                event.production_watts,
                event.consumption_watts,
                event.voltage.to_string(),
            ],
        )?;
        let event_id = self.conn.last_insert_rowid();

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO panel_readings (event_id, panel_id, watts) VALUES (?1, ?2, ?3)",
        )?;
        for panel in &event.panels {
            stmt.execute(params![event_id, panel.panel_id, panel.watts])?;
        }

        Ok(event_id)
    }

    fn event_at(&self, timestamp: NaiveDateTime) -> Result<Option<MeasurementEvent>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, recorded_at, production_watts, consumption_watts, voltage
                 FROM events WHERE recorded_at = ?1 ORDER BY id DESC LIMIT 1",
                params![timestamp],
                EventRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let panels = self.panels_of(row.id)?;
                Ok(Some(row.into_event(panels)?))
            }
            None => Ok(None),
        }
    }

    fn events_since(&self, start: NaiveDateTime) -> Result<Vec<MeasurementEvent>> {
        let mut panels: HashMap<i64, Vec<PanelReading>> = HashMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT p.event_id, p.panel_id, p.watts
             FROM panel_readings p JOIN events e ON e.id = p.event_id
             WHERE e.recorded_at >= ?1
             ORDER BY p.id ASC",
        )?;
        let rows = stmt.query_map(params![start], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                PanelReading {
                    panel_id: row.get(1)?,
                    watts: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (event_id, reading) = row?;
            panels.entry(event_id).or_default().push(reading);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, recorded_at, production_watts, consumption_watts, voltage
             FROM events WHERE recorded_at >= ?1
             ORDER BY recorded_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![start], EventRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|row| {
                let readings = panels.remove(&row.id).unwrap_or_default();
                row.into_event(readings)
            })
            .collect()
    }

    fn totals_since(&self, start: NaiveDateTime) -> Result<IntervalTotals> {
        let sql = format!("SELECT {TOTALS_COLUMNS} FROM events WHERE recorded_at >= ?1");
        let totals = self
            .conn
            .query_row(&sql, params![start], |row| interval_totals(row, 0))?;
        Ok(totals)
    }

    fn panel_totals_since(&self, start: NaiveDateTime) -> Result<Vec<PanelTotals>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.panel_id, MAX(p.watts), SUM(p.watts), COUNT(*)
             FROM panel_readings p JOIN events e ON e.id = p.event_id
             WHERE e.recorded_at >= ?1
             GROUP BY p.panel_id
             ORDER BY p.panel_id ASC",
        )?;
        let totals = stmt
            .query_map(params![start], |row| {
                Ok(PanelTotals {
                    panel_id: row.get(0)?,
                    peak_watts: row.get(1)?,
                    total_watts: row.get(2)?,
                    readings: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(totals)
    }

    fn daily_totals_before(&self, cutoff: NaiveDateTime) -> Result<Vec<DailyTotals>> {
        let sql = format!(
            "SELECT date(recorded_at) AS day, {TOTALS_COLUMNS}
             FROM events WHERE recorded_at < ?1
             GROUP BY day ORDER BY day ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let days = stmt
            .query_map(params![cutoff], |row| {
                Ok(DailyTotals {
                    date: row.get(0)?,
                    totals: interval_totals(row, 1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(days)
    }

    fn delete_panels_before(&self, cutoff: NaiveDateTime) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM panel_readings
             WHERE event_id IN (SELECT id FROM events WHERE recorded_at < ?1)",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    fn delete_events_before(&self, cutoff: NaiveDateTime) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM events WHERE recorded_at < ?1", params![cutoff])?;
        Ok(deleted)
    }

    fn upsert_summary(&self, summary: &DailySummary) -> Result<()> {
        let tariff = summary.tariff.as_ref();
        self.conn.execute(
            "INSERT INTO summaries (day, production_watts, consumption_watts, imported_watts, exported_watts, peak_production_watts, conversion_minutes, tariff_effective_from, payment_per_kwh, charge_per_kwh, daily_supply_charge)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(day) DO UPDATE SET
                production_watts = ?2,
                consumption_watts = ?3,
                imported_watts = ?4,
                exported_watts = ?5,
                peak_production_watts = ?6,
                conversion_minutes = ?7,
                tariff_effective_from = ?8,
                payment_per_kwh = ?9,
                charge_per_kwh = ?10,
                daily_supply_charge = ?11",
            params![
                summary.date,
                summary.production_watts,
                summary.consumption_watts,
                summary.imported_watts,
                summary.exported_watts,
                summary.peak_production_watts,
                summary.conversion_minutes.to_string(),
                tariff.map(|t| t.effective_from),
                tariff.map(|t| t.payment_per_kwh.to_string()),
                tariff.map(|t| t.charge_per_kwh.to_string()),
                tariff.map(|t| t.daily_supply_charge.to_string()),
            ],
        )?;
        Ok(())
    }

    fn first_summary_date(&self) -> Result<Option<NaiveDate>> {
        let first = self
            .conn
            .query_row("SELECT MIN(day) FROM summaries", [], |row| row.get(0))?;
        Ok(first)
    }

    fn summaries_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT day, production_watts, consumption_watts, imported_watts, exported_watts, peak_production_watts,
                    conversion_minutes, tariff_effective_from, payment_per_kwh, charge_per_kwh, daily_supply_charge
             FROM summaries WHERE day >= ?1 AND day <= ?2
             ORDER BY day ASC",
        )?;
        let rows = stmt
            .query_map(params![from, to], |row| {
                Ok(SummaryRow {
                    day: row.get(0)?,
                    production_watts: row.get(1)?,
                    consumption_watts: row.get(2)?,
                    imported_watts: row.get(3)?,
                    exported_watts: row.get(4)?,
                    peak_production_watts: row.get(5)?,
                    conversion_minutes: row.get(6)?,
                    tariff_effective_from: row.get(7)?,
                    payment_per_kwh: row.get(8)?,
                    charge_per_kwh: row.get(9)?,
                    daily_supply_charge: row.get(10)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(SummaryRow::into_summary).collect()
    }

    fn backfill_conversion(&self, interval_minutes: Decimal) -> Result<usize> {
        let updated = self.conn.execute(
            "UPDATE summaries SET conversion_minutes = ?1 WHERE conversion_minutes IS NULL",
            params![interval_minutes.to_string()],
        )?;
        Ok(updated)
    }

    fn tariff_on(&self, date: NaiveDate) -> Result<Option<TariffVersion>> {
        let row = self
            .conn
            .query_row(
                "SELECT effective_from, payment_per_kwh, charge_per_kwh, daily_supply_charge
                 FROM tariffs WHERE effective_from <= ?1
                 ORDER BY effective_from DESC, id DESC LIMIT 1",
                params![date],
                TariffRow::from_row,
            )
            .optional()?;
        row.map(TariffRow::into_tariff).transpose()
    }

    fn insert_tariff(&self, tariff: &TariffVersion) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tariffs (effective_from, payment_per_kwh, charge_per_kwh, daily_supply_charge)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                tariff.effective_from,
                tariff.payment_per_kwh.to_string(),
                tariff.charge_per_kwh.to_string(),
                tariff.daily_supply_charge.to_string(),
            ],
        )?;
        Ok(())
    }

    fn tariffs(&self) -> Result<Vec<TariffVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT effective_from, payment_per_kwh, charge_per_kwh, daily_supply_charge
             FROM tariffs ORDER BY effective_from ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], TariffRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(TariffRow::into_tariff).collect()
    }

    fn installation(&self) -> Result<InstallationState> {
        let state = self
            .conn
            .query_row(
                "SELECT last_read_time, serial_number, software_version FROM installation WHERE id = 1",
                [],
                |row| {
                    Ok(InstallationState {
                        last_read_time: row.get(0)?,
                        serial_number: row.get(1)?,
                        software_version: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    fn save_installation(&self, state: &InstallationState) -> Result<()> {
        self.conn.execute(
            "INSERT INTO installation (id, last_read_time, serial_number, software_version)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                last_read_time = ?1,
                serial_number = ?2,
                software_version = ?3",
            params![
                state.last_read_time,
                state.serial_number,
                state.software_version,
            ],
        )?;
        Ok(())
    }
}
