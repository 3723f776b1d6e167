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

//! JSON-lines input from the collector
//!
//! Each line carries one message tagged by `kind`:
//!
//! ```text
//! {"kind":"event","timestamp":"2024-05-01T12:05:00","production_watts":1800,"consumption_watts":650,"panels":[{"panel_id":"A1","watts":310}]}
//! {"kind":"system_info","serial_number":"SN-0042","software_version":"2.1.7"}
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use solar_ledger_core::{Clock, LedgerStore, MeasurementEvent, SolarLedger};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectorMessage {
    Event(MeasurementEvent),
    SystemInfo {
        serial_number: String,
        software_version: String,
    },
}

impl CollectorMessage {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("Malformed collector message")
    }
}

/// Applies one input line. Blank lines are ignored; returns whether a
/// message was applied.
pub fn handle_line<S: LedgerStore, C: Clock>(
    ledger: &SolarLedger<S, C>,
    line: &str,
) -> Result<bool> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }

    match CollectorMessage::parse(line)? {
        CollectorMessage::Event(event) => {
            if event.timestamp < ledger.clock().midnight() {
                warn!(
                    "Event at {} belongs to an earlier day, it will be merged on the next compaction",
                    event.timestamp
                );
            }
            ledger.record_event(&event)?;
        }
        CollectorMessage::SystemInfo {
            serial_number,
            software_version,
        } => ledger.record_system_info(&serial_number, &software_version)?,
    }
    Ok(true)
}
