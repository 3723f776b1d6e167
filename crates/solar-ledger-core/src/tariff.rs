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

//! Effective-dated tariff table
//!
//! Versions are only ever appended. The version in force on a date is the one
//! with the latest `effective_from` on or before it; dates before the first
//! version fall back to a zero rate.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::Ledger;
use crate::types::TariffVersion;

/// Rates as currently configured for the installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffSettings {
    pub payment_per_kwh: Decimal,
    pub charge_per_kwh: Decimal,
    #[serde(default)]
    pub daily_supply_charge: Decimal,
    /// Date the configured rates start to apply; when absent a changed charge
    /// rate applies from today.
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

impl TariffSettings {
    fn version_from(&self, effective_from: NaiveDate) -> TariffVersion {
        TariffVersion {
            payment_per_kwh: self.payment_per_kwh,
            charge_per_kwh: self.charge_per_kwh,
            daily_supply_charge: self.daily_supply_charge,
            effective_from,
        }
    }
}

/// What [`upgrade_tariff`] did to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TariffUpgrade {
    /// Table was empty; seeded from the first summarized day (or today).
    Seeded(TariffVersion),
    /// Charge rate changed without an explicit date; applies from today.
    ChangedToday(TariffVersion),
    /// Explicit effective date after the active version.
    Scheduled(TariffVersion),
    Unchanged,
}

/// Version in force on `date`, or the zero rate if nothing applies yet.
pub fn active_tariff(ledger: &dyn Ledger, date: NaiveDate) -> Result<TariffVersion> {
    Ok(ledger
        .tariff_on(date)?
        .unwrap_or_else(|| TariffVersion::zero(date)))
}

/// Reconciles the table with the configured rates. Runs once at startup,
/// before anything snapshots or prices with the active tariff.
pub fn upgrade_tariff(
    ledger: &dyn Ledger,
    settings: &TariffSettings,
    today: NaiveDate,
) -> Result<TariffUpgrade> {
    let Some(active) = ledger.tariff_on(today)? else {
        let effective_from = ledger.first_summary_date()?.unwrap_or(today);
        info!("Seeding tariff table, first version effective {effective_from}");
        return store(ledger, settings.version_from(effective_from)).map(TariffUpgrade::Seeded);
    };

    match settings.effective_date {
        None if active.charge_per_kwh != settings.charge_per_kwh => {
            info!(
                "Charge rate changed from {} to {}, new version effective today ({today})",
                active.charge_per_kwh, settings.charge_per_kwh
            );
            store(ledger, settings.version_from(today)).map(TariffUpgrade::ChangedToday)
        }
        Some(effective) if effective > active.effective_from => {
            let version = settings.version_from(effective);
            if ledger.tariff_on(effective)?.as_ref() == Some(&version) {
                debug!("Tariff version effective {effective} already scheduled");
                return Ok(TariffUpgrade::Unchanged);
            }
            info!("New tariff version scheduled effective {effective}");
            store(ledger, version).map(TariffUpgrade::Scheduled)
        }
        _ => {
            debug!(
                "Tariff table up to date, active version effective {}",
                active.effective_from
            );
            Ok(TariffUpgrade::Unchanged)
        }
    }
}

fn store(ledger: &dyn Ledger, version: TariffVersion) -> Result<TariffVersion> {
    ledger.insert_tariff(&version)?;
    Ok(version)
}
