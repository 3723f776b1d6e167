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

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use solar_ledger_core::{DailySummary, PanelBucket, PanelPeak, PanelProduction};

/// A history row with its derived energy and money figures.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub summary: DailySummary,
    pub imported_kwh: Decimal,
    pub exported_kwh: Decimal,
    pub production_kwh: Decimal,
    pub consumption_kwh: Decimal,
    pub cost: Decimal,
    pub payment: Decimal,
    pub savings: Decimal,
    pub net: Decimal,
}

impl From<DailySummary> for HistoryEntry {
    fn from(summary: DailySummary) -> Self {
        Self {
            imported_kwh: summary.imported_kwh(),
            exported_kwh: summary.exported_kwh(),
            production_kwh: summary.production_kwh(),
            consumption_kwh: summary.consumption_kwh(),
            cost: summary.cost(),
            payment: summary.payment(),
            savings: summary.savings(),
            net: summary.net(),
            summary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PanelReport {
    pub max: PanelPeak,
    pub ranking: Vec<PanelBucket>,
    pub today: Vec<PanelProduction>,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::dec;
    use solar_ledger_core::TariffVersion;

    #[test]
    fn test_history_entry_flattens_summary() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let summary = DailySummary {
            exported_watts: 1200,
            imported_watts: 400,
            conversion_minutes: dec!(5),
            tariff: Some(TariffVersion {
                payment_per_kwh: dec!(0.10),
                charge_per_kwh: dec!(0.25),
                daily_supply_charge: dec!(1.00),
                effective_from: date,
            }),
            ..DailySummary::placeholder(date)
        };

        let json = serde_json::to_value(HistoryEntry::from(summary)).unwrap();
        assert_eq!(json["date"], "2024-05-01");
        assert_eq!(json["exported_watts"], 1200);
        let payment: Decimal = json["payment"].as_str().unwrap().parse().unwrap();
        assert_eq!(payment, dec!(0.01));
    }
}
