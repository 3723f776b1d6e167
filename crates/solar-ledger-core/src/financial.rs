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

//! Conversion of accumulated watt readings into energy and money.
//!
//! Watt totals are sums of instantaneous readings taken once per collection
//! interval, so one reading of `w` watts stands for `w * interval / 60` watt
//! hours. All arithmetic is exact decimal.

use rust_decimal::{Decimal, dec};
use tracing::trace;

const MINUTES_PER_HOUR: Decimal = dec!(60);
const WATTS_PER_KILOWATT: Decimal = dec!(1000);

/// Converts a sum of per-interval watt readings into kilowatt hours.
#[must_use]
pub fn to_kwh(watts: i64, interval_minutes: Decimal) -> Decimal {
    Decimal::from(watts) * interval_minutes / MINUTES_PER_HOUR / WATTS_PER_KILOWATT
}

/// Values a watt total at `rate` per kWh.
#[must_use]
pub fn value(watts: i64, rate: Decimal, interval_minutes: Decimal, label: &str) -> Decimal {
    let amount = to_kwh(watts, interval_minutes) * rate;
    trace!("{label}: {watts} W at {rate}/kWh every {interval_minutes} min = {amount}");
    amount
}

/// Price of energy drawn from the grid.
#[must_use]
pub fn cost(excess_consumption: i64, charge_rate: Decimal, interval_minutes: Decimal) -> Decimal {
    value(excess_consumption, charge_rate, interval_minutes, "Cost")
}

/// Feed-in payment for energy pushed to the grid.
#[must_use]
pub fn payment(
    excess_production: i64,
    payment_rate: Decimal,
    interval_minutes: Decimal,
) -> Decimal {
    value(excess_production, payment_rate, interval_minutes, "Payment")
}

/// Self-consumed production, valued at what it would have cost to import.
#[must_use]
pub fn savings(
    total_production: i64,
    excess_production: i64,
    charge_rate: Decimal,
    interval_minutes: Decimal,
) -> Decimal {
    value(
        total_production - excess_production,
        charge_rate,
        interval_minutes,
        "Savings",
    )
}

#[must_use]
pub fn net(cost: Decimal, payment: Decimal, daily_supply_charge: Decimal) -> Decimal {
    cost + daily_supply_charge - payment
}
