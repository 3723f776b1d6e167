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

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::types::DailySummary;

/// Predefined history window ending today.
///
/// Every window is rolling: `week` is the last 7 days including today, `month`
/// the last 30 and `year` the last 365.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeDuration {
    Day,
    Week,
    Month,
    Year,
}

impl RangeDuration {
    pub fn all() -> &'static [Self] {
        &[Self::Day, Self::Week, Self::Month, Self::Year]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Number of calendar days covered, today included.
    pub fn days(self) -> u64 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
        }
    }

    /// Inclusive `(start, end)` of the window ending on `today`.
    pub fn range(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = today
            .checked_sub_days(Days::new(self.days() - 1))
            .unwrap_or(NaiveDate::MIN);
        (start, today)
    }
}

impl fmt::Display for RangeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeDuration {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LedgerError::InvalidDuration(s.to_owned()))
    }
}

/// Produces exactly one entry per date in `[start, end]`.
///
/// `persisted` must be sorted ascending by date. Dates without a persisted
/// summary get a placeholder; persisted entries outside the window or
/// repeating an already emitted date are skipped.
pub fn continuous_range(
    persisted: impl IntoIterator<Item = DailySummary>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailySummary> {
    let capacity = usize::try_from((end - start).num_days() + 1).unwrap_or(0);
    let mut series = Vec::with_capacity(capacity);
    let mut persisted = persisted.into_iter().peekable();
    let mut cursor = start;

    while cursor <= end {
        while persisted.next_if(|s| s.date < cursor).is_some() {}

        let entry = persisted
            .next_if(|s| s.date == cursor)
            .unwrap_or_else(|| DailySummary::placeholder(cursor));
        series.push(entry);

        let Some(next) = cursor.succ_opt() else {
            break;
        };
        cursor = next;
    }

    series
}
