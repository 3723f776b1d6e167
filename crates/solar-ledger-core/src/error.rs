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

//! Error types for the ledger crate

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt {column} value {value:?}: {reason}")]
    CorruptValue {
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("unknown duration {0:?}, expected one of: day, week, month, year")]
    InvalidDuration(String),

    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
