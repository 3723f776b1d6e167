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

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::Deserialize;
use solar_ledger_core::{EngineSettings, SystemClock, TariffSettings};
use std::path::Path;

/// Contents of the TOML configuration file.
///
/// Rates are decimals; write them as strings (`"0.25"`) to keep them exact.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub installation: InstallationSettings,
    pub tariff: TariffSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationSettings {
    /// IANA name of the installation's timezone
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Collection interval of the monitoring device
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u64,
    #[serde(default = "default_panel_bucket_watts")]
    pub panel_bucket_watts: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    /// Minutes after local midnight at which the daily compaction runs
    #[serde(default = "default_compaction_delay_minutes")]
    pub compaction_delay_minutes: u32,
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

fn default_refresh_seconds() -> u64 {
    300
}

fn default_panel_bucket_watts() -> i64 {
    10
}

fn default_db_path() -> String {
    "./data/solar-ledger.db".to_owned()
}

fn default_compaction_delay_minutes() -> u32 {
    5
}

impl Default for InstallationSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            refresh_seconds: default_refresh_seconds(),
            panel_bucket_watts: default_panel_bucket_watts(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            compaction_delay_minutes: default_compaction_delay_minutes(),
        }
    }
}

impl LedgerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.installation.refresh_seconds == 0 {
            bail!("installation.refresh_seconds must be positive");
        }
        if self.installation.panel_bucket_watts <= 0 {
            bail!("installation.panel_bucket_watts must be positive");
        }
        self.clock()?;

        let tariff = &self.tariff;
        for (name, rate) in [
            ("payment_per_kwh", tariff.payment_per_kwh),
            ("charge_per_kwh", tariff.charge_per_kwh),
            ("daily_supply_charge", tariff.daily_supply_charge),
        ] {
            if rate.is_sign_negative() && !rate.is_zero() {
                bail!("tariff.{name} must not be negative, got {rate}");
            }
        }

        if self.schedule.compaction_delay_minutes >= 24 * 60 {
            bail!("schedule.compaction_delay_minutes must be less than a day");
        }
        Ok(())
    }

    /// Collection interval in minutes; the factor converting watt sums to kWh.
    pub fn interval_minutes(&self) -> Decimal {
        Decimal::from(self.installation.refresh_seconds) / Decimal::from(60)
    }

    pub fn clock(&self) -> Result<SystemClock> {
        SystemClock::from_name(&self.installation.timezone)
            .context("installation.timezone must be an IANA timezone name")
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            interval_minutes: self.interval_minutes(),
            panel_bucket_watts: self.installation.panel_bucket_watts,
            tariff: self.tariff.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::dec;
    use std::io::Write;

    const MINIMAL: &str = r#"
[tariff]
payment_per_kwh = "0.10"
charge_per_kwh = "0.25"
"#;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.installation.timezone, "UTC");
        assert_eq!(config.installation.refresh_seconds, 300);
        assert_eq!(config.interval_minutes(), dec!(5));
        assert_eq!(config.database.path, "./data/solar-ledger.db");
        assert_eq!(config.schedule.compaction_delay_minutes, 5);
        assert_eq!(config.tariff.daily_supply_charge, Decimal::ZERO);
        assert_eq!(config.tariff.effective_date, None);
    }

    #[test]
    fn test_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[installation]
timezone = "Australia/Sydney"
refresh_seconds = 30
panel_bucket_watts = 25

[tariff]
payment_per_kwh = "0.07"
charge_per_kwh = "0.2827"
daily_supply_charge = "1.0153"
effective_date = "2024-07-01"

[database]
path = "/var/lib/solar-ledger/ledger.db"

[schedule]
compaction_delay_minutes = 15
"#
        )
        .unwrap();

        let config = LedgerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.interval_minutes(), dec!(0.5));
        assert_eq!(config.tariff.charge_per_kwh, dec!(0.2827));
        assert_eq!(
            config.tariff.effective_date,
            NaiveDate::from_ymd_opt(2024, 7, 1)
        );
        assert_eq!(
            config.clock().unwrap().timezone(),
            chrono_tz::Australia::Sydney
        );

        let settings = config.engine_settings();
        assert_eq!(settings.panel_bucket_watts, 25);
        assert_eq!(settings.tariff, config.tariff);
    }

    #[test]
    fn test_validation() {
        let cases = [
            "[installation]\nrefresh_seconds = 0\n",
            "[installation]\npanel_bucket_watts = 0\n",
            "[installation]\ntimezone = \"Nowhere/Special\"\n",
            "[schedule]\ncompaction_delay_minutes = 1440\n",
        ];
        for case in cases {
            let content = format!("{case}{MINIMAL}");
            assert!(LedgerConfig::from_toml(&content).is_err(), "{case}");
        }

        let negative = MINIMAL.replace("\"0.25\"", "\"-0.25\"");
        assert!(LedgerConfig::from_toml(&negative).is_err());
    }

    #[test]
    fn test_missing_tariff_is_rejected() {
        assert!(LedgerConfig::from_toml("[database]\npath = \"x.db\"\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LedgerConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
