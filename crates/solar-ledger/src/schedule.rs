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

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Longest run of wall clock time a timezone transition can skip.
const MAX_TRANSITION_MINUTES: u32 = 24 * 60;

/// Local time of the next daily compaction: `delay_minutes` after midnight,
/// today if that moment is still ahead, tomorrow otherwise.
pub fn next_compaction(now: NaiveDateTime, delay_minutes: u32) -> NaiveDateTime {
    let today = now.date().and_time(NaiveTime::MIN) + Duration::minutes(i64::from(delay_minutes));
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Real time left until the next compaction in `timezone`.
///
/// The target is resolved on the timeline, so a DST transition between now
/// and the target does not shift the trigger by the transition length.
pub fn until_next_compaction<Z: TimeZone>(
    timezone: &Z,
    now: DateTime<Utc>,
    delay_minutes: u32,
) -> std::time::Duration {
    let local_now = now.with_timezone(timezone).naive_local();
    let target = local_instant(timezone, next_compaction(local_now, delay_minutes));
    (target - now).to_std().unwrap_or_default()
}

/// Instant a local wall clock time refers to. A repeated time resolves to its
/// first occurrence, a skipped one to the first valid minute after the gap.
fn local_instant<Z: TimeZone>(timezone: &Z, local: NaiveDateTime) -> DateTime<Utc> {
    (0..=MAX_TRANSITION_MINUTES)
        .map(|skipped| local + Duration::minutes(i64::from(skipped)))
        .find_map(|candidate| timezone.from_local_datetime(&candidate).earliest())
        .map_or_else(|| local.and_utc(), |instant| instant.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Europe::Prague;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn utc(month: u32, day: u32, h: u32, m: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_next_compaction_before_delay() {
        assert_eq!(next_compaction(at(2, 0, 3), 5), at(2, 0, 5));
    }

    #[test]
    fn test_next_compaction_rolls_to_tomorrow() {
        assert_eq!(next_compaction(at(2, 0, 5), 5), at(3, 0, 5));
        assert_eq!(next_compaction(at(2, 17, 30), 5), at(3, 0, 5));
        assert_eq!(next_compaction(at(31, 23, 59), 0), at(1, 0, 0) + Duration::days(31));
    }

    #[test]
    fn test_until_next_compaction() {
        // 23:00 CEST on May 2nd
        assert_eq!(
            until_next_compaction(&Prague, utc(5, 2, 21, 0), 15),
            std::time::Duration::from_secs(75 * 60)
        );
    }

    #[test]
    fn test_until_next_compaction_across_spring_forward() {
        // Local midnight on March 31st, clocks jump from 02:00 to 03:00
        let now = utc(3, 30, 23, 0);
        assert_eq!(
            until_next_compaction(&Prague, now, 180),
            std::time::Duration::from_secs(2 * 3600)
        );
        // 02:30 does not exist that night, the first valid minute is 03:00
        assert_eq!(
            until_next_compaction(&Prague, now, 150),
            std::time::Duration::from_secs(2 * 3600)
        );
    }

    #[test]
    fn test_until_next_compaction_across_fall_back() {
        // Local midnight on October 27th, clocks return from 03:00 to 02:00
        let now = utc(10, 26, 22, 0);
        assert_eq!(
            until_next_compaction(&Prague, now, 240),
            std::time::Duration::from_secs(5 * 3600)
        );
        // 02:30 happens twice, the first occurrence wins
        assert_eq!(
            until_next_compaction(&Prague, now, 150),
            std::time::Duration::from_secs(150 * 60)
        );
    }
}
