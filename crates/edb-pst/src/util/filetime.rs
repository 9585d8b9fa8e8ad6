//! FILETIME <-> engine timestamp conversion.
//!
//! FILETIME is a 64-bit count of 100ns ticks since 1601-01-01 00:00:00 UTC.
//! The engine's canonical timestamp is `chrono::DateTime<Utc>`, which the
//! rest of the crate (entity assembly, PC encoding, export formatting) uses
//! directly.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

const TICKS_PER_SECOND: i64 = 10_000_000;
const TICKS_PER_MICROSECOND: i64 = 10;

/// Ticks between the FILETIME epoch (1601-01-01) and the Unix epoch
/// (1970-01-01), i.e. `(1970 - 1601)` years' worth of 100ns ticks.
const EPOCH_DIFFERENCE_TICKS: i64 = 116_444_736_000_000_000;

pub fn filetime_epoch() -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &NaiveDate::from_ymd_opt(1601, 1, 1)
            .expect("1601-01-01 is a valid date")
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time"),
    )
}

/// Converts a FILETIME tick count to a UTC timestamp, truncated to
/// microsecond resolution.
pub fn from_filetime(ticks: u64) -> DateTime<Utc> {
    let unix_ticks = ticks as i64 - EPOCH_DIFFERENCE_TICKS;
    let micros = unix_ticks / TICKS_PER_MICROSECOND;
    DateTime::from_timestamp_micros(micros).unwrap_or_else(filetime_epoch)
}

/// Converts a UTC timestamp to a FILETIME tick count.
pub fn to_filetime(timestamp: DateTime<Utc>) -> u64 {
    let micros = timestamp.timestamp_micros();
    let unix_ticks = micros.saturating_mul(TICKS_PER_MICROSECOND);
    (unix_ticks + EPOCH_DIFFERENCE_TICKS).max(0) as u64
}
