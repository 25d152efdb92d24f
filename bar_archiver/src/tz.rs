//! Time zone parsing and local-to-UTC resolution for the daily trigger.
//!
//! Trigger times are configured as wall-clock times in an IANA zone. Two DST
//! edge cases need a deterministic answer:
//! - Nonexistent local times happen during "spring forward" when a wall time is skipped.
//! - Ambiguous local times happen during "fall back" when a wall time occurs twice.
//!
//! [`from_local_naive`] shifts a skipped time forward to the first valid
//! minute and takes the earliest instant of a repeated one.
//!
//! Examples (America/New_York):
//! - 2024-03-10 02:30 does not exist -> 03:00 EDT = 07:00Z.
//! - 2024-11-03 01:30 occurs twice -> 01:30 EDT = 05:30Z.

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest DST gap, in minutes, a nonexistent local time is shifted across.
const MAX_GAP_MINUTES: u32 = 120;

/// Parses an IANA time zone name such as `"UTC"` or `"America/New_York"`.
pub fn parse_tz(name: &str) -> anyhow::Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("bad tz: {name}"))
}

/// Convert a naive local timestamp to UTC in an IANA time zone.
///
/// Errors only when a nonexistent local time sits in a gap longer than two
/// hours.
pub fn from_local_naive(naive: NaiveDateTime, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
    use chrono::offset::LocalResult::*;
    match tz.from_local_datetime(&naive) {
        Single(dt) => Ok(dt.with_timezone(&Utc)),
        Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        None => {
            let mut t = naive;
            for _ in 0..MAX_GAP_MINUTES {
                t += chrono::Duration::minutes(1);
                if let Single(dt) = tz.from_local_datetime(&t) {
                    return Ok(dt.with_timezone(&Utc));
                }
            }
            Err(anyhow!("nonexistent local time {naive} in {tz}"))
        }
    }
}
