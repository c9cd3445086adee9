//! Publication timestamp conversion.
//!
//! The story API sends `published_at` as a local date-time followed by its numeric UTC
//! offset, e.g. `2020-05-01T12:30:00-05:00`. Content items are created with the absolute
//! instant this denotes, never with the time of the sync run.

use crate::error::ValidationError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Length of the `YYYY-MM-DDTHH:MM:SS` prefix
const DATE_TIME_LEN: usize = 19;
/// Length of the `±HH:MM` suffix
const OFFSET_LEN: usize = 6;

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Convert a story's `published_at` into the instant it denotes.
///
/// The value must be a 19-character date-time, optionally followed by fractional
/// seconds (which are dropped), and end in a 6-character `±HH:MM` offset. Anything
/// else (a `Z` suffix, a missing offset, a bare date) is rejected rather than guessed.
///
/// # Errors
/// Returns a [`ValidationError`] describing which part of the value is unusable.
pub fn derive_created_at(published_at: &str) -> Result<DateTime<Utc>, ValidationError> {
    let layout_error = || ValidationError::TimestampLayout {
        value: published_at.to_string(),
    };

    if !published_at.is_ascii() || published_at.len() < DATE_TIME_LEN + OFFSET_LEN {
        return Err(layout_error());
    }

    let (date_time, rest) = published_at.split_at(DATE_TIME_LEN);
    let (fraction, offset) = rest.split_at(rest.len() - OFFSET_LEN);

    if !is_fraction(fraction) {
        return Err(layout_error());
    }

    let local = NaiveDateTime::parse_from_str(date_time, DATE_TIME_FORMAT).map_err(|e| {
        ValidationError::TimestampDateTime {
            value: date_time.to_string(),
            reason: e.to_string(),
        }
    })?;

    let offset = parse_offset(offset).ok_or_else(|| ValidationError::TimestampOffset {
        value: offset.to_string(),
    })?;

    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(layout_error)
}

/// Empty, or `.` followed by at least one digit
fn is_fraction(s: &str) -> bool {
    match s.strip_prefix('.') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => s.is_empty(),
    }
}

/// Parse `±HH:MM` into a fixed offset
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let bytes = s.as_bytes();
    if bytes.len() != OFFSET_LEN || bytes[3] != b':' {
        return None;
    }

    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours = two_digits(&bytes[1..3])?;
    let minutes = two_digits(&bytes[4..6])?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn two_digits(pair: &[u8]) -> Option<i32> {
    match pair {
        [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => {
            Some(i32::from(a - b'0') * 10 + i32::from(b - b'0'))
        }
        _ => None,
    }
}
