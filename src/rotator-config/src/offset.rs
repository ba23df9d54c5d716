//! Age offset parsing.
//!
//! Accepted forms:
//! - `d`: whole days
//! - `hh:mm`
//! - `hh:mm:ss` with an optional `.fffffff` fraction (up to 7 digits)
//! - any of the clock forms prefixed with `d.`

use std::time::Duration;

use crate::{ConfigError, Result};

const MAX_FRACTION_DIGITS: usize = 7;

/// Parse an age offset such as `"1.12:00:00"` or `"00:30:00"`.
pub fn parse_offset(value: &str) -> Result<Duration> {
    let invalid = |reason: &str| ConfigError::InvalidOffset {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let s = value.trim();
    if s.is_empty() {
        return Err(invalid("empty value"));
    }

    let Some(first_colon) = s.find(':') else {
        let days = number(s).ok_or_else(|| invalid("days must be a whole number"))?;
        return days_to_duration(days).ok_or_else(|| invalid("too large"));
    };

    let (days, clock) = match s[..first_colon].find('.') {
        Some(dot) => {
            let days = number(&s[..dot]).ok_or_else(|| invalid("days must be a whole number"))?;
            (days, &s[dot + 1..])
        }
        None => (0, s),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m] => (*h, *m, None),
        [h, m, s] => (*h, *m, Some(*s)),
        _ => return Err(invalid("expected two or three ':'-separated fields")),
    };

    let hours = number(hours)
        .filter(|h| *h < 24)
        .ok_or_else(|| invalid("hours must be 0-23"))?;
    let minutes = number(minutes)
        .filter(|m| *m < 60)
        .ok_or_else(|| invalid("minutes must be 0-59"))?;

    let (seconds, nanos) = match seconds {
        None => (0, 0),
        Some(field) => {
            let (whole, fraction) = match field.split_once('.') {
                Some((whole, fraction)) => (whole, Some(fraction)),
                None => (field, None),
            };
            let seconds = number(whole)
                .filter(|s| *s < 60)
                .ok_or_else(|| invalid("seconds must be 0-59"))?;
            let nanos = match fraction {
                None => 0,
                Some(digits) => fraction_nanos(digits)
                    .ok_or_else(|| invalid("fraction must be 1-7 digits"))?,
            };
            (seconds, nanos)
        }
    };

    let clock = Duration::new(hours * 3_600 + minutes * 60 + seconds, nanos);
    days_to_duration(days)
        .and_then(|whole| whole.checked_add(clock))
        .ok_or_else(|| invalid("too large"))
}

fn number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn days_to_duration(days: u64) -> Option<Duration> {
    days.checked_mul(86_400).map(Duration::from_secs)
}

fn fraction_nanos(digits: &str) -> Option<u32> {
    if digits.is_empty()
        || digits.len() > MAX_FRACTION_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    // Right-pad to nanosecond precision: "5" -> 500_000_000.
    format!("{digits:0<9}").parse().ok()
}
