//! Go-style duration strings (`300ms`, `5m`, `5m0s`, `1h30m`, `1.5h`)
//!
//! The prediction service emits durations in this format, so parsing follows
//! its grammar: a sequence of decimal numbers each followed by a unit.

use std::time::Duration;
use thiserror::Error;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("duration is empty")]
    Empty,

    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("negative duration {0:?}")]
    Negative(String),

    #[error("duration {0:?} is out of range")]
    OutOfRange(String),
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a duration string such as `5m` or `1h30m0.5s`
///
/// `0` without a unit is accepted; negative durations are rejected because a
/// boost window cannot end before the pod was created.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let rest = match s.as_bytes()[0] {
        b'-' => {
            let unsigned = &s[1..];
            return match parse_duration(unsigned) {
                Ok(d) if d.is_zero() => Ok(d),
                Ok(_) => Err(DurationParseError::Negative(input.to_string())),
                Err(e) => Err(e),
            };
        }
        b'+' => &s[1..],
        _ => s,
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(DurationParseError::Invalid(input.to_string()));
    }

    let mut total: u128 = 0;
    let mut remaining = rest;

    while !remaining.is_empty() {
        let number_end = remaining
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(remaining.len());
        let (number, tail) = remaining.split_at(number_end);

        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(DurationParseError::Invalid(input.to_string()));
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err(DurationParseError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let out_of_range = || DurationParseError::OutOfRange(input.to_string());

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| out_of_range())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(out_of_range)?;

        if !frac_part.is_empty() {
            // Digits beyond nanosecond resolution are dropped.
            let digits = &frac_part[..frac_part.len().min(18)];
            let frac: u128 = digits.parse().map_err(|_| out_of_range())?;
            let den = 10u128.checked_pow(digits.len() as u32).ok_or_else(out_of_range)?;
            let frac_nanos = frac.checked_mul(scale).ok_or_else(out_of_range)? / den;
            nanos = nanos.checked_add(frac_nanos).ok_or_else(out_of_range)?;
        }

        total = total.checked_add(nanos).ok_or_else(out_of_range)?;
        remaining = next;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| DurationParseError::OutOfRange(input.to_string()))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Format a duration the way Go prints it (`5m0s`, `1h30m0s`, `1.5s`, `300ms`)
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }

    let total = duration.as_nanos();
    if total < NANOS_PER_SEC {
        return if total < NANOS_PER_MICRO {
            format!("{total}ns")
        } else if total < NANOS_PER_MILLI {
            format!("{}µs", fraction(total, NANOS_PER_MICRO))
        } else {
            format!("{}ms", fraction(total, NANOS_PER_MILLI))
        };
    }

    let hours = total / (3600 * NANOS_PER_SEC);
    let minutes = (total / (60 * NANOS_PER_SEC)) % 60;
    let seconds = fraction(total % (60 * NANOS_PER_SEC), NANOS_PER_SEC);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

fn fraction(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let width = (unit as f64).log10().round() as usize;
    let digits = format!("{rem:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
