//! Parser for the compact `PT#W#D#H#M#S` durations returned by the video API.
//!
//! This is deliberately narrower than ISO-8601: the `PT` prefix is mandatory,
//! units must appear in the order weeks, days, hours, minutes, seconds, and
//! years/months are not understood.

use crate::error::{CardError, Result};

const PREFIX: &str = "PT";

/// Unit letters in the order they must appear.
const UNITS: [char; 5] = ['W', 'D', 'H', 'M', 'S'];

/// A parsed duration. Absent units are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompactDuration {
    pub weeks: f64,
    pub days: f64,
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
}

impl CompactDuration {
    #[must_use]
    pub fn total_seconds(&self) -> f64 {
        self.seconds
            + self.minutes * 60.0
            + self.hours * 3_600.0
            + (self.days + self.weeks * 7.0) * 86_400.0
    }
}

/// Parses `s` in a single greedy pass.
///
/// # Errors
/// Returns [`CardError::Format`] when the prefix is missing or a magnitude
/// is not a number.
pub fn parse_compact_duration(s: &str) -> Result<CompactDuration> {
    let mut rest = s
        .strip_prefix(PREFIX)
        .ok_or_else(|| CardError::format("duration", s))?;

    let mut values = [0.0_f64; UNITS.len()];
    for (slot, unit) in values.iter_mut().zip(UNITS) {
        if let Some((magnitude, tail)) = rest.split_once(unit) {
            *slot = magnitude
                .parse::<f64>()
                .map_err(|_| CardError::format("duration", s))?;
            rest = tail;
        }
    }

    if !rest.is_empty() {
        return Err(CardError::format("duration", s));
    }

    let [weeks, days, hours, minutes, seconds] = values;
    Ok(CompactDuration {
        weeks,
        days,
        hours,
        minutes,
        seconds,
    })
}

/// Formats a duration as `H:MM:SS`, prefixed with `N day(s), ` when needed.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(duration: &CompactDuration) -> String {
    let total = duration.total_seconds().max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        n => format!("{n} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}
