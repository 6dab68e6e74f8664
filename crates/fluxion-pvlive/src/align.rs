// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Alignment of instants onto the reporting grid.
//!
//! The API labels each estimate with the END of its interval, so an instant
//! inside an interval is moved forward to that interval's closing boundary.

use crate::errors::{PvLiveError, PvLiveResult};
use crate::types::{Period, TimeRange};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};

/// Round `instant` up to the next `period` boundary, unless it is already on one.
pub fn align_to_period(instant: DateTime<Utc>, period: Period) -> DateTime<Utc> {
    let minutes = period.minutes();
    let overshoot_minutes = instant.minute() % minutes;
    if overshoot_minutes == 0 && instant.second() == 0 && instant.nanosecond() == 0 {
        return instant;
    }

    let floor = instant
        - TimeDelta::minutes(i64::from(overshoot_minutes))
        - TimeDelta::seconds(i64::from(instant.second()))
        - TimeDelta::nanoseconds(i64::from(instant.nanosecond()));
    floor + period.duration()
}

pub fn is_aligned(instant: DateTime<Utc>, period: Period) -> bool {
    align_to_period(instant, period) == instant
}

/// Reporting intervals that make up one UTC day: the first boundary after
/// midnight through the following midnight, inclusive.
pub fn reporting_day(date: NaiveDate, period: Period) -> TimeRange {
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    let start = midnight + period.duration();
    let end = midnight + TimeDelta::days(1);
    // start < end for every supported period
    TimeRange::new(start, end).unwrap_or_else(|_| TimeRange::instant(end))
}

/// Parse a caller-supplied instant. Offsets are mandatory: a bare
/// `2023-12-01T12:00:00` is rejected rather than guessed at.
pub fn parse_instant(input: &str) -> PvLiveResult<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).is_ok());
    if naive {
        return Err(PvLiveError::InvalidInput(format!(
            "'{trimmed}' has no UTC offset; start and end must be timezone-aware"
        )));
    }

    Err(PvLiveError::InvalidInput(format!(
        "failed to parse '{trimmed}' as an ISO-8601 datetime"
    )))
}
