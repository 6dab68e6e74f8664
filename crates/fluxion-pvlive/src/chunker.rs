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

//! Splitting of long intervals into requests the API will accept.
//!
//! The API caps the span of a single request: one year for national
//! aggregates, thirty days for regional entities.

use crate::errors::{PvLiveError, PvLiveResult};
use crate::types::{EntityRef, Period, TimeRange};
use chrono::{DateTime, TimeDelta, Utc};

/// Maximum span of one request, by entity scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanLimits {
    pub national: TimeDelta,
    pub regional: TimeDelta,
}

impl Default for SpanLimits {
    fn default() -> Self {
        Self {
            national: TimeDelta::days(365),
            regional: TimeDelta::days(30),
        }
    }
}

impl SpanLimits {
    pub fn max_span(&self, entity: &EntityRef) -> TimeDelta {
        if entity.is_national() {
            self.national
        } else {
            self.regional
        }
    }
}

/// Split `[start, end]` into contiguous, non-overlapping chunks.
///
/// Each chunk spans at most the entity's limit; the next chunk starts one
/// period after the previous chunk's end so boundary records are fetched once.
pub fn chunk_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    entity: &EntityRef,
    period: Period,
    limits: &SpanLimits,
) -> PvLiveResult<Vec<TimeRange>> {
    let range = TimeRange::new(start, end)?;
    let max_span = limits.max_span(entity);

    let mut chunks = Vec::new();
    let mut cursor = range.start();
    loop {
        // past the representable range means the chunk reaches the end
        let chunk_end = cursor
            .checked_add_signed(max_span)
            .map_or(range.end(), |end| end.min(range.end()));
        chunks.push(TimeRange::new(cursor, chunk_end)?);
        if chunk_end >= range.end() {
            break;
        }
        cursor = chunk_end
            .checked_add_signed(period.duration())
            .ok_or_else(|| {
                PvLiveError::InvalidInput(format!(
                    "interval ending {} is too close to the latest representable time",
                    range.end()
                ))
            })?;
        if cursor > range.end() {
            break;
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_single_instant_yields_one_chunk() {
        let at = utc(2023, 12, 1, 13, 0);
        let chunks =
            chunk_range(at, at, &EntityRef::gsp(26), Period::ThirtyMinutes, &SpanLimits::default())
                .unwrap();
        assert_eq!(chunks, vec![TimeRange::instant(at)]);
    }

    #[test]
    fn test_national_day_fits_one_chunk() {
        let start = utc(2023, 12, 1, 0, 30);
        let end = utc(2023, 12, 2, 0, 0);
        let chunks = chunk_range(
            start,
            end,
            &EntityRef::pes(0),
            Period::ThirtyMinutes,
            &SpanLimits::default(),
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start(), start);
        assert_eq!(chunks[0].end(), end);
    }

    #[test]
    fn test_regional_400_days() {
        let period = Period::ThirtyMinutes;
        let start = utc(2022, 1, 1, 0, 30);
        let end = start + TimeDelta::days(400);
        let chunks =
            chunk_range(start, end, &EntityRef::gsp(54), period, &SpanLimits::default()).unwrap();

        assert_eq!(chunks.len(), 14); // ceil(400 / 30)
        assert_eq!(chunks[0].start(), start);
        assert_eq!(chunks.last().unwrap().end(), end);
        for pair in chunks.windows(2) {
            assert_eq!(
                pair[1].start() - pair[0].start(),
                TimeDelta::days(30) + period.duration()
            );
            assert_eq!(pair[1].start() - pair[0].end(), period.duration());
        }
        for chunk in &chunks {
            assert!(chunk.span() <= TimeDelta::days(30));
        }
    }

    #[test]
    fn test_chunks_cover_range_without_overlap() {
        let limits = SpanLimits {
            national: TimeDelta::days(2),
            regional: TimeDelta::hours(7),
        };
        for period in [Period::FiveMinutes, Period::ThirtyMinutes] {
            for entity in [EntityRef::pes(0), EntityRef::pes(12)] {
                let start = utc(2023, 3, 25, 1, 0);
                let end = utc(2023, 3, 31, 22, 30);
                let chunks = chunk_range(start, end, &entity, period, &limits).unwrap();

                let slots: i64 = chunks
                    .iter()
                    .map(|c| c.span().num_minutes() / i64::from(period.minutes()) + 1)
                    .sum();
                let expected = (end - start).num_minutes() / i64::from(period.minutes()) + 1;
                assert_eq!(slots, expected);
                assert_eq!(chunks.last().unwrap().end(), end);
                for pair in chunks.windows(2) {
                    assert!(pair[0].end() < pair[1].start());
                }
            }
        }
    }

    #[test]
    fn test_inverted_range_fails_fast() {
        let start = utc(2023, 12, 2, 0, 0);
        let end = utc(2023, 12, 1, 0, 0);
        let err = chunk_range(
            start,
            end,
            &EntityRef::national(),
            Period::ThirtyMinutes,
            &SpanLimits::default(),
        )
        .unwrap_err();
        assert!(err.is_input());
    }

    #[test]
    fn test_huge_span_does_not_overflow() {
        let limits = SpanLimits {
            national: TimeDelta::days(100_000_000),
            regional: TimeDelta::days(30),
        };
        let at = utc(2023, 12, 1, 13, 0);
        let chunks =
            chunk_range(at, at, &EntityRef::national(), Period::ThirtyMinutes, &limits).unwrap();
        assert_eq!(chunks, vec![TimeRange::instant(at)]);

        let end = utc(2024, 6, 1, 0, 0);
        let chunks =
            chunk_range(at, end, &EntityRef::national(), Period::ThirtyMinutes, &limits).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end(), end);
    }

    #[test]
    fn test_range_ending_at_latest_time() {
        let end = DateTime::<Utc>::MAX_UTC;
        let start = end - TimeDelta::days(2);
        let chunks = chunk_range(
            start,
            end,
            &EntityRef::national(),
            Period::ThirtyMinutes,
            &SpanLimits::default(),
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end(), end);
    }
}
