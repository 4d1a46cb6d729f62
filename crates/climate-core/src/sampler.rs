//! # Sampler
//!
//! Picks a fixed number of evenly time-spaced points out of an irregular,
//! time-ordered run of readings.
//!
//! The newest reading always occupies the final slot. The remaining slots
//! split the range into equal sub-intervals; each takes the reading closest
//! to its target time, as long as that reading lies within two sub-interval
//! widths. Slots with nothing close enough become gaps.

use std::num::NonZeroUsize;

use chrono::{DateTime, TimeDelta, Utc};

use crate::reading::{Reading, SampledPoint};

/// Slots may borrow a reading at most this many sub-interval widths away.
pub const TOLERANCE_SLOTS: i32 = 2;

/// Samples `readings` (ascending by timestamp) into exactly `count` points.
///
/// * No readings: `count` gaps stepping from `start` by `(end - start) / count`.
/// * `count == 1`: only the newest reading, whatever the range.
/// * Otherwise: `count - 1` distributed slots followed by the newest reading,
///   which may also appear in an earlier slot.
///
/// Ties in distance go to the reading encountered first. Readings sharing the
/// newest reading's timestamp are never used for distributed slots.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use climate_core::{sample, NewReading};
///
/// let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
/// let readings: Vec<_> = (0..10)
///     .map(|i| NewReading::new(20.0, 50.0, t0 + TimeDelta::minutes(i)).into_reading(i as u64 + 1))
///     .collect();
///
/// let points = sample(&readings, t0, t0 + TimeDelta::minutes(9), NonZeroUsize::new(5).unwrap());
/// assert_eq!(points.len(), 5);
/// assert_eq!(points[4].reading().map(|r| r.id), Some(10));
/// ```
pub fn sample(
    readings: &[Reading],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    count: NonZeroUsize,
) -> Vec<SampledPoint> {
    let count = count.get();

    let Some(most_recent) = readings.last() else {
        return gaps(start, end, count);
    };

    if count == 1 {
        return vec![SampledPoint::real(most_recent.clone())];
    }

    let slots = count - 1;
    let slot_width = (end - start) / factor(slots);
    let tolerance = slot_width * TOLERANCE_SLOTS;

    let mut points = Vec::with_capacity(count);
    for slot in 0..slots {
        let target = start + slot_width * factor(slot);
        let point = match closest_within(readings, most_recent.timestamp, target, tolerance) {
            Some(reading) => SampledPoint::real(reading.clone()),
            None => SampledPoint::gap(target),
        };
        points.push(point);
    }
    points.push(SampledPoint::real(most_recent.clone()));

    points
}

/// `count` gaps spread over `[start, end)`.
fn gaps(start: DateTime<Utc>, end: DateTime<Utc>, count: usize) -> Vec<SampledPoint> {
    let step = (end - start) / factor(count);
    (0..count)
        .map(|slot| SampledPoint::gap(start + step * factor(slot)))
        .collect()
}

fn closest_within(
    readings: &[Reading],
    reserved: DateTime<Utc>,
    target: DateTime<Utc>,
    tolerance: TimeDelta,
) -> Option<&Reading> {
    let mut best: Option<(&Reading, TimeDelta)> = None;

    for reading in readings {
        if reading.timestamp == reserved {
            continue;
        }
        let distance = (target - reading.timestamp).abs();
        if distance > tolerance {
            continue;
        }
        if best.is_none_or(|(_, closest)| distance < closest) {
            best = Some((reading, distance));
        }
    }

    best.map(|(reading, _)| reading)
}

// chrono scales durations by i32; slot counts are far below that.
fn factor(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
