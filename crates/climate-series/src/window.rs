//! # Window Aggregation
//!
//! Local statistics around a reading. The neighbourhood is an id range
//! `anchor.id ± radius` (ids are a cheap proxy for time locality); the lower
//! bound never drops below 1.
//!
//! Fault readings are left out of the statistics. Humidity values are
//! filtered by the temperature fault test too, since a faulty probe reports
//! both channels.

use climate_core::{Reading, ReadingStore, Result, Stats, reduce};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub temperature: Stats,
    pub humidity: Stats,
}

/// The averages-only shape used for default display.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct WindowAverages {
    pub temperature: f64,
    pub humidity: f64,
}

impl From<WindowStats> for WindowAverages {
    fn from(stats: WindowStats) -> Self {
        Self {
            temperature: stats.temperature.average,
            humidity: stats.humidity.average,
        }
    }
}

/// Inclusive id bounds of the window around `anchor_id`.
pub fn window_bounds(anchor_id: u64, radius: u32) -> (u64, u64) {
    let radius = u64::from(radius);
    let low = anchor_id.saturating_sub(radius).max(1);
    let high = anchor_id.saturating_add(radius);
    (low, high)
}

/// `None` when nothing was fetched. A window made only of fault readings is
/// still `Some`, with zero counts.
pub fn summarize(readings: &[Reading]) -> Option<WindowStats> {
    if readings.is_empty() {
        return None;
    }
    let kept = readings.iter().filter(|r| !r.is_outlier());
    Some(WindowStats {
        temperature: reduce(kept.clone().map(|r| r.temperature)),
        humidity: reduce(kept.map(|r| r.humidity)),
    })
}

pub struct WindowAggregator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ReadingStore + ?Sized> WindowAggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn aggregate(
        &self,
        anchor: &Reading,
        radius: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<WindowStats>> {
        let (low, high) = window_bounds(anchor.id, radius);
        let readings = self.store.fetch_by_id_range(low, high, cancel)?;
        debug!(anchor = anchor.id, low, high, fetched = readings.len(), "window fetched");
        Ok(summarize(&readings))
    }

    pub fn averages(
        &self,
        anchor: &Reading,
        radius: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<WindowAverages>> {
        Ok(self.aggregate(anchor, radius, cancel)?.map(WindowAverages::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use climate_core::{MemoryReadingStore, NewReading};
    use std::sync::Mutex;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 10, 9, 0, 0).unwrap()
    }

    fn store_of(temperatures: &[f64]) -> MemoryReadingStore {
        temperatures
            .iter()
            .enumerate()
            .map(|(i, t)| NewReading::new(*t, 40.0 + i as f64, t0() + TimeDelta::minutes(i as i64)))
            .collect()
    }

    fn anchor(store: &MemoryReadingStore, id: u64) -> Reading {
        let cancel = CancellationToken::new();
        store.fetch_by_id_range(id, id, &cancel).unwrap().remove(0)
    }

    /// Records the id ranges it is asked for.
    struct RecordingStore {
        inner: MemoryReadingStore,
        ranges: Mutex<Vec<(u64, u64)>>,
    }

    impl ReadingStore for RecordingStore {
        fn fetch_ordered_in_range(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            cancel: &CancellationToken,
        ) -> Result<Vec<Reading>> {
            self.inner.fetch_ordered_in_range(start, end, cancel)
        }

        fn fetch_by_id_range(
            &self,
            low: u64,
            high: u64,
            cancel: &CancellationToken,
        ) -> Result<Vec<Reading>> {
            self.ranges.lock().unwrap().push((low, high));
            self.inner.fetch_by_id_range(low, high, cancel)
        }

        fn fetch_latest(&self, cancel: &CancellationToken) -> Result<Option<Reading>> {
            self.inner.fetch_latest(cancel)
        }

        fn count_in_range(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            cancel: &CancellationToken,
        ) -> Result<u64> {
            self.inner.count_in_range(start, end, cancel)
        }

        fn fetch_recent(
            &self,
            limit: usize,
            offset: usize,
            cancel: &CancellationToken,
        ) -> Result<Vec<Reading>> {
            self.inner.fetch_recent(limit, offset, cancel)
        }
    }

    #[test]
    fn lower_bound_is_clamped_to_one() {
        assert_eq!(window_bounds(2, 5), (1, 7));
        assert_eq!(window_bounds(1, 3), (1, 4));
        assert_eq!(window_bounds(10, 3), (7, 13));
        assert_eq!(window_bounds(u64::MAX, 3), (u64::MAX - 3, u64::MAX));
    }

    #[test]
    fn clamped_range_is_what_the_store_sees() {
        let inner = store_of(&[20.0; 8]);
        let anchor = anchor(&inner, 2);
        let store = RecordingStore {
            inner,
            ranges: Mutex::new(Vec::new()),
        };

        let stats = WindowAggregator::new(&store)
            .aggregate(&anchor, 5, &CancellationToken::new())
            .unwrap()
            .unwrap();

        assert_eq!(*store.ranges.lock().unwrap(), vec![(1, 7)]);
        assert_eq!(stats.temperature.count, 7);
    }

    #[test]
    fn outliers_are_excluded_from_both_channels() {
        let store = store_of(&[20.0, 2.0, 22.0, 3.0, 24.0]);
        let anchor = anchor(&store, 3);

        let stats = WindowAggregator::new(&store)
            .aggregate(&anchor, 2, &CancellationToken::new())
            .unwrap()
            .unwrap();

        assert_eq!(stats.temperature.count, 3);
        assert_relative_eq!(stats.temperature.average, 22.0);
        assert_eq!(stats.temperature.minimum, 20.0);
        assert_eq!(stats.temperature.maximum, 24.0);
        // Humidities 40, 42, 44 survive; 41 and 43 sit on fault readings.
        assert_eq!(stats.humidity.count, 3);
        assert_relative_eq!(stats.humidity.average, 42.0);
    }

    #[test]
    fn window_of_only_outliers_is_present_with_zero_counts() {
        let store = store_of(&[1.0, -4.0, 3.0]);
        let anchor = anchor(&store, 2);

        let stats = WindowAggregator::new(&store)
            .aggregate(&anchor, 1, &CancellationToken::new())
            .unwrap();

        let stats = stats.expect("fetch was not empty");
        assert_eq!(stats.temperature, Stats::default());
        assert_eq!(stats.humidity.count, 0);
    }

    #[test]
    fn empty_fetch_is_absent() {
        let store = MemoryReadingStore::new();
        let orphan = NewReading::new(20.0, 50.0, t0()).into_reading(100);

        let windows = WindowAggregator::new(&store);
        let cancel = CancellationToken::new();
        assert_eq!(windows.aggregate(&orphan, 3, &cancel).unwrap(), None);
        assert_eq!(windows.averages(&orphan, 3, &cancel).unwrap(), None);
    }

    #[test]
    fn averages_shape_drops_extrema() {
        let store = store_of(&[18.0, 20.0, 22.0]);
        let anchor = anchor(&store, 2);

        let averages = WindowAggregator::new(&store)
            .averages(&anchor, 3, &CancellationToken::new())
            .unwrap()
            .unwrap();

        assert_relative_eq!(averages.temperature, 20.0);
        assert_relative_eq!(averages.humidity, 41.0);
    }
}
