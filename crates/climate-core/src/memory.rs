//! A `Vec`-backed [`ReadingStore`] that assigns ids the way the real store
//! does (1, 2, 3, ...). Handy for tests and for embedding without Redis.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::reading::{NewReading, Reading};
use crate::store::{ReadingStore, ensure_live, sort_by_time};

#[derive(Debug, Clone, Default)]
pub struct MemoryReadingStore {
    readings: Vec<Reading>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `reading` under the next id and returns the stored row.
    pub fn insert(&mut self, reading: NewReading) -> Reading {
        let id = self.readings.len() as u64 + 1;
        let stored = reading.into_reading(id);
        self.readings.push(stored.clone());
        stored
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Reading> + '_ {
        self.readings
            .iter()
            .filter(move |r| r.timestamp >= start && r.timestamp <= end)
    }

    fn newest_first(&self) -> Vec<Reading> {
        let mut readings = self.readings.clone();
        sort_by_time(&mut readings);
        readings.reverse();
        readings
    }
}

impl FromIterator<NewReading> for MemoryReadingStore {
    fn from_iter<I: IntoIterator<Item = NewReading>>(iter: I) -> Self {
        let mut store = MemoryReadingStore::new();
        for reading in iter {
            store.insert(reading);
        }
        store
    }
}

impl ReadingStore for MemoryReadingStore {
    fn fetch_ordered_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>> {
        ensure_live(cancel)?;
        let mut readings: Vec<Reading> = self.in_range(start, end).cloned().collect();
        sort_by_time(&mut readings);
        Ok(readings)
    }

    fn fetch_by_id_range(
        &self,
        low: u64,
        high: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>> {
        ensure_live(cancel)?;
        Ok(self
            .readings
            .iter()
            .filter(|r| r.id >= low && r.id <= high)
            .cloned()
            .collect())
    }

    fn fetch_latest(&self, cancel: &CancellationToken) -> Result<Option<Reading>> {
        ensure_live(cancel)?;
        Ok(self.newest_first().into_iter().next())
    }

    fn count_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        ensure_live(cancel)?;
        Ok(self.in_range(start, end).count() as u64)
    }

    fn fetch_recent(
        &self,
        limit: usize,
        offset: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>> {
        ensure_live(cancel)?;
        Ok(self
            .newest_first()
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }
}
