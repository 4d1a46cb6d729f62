//! The storage seam the engine reads through.
//!
//! Every method receives the caller's cancellation token; implementations
//! call [`ensure_live`] before issuing I/O so an abandoned request stops
//! hitting the store.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SeriesError};
use crate::reading::Reading;

pub trait ReadingStore: Send + Sync {
    /// Readings with `start <= timestamp <= end`, ascending by timestamp,
    /// ties broken by id.
    fn fetch_ordered_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>>;

    /// Readings with `low <= id <= high`, in no particular order. Empty when
    /// `low > high`.
    fn fetch_by_id_range(
        &self,
        low: u64,
        high: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>>;

    /// The reading with the greatest timestamp.
    fn fetch_latest(&self, cancel: &CancellationToken) -> Result<Option<Reading>>;

    fn count_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<u64>;

    /// Newest-first page of readings.
    fn fetch_recent(
        &self,
        limit: usize,
        offset: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>>;

    /// Readings for the given ids, missing ids skipped. One range query per
    /// id unless the store overrides it.
    fn fetch_by_ids(&self, ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Reading>> {
        let mut readings = Vec::with_capacity(ids.len());
        for &id in ids {
            readings.extend(self.fetch_by_id_range(id, id, cancel)?);
        }
        Ok(readings)
    }
}

/// Fails with [`SeriesError::Cancelled`] once `cancel` has fired.
pub fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SeriesError::Cancelled);
    }
    Ok(())
}

/// Orders readings by timestamp, then id.
pub fn sort_by_time(readings: &mut [Reading]) {
    readings.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
}
