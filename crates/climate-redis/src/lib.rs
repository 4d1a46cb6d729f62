//! # Climate Redis
//!
//! Redis-backed reading storage. Each reading is stored as JSON under
//! `reading:{id}`; the sorted set `readings:timeline` scores ids by their
//! timestamp in microseconds, and `readings:next_id` hands out ids starting
//! at 1.
use std::ops::{Range, RangeInclusive};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use climate_core::{ensure_live, sort_by_time, NewReading, Reading, ReadingStore, SeriesError};
use redis::{Client, Commands, Connection};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// --- Configuration ---

pub const URL_ENV: &str = "CLIMATE_REDIS_URL";
pub const TIMEOUT_ENV: &str = "CLIMATE_REDIS_TIMEOUT_MS";

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct RedisStoreConfig {
    pub url: String,
    /// Connect, read and write timeout. Zero disables it.
    pub io_timeout_ms: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1/".to_string(),
            io_timeout_ms: 5_000,
        }
    }
}

impl RedisStoreConfig {
    /// Defaults overridden by `CLIMATE_REDIS_URL` and `CLIMATE_REDIS_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(URL_ENV) {
            config.url = url;
        }
        if let Ok(ms) = std::env::var(TIMEOUT_ENV) {
            config.io_timeout_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be milliseconds, got {:?}", TIMEOUT_ENV, ms))?;
        }
        Ok(config)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_ms > 0).then(|| Duration::from_millis(self.io_timeout_ms))
    }
}

// --- Key Builders ---

pub const TIMELINE_KEY: &str = "readings:timeline";
pub const NEXT_ID_KEY: &str = "readings:next_id";

/// Keys sent per MGET round trip.
pub const MGET_CHUNK: u64 = 512;

pub fn reading_key(id: u64) -> String {
    format!("reading:{}", id)
}

pub fn timeline_score(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_micros()
}

// --- Generic I/O Helpers ---

fn read_struct<T: for<'de> Deserialize<'de>>(
    con: &mut Connection,
    key: &str,
) -> Result<Option<T>> {
    let json_string: Option<String> = con.get(key)?;
    json_string
        .map(|json| serde_json::from_str(&json).with_context(|| format!("decoding {}", key)))
        .transpose()
}

/// Multi-get in key order; keys that do not exist are skipped.
fn read_structs<T: for<'de> Deserialize<'de>>(
    con: &mut Connection,
    keys: &[String],
) -> Result<Vec<T>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query(con)?;
    keys.iter()
        .zip(values)
        .filter_map(|(key, value)| value.map(|json| (key, json)))
        .map(|(key, json)| {
            serde_json::from_str(&json).with_context(|| format!("decoding {}", key))
        })
        .collect()
}

/// Splits `[low, high]` into consecutive runs of at most [`MGET_CHUNK`] ids.
fn id_chunks(low: u64, high: u64) -> impl Iterator<Item = RangeInclusive<u64>> {
    let mut next = Some(low).filter(|low| *low <= high);
    std::iter::from_fn(move || {
        let first = next?;
        let last = first.saturating_add(MGET_CHUNK - 1).min(high);
        next = last.checked_add(1).filter(|id| *id <= high);
        Some(first..=last)
    })
}

/// Timeline ranks for a newest-first page, or `None` when `offset` lies
/// past anything Redis can index.
fn rank_bounds(limit: usize, offset: usize) -> Option<(isize, isize)> {
    let last = offset.checked_add(limit.checked_sub(1)?)?;
    let first = isize::try_from(offset).ok()?;
    Some((first, isize::try_from(last).unwrap_or(isize::MAX)))
}

/// Newest first; equal scores by descending numeric id.
fn newest_first(members: &mut [(u64, f64)]) {
    members.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.0.cmp(&a.0)));
}

/// Slice of a score block holding global ranks `first..=last`, where the
/// block's first member sits at global rank `above`.
fn page_in_block(block_len: usize, above: usize, first: usize, last: usize) -> Range<usize> {
    let from = first.saturating_sub(above).min(block_len);
    let to = last.saturating_sub(above).saturating_add(1).min(block_len);
    from..to.max(from)
}

// --- Read/Write Functions ---

/// Assigns the next id and stores the reading together with its timeline
/// entry in one transaction.
pub fn write_reading(con: &mut Connection, reading: &NewReading) -> Result<Reading> {
    let id: u64 = con.incr(NEXT_ID_KEY, 1)?;
    let stored = reading.clone().into_reading(id);
    let json_string = serde_json::to_string(&stored)?;

    redis::pipe()
        .atomic()
        .set(reading_key(id), json_string)
        .ignore()
        .zadd(TIMELINE_KEY, id, timeline_score(stored.timestamp))
        .ignore()
        .query::<()>(con)
        .with_context(|| format!("storing reading {}", id))?;

    info!(
        id,
        temperature = stored.temperature,
        humidity = stored.humidity,
        "reading stored"
    );
    Ok(stored)
}

pub fn read_reading(con: &mut Connection, id: u64) -> Result<Option<Reading>> {
    read_struct(con, &reading_key(id))
}

pub fn read_readings(con: &mut Connection, ids: &[u64]) -> Result<Vec<Reading>> {
    let keys: Vec<String> = ids.iter().map(|id| reading_key(*id)).collect();
    read_structs(con, &keys)
}

pub fn read_range(
    con: &mut Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Reading>> {
    let ids: Vec<u64> =
        con.zrangebyscore(TIMELINE_KEY, timeline_score(start), timeline_score(end))?;
    let mut readings = read_readings(con, &ids)?;
    // Scores are microseconds; drop anything the coarser bound let through.
    readings.retain(|r| r.timestamp >= start && r.timestamp <= end);
    sort_by_time(&mut readings);
    Ok(readings)
}

/// The highest id handed out so far; 0 on an empty store.
pub fn last_id(con: &mut Connection) -> Result<u64> {
    let id: Option<u64> = con.get(NEXT_ID_KEY)?;
    Ok(id.unwrap_or(0))
}

/// Readings with ids in `[low, high]`. `high` is clamped to the last
/// assigned id and the keys are fetched in chunks.
pub fn read_id_range(con: &mut Connection, low: u64, high: u64) -> Result<Vec<Reading>> {
    if low > high {
        return Ok(Vec::new());
    }
    let high = high.min(last_id(con)?);
    let mut readings = Vec::new();
    for chunk in id_chunks(low, high) {
        let ids: Vec<u64> = chunk.collect();
        readings.extend(read_readings(con, &ids)?);
    }
    Ok(readings)
}

pub fn read_latest(con: &mut Connection) -> Result<Option<Reading>> {
    Ok(read_recent(con, 1, 0)?.into_iter().next())
}

pub fn count_range(con: &mut Connection, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64> {
    let count: u64 = con.zcount(TIMELINE_KEY, timeline_score(start), timeline_score(end))?;
    Ok(count)
}

/// Ids of a newest-first page, equal timestamps ordered by descending id.
pub fn read_recent_ids(con: &mut Connection, limit: usize, offset: usize) -> Result<Vec<u64>> {
    let Some((first, last)) = rank_bounds(limit, offset) else {
        return Ok(Vec::new());
    };
    let edge: Vec<(u64, f64)> = con.zrevrange_withscores(TIMELINE_KEY, first, last)?;
    let (Some(&(_, top)), Some(&(_, bottom))) = (edge.first(), edge.last()) else {
        return Ok(Vec::new());
    };

    // ZREVRANGE orders equal scores by member string ("9" above "10"), so
    // re-rank every member in the scores this page touches.
    let above: usize = con.zcount(TIMELINE_KEY, format!("({}", top), "+inf")?;
    let mut block: Vec<(u64, f64)> = con.zrevrangebyscore_withscores(TIMELINE_KEY, top, bottom)?;
    newest_first(&mut block);

    let page = page_in_block(block.len(), above, offset, offset.saturating_add(limit - 1));
    Ok(block[page].iter().map(|(id, _)| *id).collect())
}

pub fn read_recent(con: &mut Connection, limit: usize, offset: usize) -> Result<Vec<Reading>> {
    let ids = read_recent_ids(con, limit, offset)?;
    let mut readings = read_readings(con, &ids)?;
    sort_by_time(&mut readings);
    readings.reverse();
    Ok(readings)
}

// --- Store ---

/// [`ReadingStore`] over a Redis server. Holds only the client; every call
/// opens its own connection, so one store can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct RedisReadingStore {
    client: Client,
    io_timeout: Option<Duration>,
}

impl RedisReadingStore {
    pub fn open(config: &RedisStoreConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .with_context(|| format!("invalid redis url {:?}", config.url))?;
        Ok(Self {
            client,
            io_timeout: config.io_timeout(),
        })
    }

    pub fn insert(
        &self,
        reading: &NewReading,
        cancel: &CancellationToken,
    ) -> climate_core::Result<Reading> {
        let mut con = self.connection(cancel)?;
        Ok(write_reading(&mut con, reading)?)
    }

    fn connection(&self, cancel: &CancellationToken) -> climate_core::Result<Connection> {
        ensure_live(cancel)?;
        let con = match self.io_timeout {
            Some(timeout) => {
                let con = self
                    .client
                    .get_connection_with_timeout(timeout)
                    .map_err(SeriesError::storage)?;
                con.set_read_timeout(Some(timeout))
                    .map_err(SeriesError::storage)?;
                con.set_write_timeout(Some(timeout))
                    .map_err(SeriesError::storage)?;
                con
            }
            None => self.client.get_connection().map_err(SeriesError::storage)?,
        };
        Ok(con)
    }
}

impl ReadingStore for RedisReadingStore {
    fn fetch_ordered_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> climate_core::Result<Vec<Reading>> {
        let mut con = self.connection(cancel)?;
        debug!(%start, %end, "fetching readings by time");
        Ok(read_range(&mut con, start, end)?)
    }

    fn fetch_by_id_range(
        &self,
        low: u64,
        high: u64,
        cancel: &CancellationToken,
    ) -> climate_core::Result<Vec<Reading>> {
        let mut con = self.connection(cancel)?;
        debug!(low, high, "fetching readings by id");
        Ok(read_id_range(&mut con, low, high)?)
    }

    fn fetch_latest(&self, cancel: &CancellationToken) -> climate_core::Result<Option<Reading>> {
        let mut con = self.connection(cancel)?;
        Ok(read_latest(&mut con)?)
    }

    fn count_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> climate_core::Result<u64> {
        let mut con = self.connection(cancel)?;
        Ok(count_range(&mut con, start, end)?)
    }

    fn fetch_recent(
        &self,
        limit: usize,
        offset: usize,
        cancel: &CancellationToken,
    ) -> climate_core::Result<Vec<Reading>> {
        let mut con = self.connection(cancel)?;
        debug!(limit, offset, "fetching recent readings");
        Ok(read_recent(&mut con, limit, offset)?)
    }

    fn fetch_by_ids(
        &self,
        ids: &[u64],
        cancel: &CancellationToken,
    ) -> climate_core::Result<Vec<Reading>> {
        let mut con = self.connection(cancel)?;
        debug!(count = ids.len(), "fetching readings by id list");
        Ok(read_readings(&mut con, ids)?)
    }
}
