//! # Series Builder
//!
//! Turns a time range into a fixed-length, chart-ready point set: samples the
//! stored readings, then attaches window statistics to every real point.
//! Also serves the simpler history queries (latest, newest-first pages and
//! id-strided history).
//!
//! A builder borrows its store and holds no other state, so one store can
//! back any number of concurrent builds.

use std::num::{NonZeroU64, NonZeroUsize};

use chrono::{DateTime, Utc};
use climate_core::{
    FlaggedReading, Reading, ReadingStore, Result, SampledPoint, SeriesError, ensure_live, sample,
    sort_by_time,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SeriesConfig;
use crate::window::{WindowAggregator, WindowAverages, WindowStats};

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub point_count: usize,
    /// Whether to attach full statistics over `window_radius`.
    pub include_aggregates: bool,
    pub window_radius: u32,
}

impl SeriesRequest {
    /// A request without configurable aggregates, using the configured
    /// defaults for point count and window radius.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, config: &SeriesConfig) -> Self {
        Self {
            start,
            end,
            point_count: config.default_point_count,
            include_aggregates: false,
            window_radius: config.default_window_radius,
        }
    }

    pub fn points(mut self, point_count: usize) -> Self {
        self.point_count = point_count;
        self
    }

    pub fn with_aggregates(mut self, window_radius: u32) -> Self {
        self.include_aggregates = true;
        self.window_radius = window_radius;
        self
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EnrichedPoint {
    #[serde(flatten)]
    pub point: SampledPoint,
    /// Averages over the small fixed window; absent for gaps and for
    /// readings with no stored neighbours.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_window: Option<WindowAverages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowStats>,
}

impl EnrichedPoint {
    fn bare(point: SampledPoint) -> Self {
        Self {
            point,
            small_window: None,
            window: None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Series {
    pub points: Vec<EnrichedPoint>,
    /// Stored readings inside the requested range.
    pub total_count: u64,
    pub returned_count: usize,
    /// Radius used for `window`, when configurable aggregates were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_radius: Option<u32>,
}

pub struct SeriesBuilder<'a, S: ?Sized> {
    store: &'a S,
    config: SeriesConfig,
}

impl<'a, S: ReadingStore + ?Sized> SeriesBuilder<'a, S> {
    pub fn new(store: &'a S, config: SeriesConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    /// Samples `[start, end]` into exactly `point_count` points and enriches
    /// every real point with window statistics.
    ///
    /// The range, point count and (when aggregates are requested) the window
    /// radius are validated before any storage call. Storage failures and
    /// cancellation abort the whole build; a point without neighbours just
    /// carries no statistics.
    pub fn build_series(
        &self,
        request: &SeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<Series> {
        let (start, end) = (request.start, request.end);
        let (count, window_radius) = self
            .validate(request)
            .inspect_err(|err| warn!(%err, "rejecting series request"))?;

        let total_count = self.store.count_in_range(start, end, cancel)?;
        let readings = self.store.fetch_ordered_in_range(start, end, cancel)?;
        debug!(
            %start,
            %end,
            points = count.get(),
            total_count,
            fetched = readings.len(),
            "sampling series"
        );

        let windows = WindowAggregator::new(self.store);
        let mut points = Vec::with_capacity(count.get());
        for point in sample(&readings, start, end, count) {
            points.push(self.enrich(&windows, point, window_radius, cancel)?);
        }

        Ok(Series {
            returned_count: points.len(),
            points,
            total_count,
            window_radius,
        })
    }

    fn validate(&self, request: &SeriesRequest) -> Result<(NonZeroUsize, Option<u32>)> {
        if request.end < request.start {
            return Err(SeriesError::InvalidRange {
                start: request.start,
                end: request.end,
            });
        }
        let count = self.config.point_count(request.point_count)?;
        let window_radius = if request.include_aggregates {
            Some(self.config.window_radius(request.window_radius)?)
        } else {
            None
        };
        Ok((count, window_radius))
    }

    fn enrich(
        &self,
        windows: &WindowAggregator<'_, S>,
        point: SampledPoint,
        window_radius: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<EnrichedPoint> {
        let Some(anchor) = point.reading() else {
            return Ok(EnrichedPoint::bare(point));
        };
        ensure_live(cancel)?;

        let small_window = windows.averages(anchor, self.config.small_window_radius, cancel)?;
        let window = match window_radius {
            Some(radius) => windows.aggregate(anchor, radius, cancel)?,
            None => None,
        };

        Ok(EnrichedPoint {
            point,
            small_window,
            window,
        })
    }

    /// The newest stored reading.
    pub fn latest(&self, cancel: &CancellationToken) -> Result<Option<FlaggedReading>> {
        Ok(self.store.fetch_latest(cancel)?.map(Reading::flagged))
    }

    /// Newest-first page; `limit` is capped at `max_point_count`.
    pub fn recent(
        &self,
        limit: usize,
        offset: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<FlaggedReading>> {
        let limit = limit.min(self.config.max_point_count);
        let readings = self.store.fetch_recent(limit, offset, cancel)?;
        Ok(readings.into_iter().map(Reading::flagged).collect())
    }

    /// Every `term`-th reading by id counting back from the newest, at most
    /// `limit` of them, newest first. Ids below 1 are never requested.
    pub fn strided(
        &self,
        limit: usize,
        term: NonZeroU64,
        cancel: &CancellationToken,
    ) -> Result<Vec<FlaggedReading>> {
        let Some(latest) = self.store.fetch_latest(cancel)? else {
            return Ok(Vec::new());
        };
        let limit = limit.min(self.config.max_point_count) as u64;

        let ids: Vec<u64> = (0..limit)
            .map_while(|i| {
                i.checked_mul(term.get())
                    .and_then(|step| latest.id.checked_sub(step))
            })
            .take_while(|id| *id > 0)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut readings = self.store.fetch_by_ids(&ids, cancel)?;
        sort_by_time(&mut readings);
        readings.reverse();
        Ok(readings.into_iter().map(Reading::flagged).collect())
    }
}
