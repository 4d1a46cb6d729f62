use std::thread;

use approx::assert_relative_eq;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use climate_core::{MemoryReadingStore, NewReading, SeriesError};
use climate_series::{SeriesBuilder, SeriesConfig, SeriesRequest};
use tokio_util::sync::CancellationToken;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 0, 0, 0).unwrap()
}

/// Ten readings one minute apart, ids 1..=10.
fn ten_minutes() -> MemoryReadingStore {
    (0..10)
        .map(|i| NewReading::new(20.0 + i as f64, 40.0, t0() + TimeDelta::minutes(i)))
        .collect()
}

fn ids(series: &climate_series::Series) -> Vec<Option<u64>> {
    series
        .points
        .iter()
        .map(|p| p.point.reading().map(|r| r.id))
        .collect()
}

#[test]
fn five_points_over_ten_minutes() {
    let store = ten_minutes();
    let builder = SeriesBuilder::new(&store, SeriesConfig::default());
    let request =
        SeriesRequest::new(t0(), t0() + TimeDelta::minutes(9), builder.config()).points(5);

    let series = builder
        .build_series(&request, &CancellationToken::new())
        .unwrap();

    assert_eq!(ids(&series), vec![Some(1), Some(3), Some(5), Some(8), Some(10)]);
    assert_eq!(series.total_count, 10);
    assert_eq!(series.returned_count, 5);
    assert_eq!(series.window_radius, None);
    assert!(series.points.iter().all(|p| p.window.is_none()));

    // id 1 with radius 3 sees ids 1..=4: 20, 21, 22, 23.
    let first = series.points[0].small_window.unwrap();
    assert_relative_eq!(first.temperature, 21.5);
    assert_relative_eq!(first.humidity, 40.0);
}

#[test]
fn configurable_window_reports_full_statistics() {
    let store = ten_minutes();
    let builder = SeriesBuilder::new(&store, SeriesConfig::default());
    let request = SeriesRequest::new(t0(), t0() + TimeDelta::minutes(9), builder.config())
        .points(2)
        .with_aggregates(2);

    let series = builder
        .build_series(&request, &CancellationToken::new())
        .unwrap();
    assert_eq!(series.window_radius, Some(2));

    // Last slot is id 10; its window is ids 8..=12, of which 8..=10 exist.
    let last = series.points.last().unwrap();
    let window = last.window.unwrap();
    assert_eq!(window.temperature.count, 3);
    assert_relative_eq!(window.temperature.average, 28.0);
    assert_eq!(window.temperature.minimum, 27.0);
    assert_eq!(window.temperature.maximum, 29.0);
    assert_eq!(window.humidity.count, 3);
}

#[test]
fn empty_range_is_all_gaps() {
    let store = ten_minutes();
    let builder = SeriesBuilder::new(&store, SeriesConfig::default());
    let start = t0() + TimeDelta::days(1);
    let request = SeriesRequest::new(start, start + TimeDelta::hours(3), builder.config())
        .points(3)
        .with_aggregates(5);

    let series = builder
        .build_series(&request, &CancellationToken::new())
        .unwrap();

    assert_eq!(series.total_count, 0);
    assert_eq!(ids(&series), vec![None, None, None]);
    assert_eq!(series.points[1].point.timestamp(), start + TimeDelta::hours(1));
    assert_eq!(series.points[2].point.timestamp(), start + TimeDelta::hours(2));
}

#[test]
fn outliers_stay_in_the_series_but_not_in_statistics() {
    let store: MemoryReadingStore = [22.0, 2.0, 24.0]
        .iter()
        .enumerate()
        .map(|(i, t)| NewReading::new(*t, 60.0 + i as f64, t0() + TimeDelta::minutes(i as i64)))
        .collect();
    let builder = SeriesBuilder::new(&store, SeriesConfig::default());
    let request = SeriesRequest::new(t0(), t0() + TimeDelta::minutes(2), builder.config())
        .points(3)
        .with_aggregates(1);

    let series = builder
        .build_series(&request, &CancellationToken::new())
        .unwrap();

    assert_eq!(ids(&series), vec![Some(1), Some(2), Some(3)]);
    let middle = &series.points[1];
    assert!(middle.point.is_outlier());
    let window = middle.window.unwrap();
    assert_eq!(window.temperature.count, 2);
    assert_relative_eq!(window.temperature.average, 23.0);
    assert_relative_eq!(window.humidity.average, 61.0);
}

#[test]
fn cancelled_request_stops_before_storage() {
    let store = ten_minutes();
    let builder = SeriesBuilder::new(&store, SeriesConfig::default());
    let request = SeriesRequest::new(t0(), t0() + TimeDelta::minutes(9), builder.config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(
        builder.build_series(&request, &cancel),
        Err(SeriesError::Cancelled)
    ));
}

#[test]
fn concurrent_builds_share_one_store() {
    let store = ten_minutes();
    let config = SeriesConfig::default();

    let results: Vec<Vec<Option<u64>>> = thread::scope(|scope| {
        let handles: Vec<_> = (2..=6)
            .map(|points| {
                let store = &store;
                let config = config.clone();
                scope.spawn(move || {
                    let builder = SeriesBuilder::new(store, config);
                    let end = t0() + TimeDelta::minutes(9);
                    let request = SeriesRequest::new(t0(), end, builder.config())
                        .points(points)
                        .with_aggregates(3);
                    let series = builder
                        .build_series(&request, &CancellationToken::new())
                        .unwrap();
                    ids(&series)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (points, ids) in (2..=6).zip(&results) {
        assert_eq!(ids.len(), points);
        assert_eq!(ids.last(), Some(&Some(10)));
    }
}

#[test]
fn series_serializes_gaps_and_readings_apart() {
    let store: MemoryReadingStore =
        std::iter::once(NewReading::new(21.0, 45.0, t0() + TimeDelta::minutes(30))).collect();
    let builder = SeriesBuilder::new(&store, SeriesConfig::default());
    let request = SeriesRequest::new(t0(), t0() + TimeDelta::hours(1), builder.config()).points(2);

    let series = builder
        .build_series(&request, &CancellationToken::new())
        .unwrap();
    let json = serde_json::to_value(&series).unwrap();

    assert_eq!(json["returned_count"], 2);
    assert_eq!(json["points"][0]["kind"], "gap");
    assert!(json["points"][0].get("small_window").is_none());
    assert_eq!(json["points"][1]["kind"], "real");
    assert_eq!(json["points"][1]["id"], 1);
    assert_eq!(json["points"][1]["is_outlier"], false);
    assert_eq!(json["points"][1]["small_window"]["temperature"], 21.0);
}

#[test]
fn latest_reading_is_flagged() {
    let mut store = ten_minutes();
    store.insert(NewReading::new(0.5, 90.0, t0() + TimeDelta::hours(1)));
    let builder = SeriesBuilder::new(&store, SeriesConfig::default());

    let latest = builder.latest(&CancellationToken::new()).unwrap().unwrap();
    assert_eq!(latest.reading.id, 11);
    assert!(latest.is_outlier);
}
