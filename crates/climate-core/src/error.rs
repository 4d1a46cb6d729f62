use chrono::{DateTime, Utc};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = SeriesError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] BoxError),

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid time range: end {end} is before start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("window radius {radius} outside 1..={max}")]
    WindowRadiusOutOfBounds { radius: u32, max: u32 },

    #[error("point count {count} outside 1..={max}")]
    PointCountOutOfBounds { count: usize, max: usize },
}

impl SeriesError {
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        SeriesError::StorageUnavailable(err.into())
    }
}

impl From<anyhow::Error> for SeriesError {
    fn from(err: anyhow::Error) -> Self {
        SeriesError::StorageUnavailable(err.into())
    }
}
