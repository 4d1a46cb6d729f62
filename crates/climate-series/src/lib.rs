//! # Climate Series
//!
//! Builds chart series out of stored climate readings: evenly time-spaced
//! sampling from `climate-core`, plus local window statistics fetched through
//! any [`climate_core::ReadingStore`].

pub mod builder;
pub mod config;
pub mod window;

pub use builder::{EnrichedPoint, Series, SeriesBuilder, SeriesRequest};
pub use config::SeriesConfig;
pub use window::{WindowAggregator, WindowAverages, WindowStats, summarize, window_bounds};
