//! # Climate Core
//!
//! Data model and pure algorithms for the climate logger: the outlier
//! heuristic, summary statistics, and the time-series sampler that picks a
//! fixed number of representative points out of an irregular reading run.
//!
//! Storage is reached only through the [`ReadingStore`] trait, which every
//! backend implements and every caller passes in explicitly.

pub mod error;
pub mod memory;
pub mod outlier;
pub mod reading;
pub mod sampler;
pub mod stats;
pub mod store;

pub use error::{BoxError, Result, SeriesError};
pub use memory::MemoryReadingStore;
pub use outlier::{OUTLIER_TEMPERATURE_THRESHOLD, is_outlier};
pub use reading::{FlaggedReading, NewReading, Reading, SampledPoint};
pub use sampler::sample;
pub use stats::{Stats, reduce};
pub use store::{ReadingStore, ensure_live, sort_by_time};
