use std::num::NonZeroUsize;

use climate_core::{Result, SeriesError};
use serde::{Deserialize, Serialize};

/// Tuning for series building. Every field has a default, so a partial
/// document deserializes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SeriesConfig {
    /// Radius of the window behind the always-present display averages.
    pub small_window_radius: u32,
    pub default_window_radius: u32,
    pub max_window_radius: u32,
    pub default_point_count: usize,
    pub max_point_count: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            small_window_radius: 3,
            default_window_radius: 100,
            max_window_radius: 500,
            default_point_count: 50,
            max_point_count: 1000,
        }
    }
}

impl SeriesConfig {
    /// Checks a requested window radius against `1..=max_window_radius`.
    pub fn window_radius(&self, radius: u32) -> Result<u32> {
        if radius == 0 || radius > self.max_window_radius {
            return Err(SeriesError::WindowRadiusOutOfBounds {
                radius,
                max: self.max_window_radius,
            });
        }
        Ok(radius)
    }

    /// Checks a requested point count against `1..=max_point_count`.
    pub fn point_count(&self, count: usize) -> Result<NonZeroUsize> {
        NonZeroUsize::new(count)
            .filter(|count| count.get() <= self.max_point_count)
            .ok_or(SeriesError::PointCountOutOfBounds {
                count,
                max: self.max_point_count,
            })
    }
}
