//! Sensor-fault heuristic.
//!
//! The humidity/temperature probe reports readings at or below a few degrees
//! when it malfunctions. This is an absolute cut-off, not a statistical
//! outlier test against history.

/// Temperatures at or below this value (°C) are treated as sensor faults.
pub const OUTLIER_TEMPERATURE_THRESHOLD: f64 = 3.0;

/// Returns `true` when `temperature` is at or below the fault threshold.
///
/// # Examples
///
/// ```
/// use climate_core::is_outlier;
///
/// assert!(is_outlier(3.0));
/// assert!(!is_outlier(21.5));
/// ```
pub fn is_outlier(temperature: f64) -> bool {
    temperature <= OUTLIER_TEMPERATURE_THRESHOLD
}
