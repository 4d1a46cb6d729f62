//! Stored readings and the points produced by sampling them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outlier::is_outlier;

/// One logged observation as returned by the storage layer.
///
/// `id` is assigned at insertion and only serves as a locality proxy for
/// window aggregation; ordering in time always goes through `timestamp`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: u64,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_humidity: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Recomputed on every call, never stored.
    pub fn is_outlier(&self) -> bool {
        is_outlier(self.temperature)
    }

    pub fn flagged(self) -> FlaggedReading {
        let is_outlier = self.is_outlier();
        FlaggedReading {
            reading: self,
            is_outlier,
        }
    }
}

/// A reading that has not been stored yet and therefore has no id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewReading {
    pub temperature: f64,
    pub humidity: f64,
    #[serde(default)]
    pub secondary_temperature: Option<f64>,
    #[serde(default)]
    pub secondary_humidity: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl NewReading {
    pub fn new(temperature: f64, humidity: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            temperature,
            humidity,
            secondary_temperature: None,
            secondary_humidity: None,
            timestamp,
        }
    }

    pub fn with_secondary(mut self, temperature: f64, humidity: f64) -> Self {
        self.secondary_temperature = Some(temperature);
        self.secondary_humidity = Some(humidity);
        self
    }

    pub fn into_reading(self, id: u64) -> Reading {
        Reading {
            id,
            temperature: self.temperature,
            humidity: self.humidity,
            secondary_temperature: self.secondary_temperature,
            secondary_humidity: self.secondary_humidity,
            timestamp: self.timestamp,
        }
    }
}

/// A reading together with its derived outlier flag.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FlaggedReading {
    #[serde(flatten)]
    pub reading: Reading,
    pub is_outlier: bool,
}

/// One slot of a sampling result.
///
/// Gaps mark time slots where no reading was close enough. They carry only
/// the slot's target time, so a genuine zero measurement can never be
/// mistaken for missing data.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampledPoint {
    Real(FlaggedReading),
    Gap { timestamp: DateTime<Utc> },
}

impl SampledPoint {
    pub fn real(reading: Reading) -> Self {
        SampledPoint::Real(reading.flagged())
    }

    pub fn gap(timestamp: DateTime<Utc>) -> Self {
        SampledPoint::Gap { timestamp }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SampledPoint::Real(flagged) => flagged.reading.timestamp,
            SampledPoint::Gap { timestamp } => *timestamp,
        }
    }

    pub fn reading(&self) -> Option<&Reading> {
        match self {
            SampledPoint::Real(flagged) => Some(&flagged.reading),
            SampledPoint::Gap { .. } => None,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, SampledPoint::Gap { .. })
    }

    /// Gaps are never outliers.
    pub fn is_outlier(&self) -> bool {
        match self {
            SampledPoint::Real(flagged) => flagged.is_outlier,
            SampledPoint::Gap { .. } => false,
        }
    }
}
