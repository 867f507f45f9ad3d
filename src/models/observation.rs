//! Daily weather observations and the location records they belong to.
//!
//! Includes structs for:
//! - Locations and their country codes (`Location`, `LocationCoverage`).
//! - One consolidated observation per location per day (`Observation`).
//! - Observations joined with location identity, as returned by snapshot and
//!   candidate queries (`LocatedObservation`).

use super::ConditionLabel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A place observations are recorded for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: i64,
    pub name: String,
    /// ISO 3166-1 alpha-2 code, upper case.
    pub country_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A location together with how many observations it has inside a year window.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LocationCoverage {
    pub location_id: i64,
    pub name: String,
    pub country_code: String,
    pub observation_count: i64,
}

/// One day of consolidated weather data for a location.
///
/// Measured values are optional because providers do not always report every field.
/// At most one observation exists per (`location_id`, `date`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Observation {
    pub location_id: i64,
    pub date: NaiveDate,
    pub temperature_high: Option<f64>,
    pub temperature_low: Option<f64>,
    pub temperature_avg: Option<f64>,
    /// Daily total, millimetres.
    pub precipitation: Option<f64>,
    /// Relative humidity, percent.
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    /// Cloud cover, percent.
    pub cloud_cover: Option<f64>,
    pub feels_like: Option<f64>,
    pub weather_condition: Option<String>,
    pub weather_description: Option<String>,
}

impl Observation {
    /// Creates an observation with only the key fields set.
    pub fn empty(location_id: i64, date: NaiveDate) -> Self {
        Self {
            location_id,
            date,
            temperature_high: None,
            temperature_low: None,
            temperature_avg: None,
            precipitation: None,
            humidity: None,
            wind_speed: None,
            cloud_cover: None,
            feels_like: None,
            weather_condition: None,
            weather_description: None,
        }
    }

    /// The normalised condition label (empty when the provider sent none).
    pub fn condition(&self) -> ConditionLabel {
        ConditionLabel::from_option(self.weather_condition.as_deref())
    }
}

/// An observation joined with the identity of its location.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LocatedObservation {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub observation: Observation,
    pub location_name: String,
    pub country_code: String,
}

impl LocatedObservation {
    pub fn location_id(&self) -> i64 {
        self.observation.location_id
    }
}

/// Which day's snapshot a lookup should resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDate {
    /// The most recent observation stored for the location.
    Latest,
    /// Exactly this calendar date.
    On(NaiveDate),
}

impl fmt::Display for SnapshotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotDate::Latest => f.write_str("latest available"),
            SnapshotDate::On(day) => write!(f, "on {}", day),
        }
    }
}

/// Inclusive bounds on `temperature_avg` used by the candidate pre-filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
}

impl TemperatureRange {
    /// A symmetric range of `tolerance` around `center`.
    pub fn around(center: f64, tolerance: f64) -> Self {
        Self {
            min: center - tolerance,
            max: center + tolerance,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_range_is_inclusive() {
        let range = TemperatureRange::around(20.0, 10.0);
        assert!(range.contains(10.0));
        assert!(range.contains(30.0));
        assert!(!range.contains(30.5));
        assert!(!range.contains(9.9));
    }

    #[test]
    fn test_observation_condition_defaults_to_empty() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut obs = Observation::empty(1, date);
        assert!(obs.condition().is_empty());

        obs.weather_condition = Some("Partly Cloudy".to_string());
        assert_eq!(obs.condition().as_str(), "partly cloudy");
    }
}
