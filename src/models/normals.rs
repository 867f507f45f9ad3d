//! Monthly climate normals and the aggregates they are derived from.
//!
//! Includes structs for:
//! - Per-month aggregates read from the observation store (`MonthlyAggregate`).
//! - Persisted normals keyed on (location, month) (`ClimateNormal`).
//! - Run reports returned by the normals engine (`NormalsRun`, `BatchReport`).

use super::Observation;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cloud cover (percent) below which a day counts as sunny.
pub const SUNNY_CLOUD_COVER_MAX: f64 = 30.0;
/// Precipitation above which a day counts as rainy.
pub const RAINY_PRECIPITATION_MIN: f64 = 1.0;
/// Condition token marking a snowy day.
pub const SNOW_TOKEN: &str = "snow";

/// Months of the year, as stored in the `month` column.
pub const MONTHS: std::ops::RangeInclusive<i32> = 1..=12;

pub fn is_sunny(obs: &Observation) -> bool {
    obs.cloud_cover.map_or(false, |c| c < SUNNY_CLOUD_COVER_MAX)
}

pub fn is_rainy(obs: &Observation) -> bool {
    obs.precipitation.map_or(false, |p| p > RAINY_PRECIPITATION_MIN)
}

pub fn is_snowy(obs: &Observation) -> bool {
    obs.condition().contains(SNOW_TOKEN)
}

/// Aggregated statistics for one location and calendar month over a year window.
///
/// Means and extremes skip missing values the way SQL `AVG`/`MAX`/`MIN` do; a statistic
/// with no contributing values is `None`.
#[derive(Debug, Clone, PartialEq, Default, sqlx::FromRow)]
pub struct MonthlyAggregate {
    pub day_count: i64,
    pub avg_temp_high: Option<f64>,
    pub avg_temp_low: Option<f64>,
    pub max_temp_high: Option<f64>,
    pub min_temp_low: Option<f64>,
    pub avg_precipitation: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_wind_speed: Option<f64>,
    pub sunny_days: i64,
    pub rainy_days: i64,
    pub snowy_days: i64,
}

impl MonthlyAggregate {
    /// Aggregates an already-selected set of observations.
    ///
    /// Returns `None` for an empty selection: a month without data has no aggregate.
    pub fn from_observations<'a, I>(observations: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut agg = MonthlyAggregate::default();
        let mut high = Mean::default();
        let mut low = Mean::default();
        let mut precipitation = Mean::default();
        let mut humidity = Mean::default();
        let mut wind = Mean::default();

        for obs in observations {
            agg.day_count += 1;
            high.push(obs.temperature_high);
            low.push(obs.temperature_low);
            precipitation.push(obs.precipitation);
            humidity.push(obs.humidity);
            wind.push(obs.wind_speed);

            agg.max_temp_high = max_opt(agg.max_temp_high, obs.temperature_high);
            agg.min_temp_low = min_opt(agg.min_temp_low, obs.temperature_low);

            agg.sunny_days += i64::from(is_sunny(obs));
            agg.rainy_days += i64::from(is_rainy(obs));
            agg.snowy_days += i64::from(is_snowy(obs));
        }

        if agg.day_count == 0 {
            return None;
        }

        agg.avg_temp_high = high.value();
        agg.avg_temp_low = low.value();
        agg.avg_precipitation = precipitation.value();
        agg.avg_humidity = humidity.value();
        agg.avg_wind_speed = wind.value();
        Some(agg)
    }
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

fn max_opt(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_opt(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// The stored climate normal for one (location, month).
///
/// Every field is rewritten on each recompute; the record is never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ClimateNormal {
    pub location_id: i64,
    /// Calendar month, 1 through 12.
    pub month: i32,
    pub avg_temp_high: Option<f64>,
    pub avg_temp_low: Option<f64>,
    pub record_high: Option<f64>,
    pub record_low: Option<f64>,
    pub avg_precipitation: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_wind_speed: Option<f64>,
    pub sunny_day_count: i64,
    pub rainy_day_count: i64,
    pub snowy_day_count: i64,
    pub source_year_start: i32,
    pub source_year_end: i32,
    pub updated_at: DateTime<Utc>,
}

impl ClimateNormal {
    /// Builds the normal for `month` from its aggregate and the window it was computed over.
    pub fn from_aggregate(
        location_id: i64,
        month: i32,
        aggregate: &MonthlyAggregate,
        year_start: i32,
        year_end: i32,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            location_id,
            month,
            avg_temp_high: aggregate.avg_temp_high,
            avg_temp_low: aggregate.avg_temp_low,
            record_high: aggregate.max_temp_high,
            record_low: aggregate.min_temp_low,
            avg_precipitation: aggregate.avg_precipitation,
            avg_humidity: aggregate.avg_humidity,
            avg_wind_speed: aggregate.avg_wind_speed,
            sunny_day_count: aggregate.sunny_days,
            rainy_day_count: aggregate.rainy_days,
            snowy_day_count: aggregate.snowy_days,
            source_year_start: year_start,
            source_year_end: year_end,
            updated_at,
        }
    }
}

/// Stored normals for one location, ordered by month.
#[derive(Debug, Clone, Serialize)]
pub struct LocationNormals {
    pub location_id: i64,
    pub months: Vec<ClimateNormal>,
}

impl LocationNormals {
    /// A location's normals are complete once all twelve months are stored.
    pub fn is_complete(&self) -> bool {
        self.months.len() == MONTHS.count()
    }
}

/// How a single `compute_normals` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// At least one month was written.
    Computed,
    /// Normals were already complete and no recompute was requested.
    Skipped,
    /// Nothing was written and at least one failure was recorded.
    Failed,
}

/// A recovered failure while computing normals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalsFailure {
    pub location_id: i64,
    /// `None` when the failure was not tied to a single month (e.g. the final write).
    pub month: Option<i32>,
    pub reason: String,
}

/// Outcome of computing normals for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalsRun {
    pub location_id: i64,
    pub status: RunStatus,
    pub months_written: usize,
    /// Months with no observations in the window.
    pub months_without_data: Vec<i32>,
    /// Previously stored months deleted because this run did not refresh them.
    pub months_removed: Vec<i32>,
    pub failures: Vec<NormalsFailure>,
}

impl NormalsRun {
    pub fn skipped(location_id: i64) -> Self {
        Self {
            location_id,
            status: RunStatus::Skipped,
            months_written: 0,
            months_without_data: Vec::new(),
            months_removed: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn failed(location_id: i64, month: Option<i32>, reason: impl Into<String>) -> Self {
        Self {
            location_id,
            status: RunStatus::Failed,
            months_written: 0,
            months_without_data: Vec::new(),
            months_removed: Vec::new(),
            failures: vec![NormalsFailure {
                location_id,
                month,
                reason: reason.into(),
            }],
        }
    }
}

/// Totals for a batch normals run over every sufficiently covered location.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub year_start: i32,
    pub year_end: i32,
    /// Locations that met the coverage threshold.
    pub locations_considered: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub normals_written: usize,
    pub failures: Vec<NormalsFailure>,
}

impl BatchReport {
    pub fn new(year_start: i32, year_end: i32) -> Self {
        Self {
            year_start,
            year_end,
            ..Self::default()
        }
    }

    /// Folds one location's run into the totals.
    pub fn record(&mut self, run: NormalsRun) {
        match run.status {
            RunStatus::Computed => self.processed += 1,
            RunStatus::Skipped => self.skipped += 1,
            RunStatus::Failed => self.failed += 1,
        }
        self.normals_written += run.months_written;
        self.failures.extend(run.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32, high: f64, low: f64) -> Observation {
        let mut obs = Observation::empty(7, NaiveDate::from_ymd_opt(2020, 6, d).unwrap());
        obs.temperature_high = Some(high);
        obs.temperature_low = Some(low);
        obs
    }

    #[test]
    fn test_aggregate_means_and_extremes() {
        let obs = vec![day(1, 20.0, 10.0), day(2, 22.0, 8.0), day(3, 24.0, 12.0)];
        let agg = MonthlyAggregate::from_observations(&obs).unwrap();

        assert_eq!(agg.day_count, 3);
        assert_eq!(agg.avg_temp_high, Some(22.0));
        assert_eq!(agg.avg_temp_low, Some(10.0));
        assert_eq!(agg.max_temp_high, Some(24.0));
        assert_eq!(agg.min_temp_low, Some(8.0));
        assert_eq!(agg.avg_precipitation, None);
    }

    #[test]
    fn test_aggregate_of_nothing_is_none() {
        let obs: Vec<Observation> = Vec::new();
        assert!(MonthlyAggregate::from_observations(&obs).is_none());
    }

    #[test]
    fn test_missing_values_are_skipped_in_means() {
        let mut a = day(1, 20.0, 10.0);
        a.humidity = Some(40.0);
        let b = day(2, 30.0, 12.0);
        let agg = MonthlyAggregate::from_observations(&[a, b]).unwrap();
        assert_eq!(agg.avg_humidity, Some(40.0));
        assert_eq!(agg.avg_temp_high, Some(25.0));
    }

    #[test]
    fn test_day_type_thresholds() {
        let mut obs = day(1, 20.0, 10.0);
        obs.cloud_cover = Some(30.0);
        obs.precipitation = Some(1.0);
        assert!(!is_sunny(&obs));
        assert!(!is_rainy(&obs));

        obs.cloud_cover = Some(29.9);
        obs.precipitation = Some(1.01);
        assert!(is_sunny(&obs));
        assert!(is_rainy(&obs));

        obs.weather_condition = Some("Blowing SNOW".to_string());
        assert!(is_snowy(&obs));
        obs.weather_condition = None;
        assert!(!is_snowy(&obs));
    }

    #[test]
    fn test_day_type_counts() {
        let mut sunny = day(1, 25.0, 15.0);
        sunny.cloud_cover = Some(10.0);
        let mut wet = day(2, 18.0, 12.0);
        wet.precipitation = Some(6.5);
        wet.cloud_cover = Some(90.0);
        let mut snow = day(3, 1.0, -4.0);
        snow.weather_condition = Some("Snow".to_string());
        snow.precipitation = Some(3.0);

        let agg = MonthlyAggregate::from_observations(&[sunny, wet, snow]).unwrap();
        assert_eq!(agg.sunny_days, 1);
        assert_eq!(agg.rainy_days, 2);
        assert_eq!(agg.snowy_days, 1);
    }

    #[test]
    fn test_batch_report_folds_runs() {
        let mut report = BatchReport::new(1991, 2020);
        report.record(NormalsRun {
            location_id: 1,
            status: RunStatus::Computed,
            months_written: 12,
            months_without_data: Vec::new(),
            months_removed: Vec::new(),
            failures: Vec::new(),
        });
        report.record(NormalsRun::skipped(2));
        report.record(NormalsRun::failed(3, Some(4), "boom"));

        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.normals_written, 12);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].month, Some(4));
    }
}
