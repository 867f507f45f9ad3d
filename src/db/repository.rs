//! Storage contracts consumed by the analytics core.
//!
//! The normals engine and the twins matcher only ever talk to these traits; the
//! PostgreSQL and in-memory backends both implement all of them.

use crate::error::Result;
use crate::models::{
    ClimateNormal, LocatedObservation, Location, LocationCoverage, MonthlyAggregate, Observation,
    SnapshotDate, TemperatureRange,
};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Read access to daily observations.
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Aggregates observations for `location_id` in calendar `month` with year in
    /// `year_start..=year_end`. `None` when no observation matches.
    async fn query_monthly_aggregate(
        &self,
        location_id: i64,
        month: i32,
        year_start: i32,
        year_end: i32,
    ) -> Result<Option<MonthlyAggregate>>;

    /// Locations with at least `min_days` observations inside the year window, by id.
    async fn query_locations_with_coverage(
        &self,
        year_start: i32,
        year_end: i32,
        min_days: i64,
    ) -> Result<Vec<LocationCoverage>>;

    /// The location's observation for the requested date.
    ///
    /// Fails with `AppError::NotFound` when the location has no matching observation.
    async fn query_snapshot_at(
        &self,
        location_id: i64,
        date: SnapshotDate,
    ) -> Result<LocatedObservation>;

    /// Observations on `date` for every location other than `exclude_location_id` whose
    /// average temperature falls in `temp_range` and, when `country_filter` is set, whose
    /// country is in the list. Ordered by location id.
    async fn query_candidates_at(
        &self,
        date: NaiveDate,
        exclude_location_id: i64,
        temp_range: TemperatureRange,
        country_filter: Option<&[String]>,
    ) -> Result<Vec<LocatedObservation>>;
}

/// Read/write access to computed climate normals.
#[async_trait]
pub trait NormalsStore: Send + Sync {
    /// Number of months stored for the location.
    async fn count_months(&self, location_id: i64) -> Result<i64>;

    /// Replaces the (location, month) record in full.
    async fn upsert_month(&self, normal: &ClimateNormal) -> Result<()>;

    /// Makes `normals` the location's complete stored set: writes every record and deletes
    /// the location's other months in one atomic step. Returns the deleted months, ascending.
    ///
    /// Every record in `normals` must belong to `location_id`.
    async fn replace_months(&self, location_id: i64, normals: &[ClimateNormal])
        -> Result<Vec<i32>>;

    /// Stored normals for the location, ordered by month.
    async fn normals_for(&self, location_id: i64) -> Result<Vec<ClimateNormal>>;
}

/// Write access used to seed a store with locations and observations.
#[async_trait]
pub trait ObservationWriter: Send + Sync {
    /// Inserts the location, or updates name/country/coordinates when the id exists.
    async fn upsert_location(&self, location: &Location) -> Result<()>;

    /// Upserts observations on (location, date). Returns how many were written.
    async fn insert_observations(&self, observations: &[Observation]) -> Result<usize>;
}

/// A backend that provides every storage contract the application uses.
#[async_trait]
pub trait WeatherStore: ObservationRepository + NormalsStore + ObservationWriter {
    /// Prepares the backend for use (creates tables, indexes).
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }
}
