//! An in-process backend holding locations, observations and normals in ordered maps.
//!
//! Serves the offline `demo` command and the engine tests. Query semantics follow the
//! PostgreSQL backend: the same filters, the same ordering, the same aggregate rules.

use super::repository::{NormalsStore, ObservationRepository, ObservationWriter, WeatherStore};
use crate::error::{AppError, Result};
use crate::models::{
    ClimateNormal, LocatedObservation, Location, LocationCoverage, MonthlyAggregate, Observation,
    SnapshotDate, TemperatureRange,
};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    locations: BTreeMap<i64, Location>,
    observations: BTreeMap<(i64, NaiveDate), Observation>,
    normals: BTreeMap<(i64, i32), ClimateNormal>,
}

impl Tables {
    fn locate(&self, obs: &Observation) -> Option<LocatedObservation> {
        self.locations
            .get(&obs.location_id)
            .map(|loc| LocatedObservation {
                observation: obs.clone(),
                location_name: loc.name.clone(),
                country_code: loc.country_code.clone(),
            })
    }

    fn observations_of(
        &self,
        location_id: i64,
    ) -> impl DoubleEndedIterator<Item = &Observation> + '_ {
        self.observations
            .range((location_id, NaiveDate::MIN)..=(location_id, NaiveDate::MAX))
            .map(|(_, obs)| obs)
    }
}

/// In-memory implementation of every storage contract.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of observations currently held.
    #[cfg(test)]
    pub async fn observation_count(&self) -> usize {
        self.tables.read().await.observations.len()
    }
}

#[async_trait]
impl ObservationRepository for InMemoryStore {
    async fn query_monthly_aggregate(
        &self,
        location_id: i64,
        month: i32,
        year_start: i32,
        year_end: i32,
    ) -> Result<Option<MonthlyAggregate>> {
        let tables = self.tables.read().await;
        let selected = tables.observations_of(location_id).filter(|obs| {
            obs.date.month() as i32 == month && (year_start..=year_end).contains(&obs.date.year())
        });
        Ok(MonthlyAggregate::from_observations(selected))
    }

    async fn query_locations_with_coverage(
        &self,
        year_start: i32,
        year_end: i32,
        min_days: i64,
    ) -> Result<Vec<LocationCoverage>> {
        let tables = self.tables.read().await;
        let coverage = tables
            .locations
            .values()
            .filter_map(|loc| {
                let count = tables
                    .observations_of(loc.id)
                    .filter(|obs| (year_start..=year_end).contains(&obs.date.year()))
                    .count() as i64;
                (count > 0 && count >= min_days).then(|| LocationCoverage {
                    location_id: loc.id,
                    name: loc.name.clone(),
                    country_code: loc.country_code.clone(),
                    observation_count: count,
                })
            })
            .collect();
        Ok(coverage)
    }

    async fn query_snapshot_at(
        &self,
        location_id: i64,
        date: SnapshotDate,
    ) -> Result<LocatedObservation> {
        let tables = self.tables.read().await;
        let found = match date {
            SnapshotDate::Latest => tables.observations_of(location_id).next_back(),
            SnapshotDate::On(day) => tables.observations.get(&(location_id, day)),
        };
        found.and_then(|obs| tables.locate(obs)).ok_or_else(|| {
            AppError::NotFound(format!(
                "no weather snapshot for location {} ({})",
                location_id, date
            ))
        })
    }

    async fn query_candidates_at(
        &self,
        date: NaiveDate,
        exclude_location_id: i64,
        temp_range: TemperatureRange,
        country_filter: Option<&[String]>,
    ) -> Result<Vec<LocatedObservation>> {
        let tables = self.tables.read().await;
        let candidates = tables
            .locations
            .values()
            .filter(|loc| loc.id != exclude_location_id)
            .filter(|loc| country_filter.map_or(true, |codes| codes.contains(&loc.country_code)))
            .filter_map(|loc| tables.observations.get(&(loc.id, date)))
            .filter(|obs| obs.temperature_avg.map_or(false, |t| temp_range.contains(t)))
            .filter_map(|obs| tables.locate(obs))
            .collect::<Vec<_>>();
        debug!(
            "In-memory candidate query on {} returned {} rows",
            date,
            candidates.len()
        );
        Ok(candidates)
    }
}

#[async_trait]
impl NormalsStore for InMemoryStore {
    async fn count_months(&self, location_id: i64) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .normals
            .range((location_id, i32::MIN)..=(location_id, i32::MAX))
            .count() as i64)
    }

    async fn upsert_month(&self, normal: &ClimateNormal) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .normals
            .insert((normal.location_id, normal.month), normal.clone());
        Ok(())
    }

    async fn replace_months(
        &self,
        location_id: i64,
        normals: &[ClimateNormal],
    ) -> Result<Vec<i32>> {
        let mut tables = self.tables.write().await;
        let stale: Vec<i32> = tables
            .normals
            .range((location_id, i32::MIN)..=(location_id, i32::MAX))
            .map(|(&(_, month), _)| month)
            .filter(|month| !normals.iter().any(|n| n.month == *month))
            .collect();
        for month in &stale {
            tables.normals.remove(&(location_id, *month));
        }
        for normal in normals {
            tables
                .normals
                .insert((location_id, normal.month), normal.clone());
        }
        Ok(stale)
    }

    async fn normals_for(&self, location_id: i64) -> Result<Vec<ClimateNormal>> {
        let tables = self.tables.read().await;
        Ok(tables
            .normals
            .range((location_id, i32::MIN)..=(location_id, i32::MAX))
            .map(|(_, n)| n.clone())
            .collect())
    }
}

#[async_trait]
impl ObservationWriter for InMemoryStore {
    async fn upsert_location(&self, location: &Location) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn insert_observations(&self, observations: &[Observation]) -> Result<usize> {
        let mut tables = self.tables.write().await;
        for obs in observations {
            tables
                .observations
                .insert((obs.location_id, obs.date), obs.clone());
        }
        Ok(observations.len())
    }
}

impl WeatherStore for InMemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn location(id: i64, country: &str) -> Location {
        Location {
            id,
            name: format!("Town {}", id),
            country_code: country.to_string(),
            latitude: None,
            longitude: None,
        }
    }

    fn obs(location_id: i64, date: NaiveDate, avg: f64) -> Observation {
        let mut o = Observation::empty(location_id, date);
        o.temperature_avg = Some(avg);
        o
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_observations_upsert_on_location_and_date() -> Result<()> {
        let store = InMemoryStore::new();
        store.upsert_location(&location(1, "US")).await?;
        store
            .insert_observations(&[obs(1, d(2024, 5, 1), 10.0), obs(1, d(2024, 5, 1), 12.0)])
            .await?;
        assert_eq!(store.observation_count().await, 1);

        let snap = store.query_snapshot_at(1, SnapshotDate::Latest).await?;
        assert_eq!(snap.observation.temperature_avg, Some(12.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_latest_snapshot_picks_most_recent_day() -> Result<()> {
        let store = InMemoryStore::new();
        store.upsert_location(&location(1, "US")).await?;
        store.upsert_location(&location(2, "US")).await?;
        store
            .insert_observations(&[
                obs(1, d(2024, 5, 1), 10.0),
                obs(1, d(2024, 5, 3), 11.0),
                obs(2, d(2024, 6, 1), 30.0),
            ])
            .await?;

        let snap = store.query_snapshot_at(1, SnapshotDate::Latest).await?;
        assert_eq!(snap.observation.date, d(2024, 5, 3));
        assert_eq!(snap.location_name, "Town 1");

        let missing = store
            .query_snapshot_at(1, SnapshotDate::On(d(2024, 5, 2)))
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_candidate_query_filters() -> Result<()> {
        let store = InMemoryStore::new();
        for (id, country) in [(1, "US"), (2, "US"), (3, "GB"), (4, "US")] {
            store.upsert_location(&location(id, country)).await?;
        }
        let day = d(2024, 7, 1);
        store
            .insert_observations(&[
                obs(1, day, 20.0),
                obs(2, day, 29.0),
                obs(3, day, 21.0),
                obs(4, day, 35.0),
            ])
            .await?;

        let range = TemperatureRange::around(20.0, 10.0);
        let all = store.query_candidates_at(day, 1, range, None).await?;
        let ids: Vec<i64> = all.iter().map(|c| c.location_id()).collect();
        assert_eq!(ids, vec![2, 3]);

        let us_only = vec!["US".to_string()];
        let local = store
            .query_candidates_at(day, 1, range, Some(&us_only))
            .await?;
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].country_code, "US");
        Ok(())
    }

    #[tokio::test]
    async fn test_coverage_counts_only_window_years() -> Result<()> {
        let store = InMemoryStore::new();
        store.upsert_location(&location(1, "US")).await?;
        store
            .insert_observations(&[
                obs(1, d(2019, 1, 1), 1.0),
                obs(1, d(2020, 1, 1), 1.0),
                obs(1, d(2021, 1, 1), 1.0),
            ])
            .await?;

        let covered = store.query_locations_with_coverage(2020, 2021, 2).await?;
        assert_eq!(covered.len(), 1);
        assert_eq!(covered[0].observation_count, 2);

        let none = store.query_locations_with_coverage(2020, 2021, 3).await?;
        assert!(none.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_months_drops_months_outside_the_new_set() -> Result<()> {
        let store = InMemoryStore::new();
        let aggregate = MonthlyAggregate {
            day_count: 28,
            ..MonthlyAggregate::default()
        };
        let normal = |location_id: i64, month: i32, first: i32| {
            ClimateNormal::from_aggregate(location_id, month, &aggregate, first, 2020, Utc::now())
        };
        store
            .replace_months(1, &[normal(1, 2, 2019), normal(1, 3, 2019), normal(1, 4, 2019)])
            .await?;
        store.upsert_month(&normal(2, 3, 2019)).await?;

        let removed = store
            .replace_months(1, &[normal(1, 2, 2020), normal(1, 4, 2020)])
            .await?;
        assert_eq!(removed, vec![3]);

        let kept = store.normals_for(1).await?;
        assert_eq!(kept.iter().map(|n| n.month).collect::<Vec<_>>(), vec![2, 4]);
        assert!(kept.iter().all(|n| n.source_year_start == 2020));
        // Other locations are untouched.
        assert_eq!(store.count_months(2).await?, 1);
        Ok(())
    }
}
