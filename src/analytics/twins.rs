//! The weather twins matcher.
//!
//! Given a reference location, finds the locations whose conditions on the same day are
//! most similar to it. A coarse temperature window and the scope's country filter narrow
//! the candidates in the repository; every survivor is then scored with
//! [`similarity`](super::similarity::similarity), thresholded, ranked and truncated.

use super::similarity::similarity;
use crate::db::ObservationRepository;
use crate::error::{AppError, Result};
use crate::models::{
    SearchMetadata, SnapshotDate, TemperatureRange, Twin, TwinOptions, TwinsReport,
};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Half-width of the `temperature_avg` window used to pre-filter candidates.
pub const CANDIDATE_TEMPERATURE_TOLERANCE: f64 = 10.0;

/// Finds weather twins for a reference location.
#[derive(Clone)]
pub struct TwinsMatcher {
    observations: Arc<dyn ObservationRepository>,
    evaluation_date: SnapshotDate,
}

impl TwinsMatcher {
    /// Creates a matcher that compares against each reference's latest snapshot.
    pub fn new(observations: Arc<dyn ObservationRepository>) -> Self {
        Self {
            observations,
            evaluation_date: SnapshotDate::Latest,
        }
    }

    /// Pins the canonical comparison date instead of using the latest snapshot.
    pub fn with_evaluation_date(mut self, date: SnapshotDate) -> Self {
        self.evaluation_date = date;
        self
    }

    /// Ranks locations by similarity to `reference_location_id`'s conditions.
    ///
    /// # Errors
    ///
    /// * `AppError::InvalidInput` if `min_similarity` is above 100 or the reference
    ///   snapshot has no average temperature to anchor the candidate window.
    /// * `AppError::NotFound` if the reference has no snapshot at the canonical date.
    /// * Any repository error, unchanged.
    pub async fn find_twins(
        &self,
        reference_location_id: i64,
        options: TwinOptions,
    ) -> Result<TwinsReport> {
        if options.min_similarity > 100 {
            return Err(AppError::InvalidInput(format!(
                "minimum similarity must be between 0 and 100, got {}",
                options.min_similarity
            )));
        }

        let reference = self
            .observations
            .query_snapshot_at(reference_location_id, self.evaluation_date)
            .await
            .map_err(|e| {
                warn!(
                    "No usable reference snapshot for location {}: {}",
                    reference_location_id, e
                );
                e
            })?;

        let reference_temp = reference.observation.temperature_avg.ok_or_else(|| {
            AppError::InvalidInput(format!(
                "reference snapshot for {} on {} has no average temperature",
                reference.location_name, reference.observation.date
            ))
        })?;
        let date = reference.observation.date;

        let country_filter = options.scope.country_filter(&reference.country_code);
        info!(
            "Searching {} twins for {} ({}) on {}",
            options.scope, reference.location_name, reference.country_code, date
        );

        let candidates = self
            .observations
            .query_candidates_at(
                date,
                reference_location_id,
                TemperatureRange::around(reference_temp, CANDIDATE_TEMPERATURE_TOLERANCE),
                country_filter.as_deref(),
            )
            .await?;
        let candidates_considered = candidates.len();

        // par_iter + collect keeps retrieval order, which the stable sort below relies on.
        let mut twins: Vec<Twin> = candidates
            .into_par_iter()
            .filter(|c| c.location_id() != reference_location_id)
            .map(|candidate| {
                let scores = similarity(&reference.observation, &candidate.observation);
                Twin {
                    location_id: candidate.location_id(),
                    location_name: candidate.location_name.clone(),
                    country_code: candidate.country_code.clone(),
                    conditions: candidate,
                    scores,
                }
            })
            .filter(|twin| twin.scores.overall >= options.min_similarity)
            .collect();

        let candidates_matched = twins.len();
        twins.sort_by(|a, b| b.scores.overall.cmp(&a.scores.overall));
        twins.truncate(options.limit);

        debug!(
            "{} candidates, {} above {}, returning {}",
            candidates_considered,
            candidates_matched,
            options.min_similarity,
            twins.len()
        );

        let metadata = SearchMetadata {
            scope: options.scope,
            date,
            min_similarity: options.min_similarity,
            limit: options.limit,
            candidates_considered,
            candidates_matched,
            returned: twins.len(),
        };

        Ok(TwinsReport {
            reference,
            twins,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryStore, ObservationWriter};
    use crate::models::{Location, Observation, Scope};
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 14).unwrap()
    }

    fn conditions(
        location_id: i64,
        temp: f64,
        humidity: f64,
        precip: f64,
        wind: f64,
        label: &str,
    ) -> Observation {
        let mut obs = Observation::empty(location_id, day());
        obs.temperature_avg = Some(temp);
        obs.humidity = Some(humidity);
        obs.precipitation = Some(precip);
        obs.wind_speed = Some(wind);
        obs.weather_condition = Some(label.to_string());
        obs
    }

    async fn add(store: &InMemoryStore, id: i64, country: &str, obs: Observation) {
        store
            .upsert_location(&Location {
                id,
                name: format!("City {}", id),
                country_code: country.to_string(),
                latitude: None,
                longitude: None,
            })
            .await
            .unwrap();
        store.insert_observations(&[obs]).await.unwrap();
    }

    /// Reference 1 (US) plus a spread of candidates with known overall scores.
    async fn fixture() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        add(&store, 1, "US", conditions(1, 20.0, 50.0, 0.0, 5.0, "Clear")).await;
        add(&store, 2, "US", conditions(2, 20.0, 50.0, 0.0, 5.0, "clear")).await; // 100
        add(&store, 3, "CA", conditions(3, 21.0, 52.0, 0.0, 5.0, "Clear")).await; // 97
        add(&store, 4, "GB", conditions(4, 20.0, 50.0, 0.0, 5.0, "Clear")).await; // 100
        add(&store, 5, "US", conditions(5, 20.0, 50.0, 3.0, 5.0, "Rain")).await; // 70
        add(&store, 6, "FR", conditions(6, 22.0, 55.0, 0.0, 7.0, "Mostly clear")).await; // 88
        add(&store, 7, "US", conditions(7, 35.0, 50.0, 0.0, 5.0, "Clear")).await; // pre-filtered
        store
    }

    #[tokio::test]
    async fn test_global_search_ranks_and_thresholds() -> Result<()> {
        let store = fixture().await;
        let report = TwinsMatcher::new(store)
            .find_twins(1, TwinOptions::default())
            .await?;

        let ids: Vec<i64> = report.twins.iter().map(|t| t.location_id).collect();
        assert_eq!(ids, vec![2, 4, 3, 6]);
        assert_eq!(report.metadata.candidates_considered, 5);
        assert_eq!(report.metadata.candidates_matched, 4);
        assert_eq!(report.metadata.returned, 4);
        assert_eq!(report.reference.location_id(), 1);
        assert!(report.twins.iter().all(|t| t.scores.overall >= 80));
        assert_eq!(report.twins[0].scores.overall, 100);
        Ok(())
    }

    #[tokio::test]
    async fn test_equal_scores_keep_retrieval_order() -> Result<()> {
        let store = fixture().await;
        let report = TwinsMatcher::new(store)
            .find_twins(1, TwinOptions::default())
            .await?;
        // Locations 2 and 4 both score 100; 2 was retrieved first.
        assert_eq!(report.twins[0].location_id, 2);
        assert_eq!(report.twins[1].location_id, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_limit_truncates_after_ranking() -> Result<()> {
        let store = fixture().await;
        let options = TwinOptions {
            limit: 2,
            ..TwinOptions::default()
        };
        let report = TwinsMatcher::new(store).find_twins(1, options).await?;
        assert_eq!(report.twins.len(), 2);
        assert_eq!(report.metadata.candidates_matched, 4);
        assert_eq!(report.metadata.returned, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_min_similarity_floor() -> Result<()> {
        let store = fixture().await;
        let matcher = TwinsMatcher::new(store);

        let strict = TwinOptions {
            min_similarity: 98,
            ..TwinOptions::default()
        };
        let report = matcher.find_twins(1, strict).await?;
        assert_eq!(report.twins.len(), 2);

        let loose = TwinOptions {
            min_similarity: 0,
            limit: 10,
            ..TwinOptions::default()
        };
        let report = matcher.find_twins(1, loose).await?;
        assert_eq!(report.twins.len(), 5);
        assert!(report.twins.iter().all(|t| t.location_id != 1));
        Ok(())
    }

    #[tokio::test]
    async fn test_local_scope_stays_in_reference_country() -> Result<()> {
        let store = fixture().await;
        let options = TwinOptions {
            scope: Scope::Local,
            min_similarity: 0,
            limit: 10,
        };
        let report = TwinsMatcher::new(store).find_twins(1, options).await?;
        assert!(!report.twins.is_empty());
        assert!(report.twins.iter().all(|t| t.country_code == "US"));
        assert_eq!(report.metadata.candidates_considered, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_regional_scope_uses_fixed_country_set() -> Result<()> {
        let store = fixture().await;
        let options = TwinOptions {
            scope: Scope::Regional,
            min_similarity: 0,
            limit: 10,
        };
        let report = TwinsMatcher::new(store).find_twins(1, options).await?;
        let ids: Vec<i64> = report.twins.iter().map(|t| t.location_id).collect();
        assert_eq!(ids, vec![2, 3, 5]);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_reference_is_not_found() {
        let store = fixture().await;
        let result = TwinsMatcher::new(store)
            .find_twins(42, TwinOptions::default())
            .await;
        match result {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("42")),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pinned_evaluation_date() -> Result<()> {
        let store = fixture().await;
        let later = NaiveDate::from_ymd_opt(2024, 8, 15).unwrap();
        let mut obs = conditions(1, 5.0, 90.0, 4.0, 20.0, "Rain");
        obs.date = later;
        store.insert_observations(&[obs]).await?;

        // Latest snapshot is the 15th, where no other location has data.
        let latest = TwinsMatcher::new(store.clone())
            .find_twins(1, TwinOptions::default())
            .await?;
        assert_eq!(latest.metadata.date, later);
        assert!(latest.twins.is_empty());

        let pinned = TwinsMatcher::new(store)
            .with_evaluation_date(SnapshotDate::On(day()))
            .find_twins(1, TwinOptions::default())
            .await?;
        assert_eq!(pinned.metadata.date, day());
        assert_eq!(pinned.twins.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_floor_is_rejected() {
        let store = fixture().await;
        let options = TwinOptions {
            min_similarity: 101,
            ..TwinOptions::default()
        };
        let result = TwinsMatcher::new(store).find_twins(1, options).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
