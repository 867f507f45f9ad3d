//! The climate normals engine.
//!
//! For each (location, calendar month) the engine aggregates every daily observation in
//! that month across a year window and stores the result as one `ClimateNormal`. Failures
//! are contained per month: a month that cannot be aggregated is logged and reported, and
//! the remaining months and locations still run.

use crate::db::{NormalsStore, ObservationRepository};
use crate::error::Result;
use crate::models::{
    BatchReport, ClimateNormal, LocationNormals, NormalsFailure, NormalsRun, RunStatus, MONTHS,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Minimum stored observations inside the window for a location to join a batch run.
pub const DEFAULT_MIN_COVERAGE_DAYS: i64 = 365;

/// Computes and stores monthly climate normals.
#[derive(Clone)]
pub struct NormalsEngine {
    observations: Arc<dyn ObservationRepository>,
    store: Arc<dyn NormalsStore>,
    min_coverage_days: i64,
    workers: usize,
}

impl NormalsEngine {
    pub fn new(observations: Arc<dyn ObservationRepository>, store: Arc<dyn NormalsStore>) -> Self {
        Self {
            observations,
            store,
            min_coverage_days: DEFAULT_MIN_COVERAGE_DAYS,
            workers: 1,
        }
    }

    /// Sets the batch coverage threshold in days.
    pub fn with_min_coverage_days(mut self, days: i64) -> Self {
        self.min_coverage_days = days;
        self
    }

    /// Sets how many locations a batch run processes at once (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Computes the twelve monthly normals of one location over `year_start..=year_end`.
    ///
    /// Returns `Skipped` without touching the store when normals are already complete and
    /// `force_recompute` is false. The months computed in this call replace the location's
    /// stored set in one `replace_months` call; stored months this call did not refresh are
    /// deleted and listed in `months_removed`. When no month could be computed the stored
    /// set is left as it was.
    pub async fn compute_normals(
        &self,
        location_id: i64,
        year_start: i32,
        year_end: i32,
        force_recompute: bool,
    ) -> NormalsRun {
        if year_start > year_end {
            return NormalsRun::failed(
                location_id,
                None,
                format!("invalid year range {}-{}", year_start, year_end),
            );
        }

        if !force_recompute {
            match self.store.count_months(location_id).await {
                Ok(count) if count >= MONTHS.count() as i64 => {
                    debug!(
                        "Location {} already has complete normals, skipping",
                        location_id
                    );
                    return NormalsRun::skipped(location_id);
                },
                Ok(_) => {},
                Err(e) => {
                    error!(
                        "Failed to check existing normals for location {}: {}",
                        location_id, e
                    );
                    return NormalsRun::failed(location_id, None, e.to_string());
                },
            }
        }

        info!(
            "Computing normals for location {} over {}-{}",
            location_id, year_start, year_end
        );

        let updated_at = Utc::now();
        let mut normals = Vec::with_capacity(MONTHS.count());
        let mut months_without_data = Vec::new();
        let mut failures = Vec::new();

        for month in MONTHS {
            match self
                .observations
                .query_monthly_aggregate(location_id, month, year_start, year_end)
                .await
            {
                Ok(Some(aggregate)) => {
                    debug!(
                        "Location {} month {}: {} days aggregated",
                        location_id, month, aggregate.day_count
                    );
                    normals.push(ClimateNormal::from_aggregate(
                        location_id,
                        month,
                        &aggregate,
                        year_start,
                        year_end,
                        updated_at,
                    ));
                },
                Ok(None) => {
                    debug!("Location {} month {}: no observations", location_id, month);
                    months_without_data.push(month);
                },
                Err(e) => {
                    warn!(
                        "Failed to compute normals for location {} month {}: {}",
                        location_id, month, e
                    );
                    failures.push(NormalsFailure {
                        location_id,
                        month: Some(month),
                        reason: e.to_string(),
                    });
                },
            }
        }

        // The computed months replace the stored set, so no month keeps an older window.
        let mut months_written = 0;
        let mut months_removed = Vec::new();
        if !normals.is_empty() {
            match self.store.replace_months(location_id, &normals).await {
                Ok(removed) => {
                    months_written = normals.len();
                    months_removed = removed;
                },
                Err(e) => {
                    error!(
                        "Failed to store normals for location {}: {}",
                        location_id, e
                    );
                    failures.push(NormalsFailure {
                        location_id,
                        month: None,
                        reason: e.to_string(),
                    });
                },
            }
        }

        let status = if months_written > 0 || failures.is_empty() {
            RunStatus::Computed
        } else {
            RunStatus::Failed
        };

        info!(
            "Location {}: {} months written, {} without data, {} removed, {} failures",
            location_id,
            months_written,
            months_without_data.len(),
            months_removed.len(),
            failures.len()
        );

        NormalsRun {
            location_id,
            status,
            months_written,
            months_without_data,
            months_removed,
            failures,
        }
    }

    /// Runs `compute_normals` for every location with enough coverage in the window.
    ///
    /// Locations below the coverage threshold are left out silently. Per-location failures
    /// are folded into the report; only a failing coverage query aborts the batch.
    pub async fn compute_normals_for_all_locations(
        &self,
        year_start: i32,
        year_end: i32,
        force_recompute: bool,
    ) -> Result<BatchReport> {
        let locations = self
            .observations
            .query_locations_with_coverage(year_start, year_end, self.min_coverage_days)
            .await?;

        info!(
            "Batch normals over {}-{}: {} locations with at least {} days (workers: {})",
            year_start,
            year_end,
            locations.len(),
            self.min_coverage_days,
            self.workers
        );

        let mut report = BatchReport::new(year_start, year_end);
        report.locations_considered = locations.len();

        if self.workers <= 1 {
            for location in &locations {
                let run = self
                    .compute_normals(location.location_id, year_start, year_end, force_recompute)
                    .await;
                report.record(run);
            }
        } else {
            let permits = Arc::new(Semaphore::new(self.workers));
            let mut tasks = JoinSet::new();
            let mut task_locations = HashMap::with_capacity(locations.len());
            for location in &locations {
                let engine = self.clone();
                let permits = Arc::clone(&permits);
                let location_id = location.location_id;
                let handle = tasks.spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    engine
                        .compute_normals(location_id, year_start, year_end, force_recompute)
                        .await
                });
                task_locations.insert(handle.id(), location_id);
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(run) => report.record(run),
                    Err(e) => match task_locations.get(&e.id()) {
                        Some(&location_id) => {
                            error!(
                                "Normals worker for location {} failed: {}",
                                location_id, e
                            );
                            report.record(NormalsRun::failed(
                                location_id,
                                None,
                                format!("worker task failed: {}", e),
                            ));
                        },
                        None => {
                            error!("Normals worker task failed: {}", e);
                            report.failed += 1;
                        },
                    },
                }
            }
        }

        report
            .failures
            .sort_by_key(|f| (f.location_id, f.month.unwrap_or(0)));

        info!(
            "Batch normals finished: {} processed, {} skipped, {} failed, {} normals written",
            report.processed, report.skipped, report.failed, report.normals_written
        );
        Ok(report)
    }

    /// Stored normals for a location, ordered by month.
    pub async fn normals_for(&self, location_id: i64) -> Result<LocationNormals> {
        let months = self.store.normals_for(location_id).await?;
        Ok(LocationNormals {
            location_id,
            months,
        })
    }
}
