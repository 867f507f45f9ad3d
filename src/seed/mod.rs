//! Seeds a store with synthetic history for the mock sites.
//!
//! Stands in for a real ingestion pipeline so normals and twin searches have data to
//! work on, both against PostgreSQL (`seed` command) and in memory (`demo` command).

mod mock;

pub use mock::*;

use crate::db::ObservationWriter;
use crate::error::{AppError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

/// What a seeding run wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub locations: usize,
    pub observations: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Writes every mock site and `years` full calendar years of daily observations ending
/// with `end_year`.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` if `years` is zero or the dates are out of range, and
/// propagates any writer error.
pub async fn seed_store<W>(
    writer: &W,
    provider: &MockObservationProvider,
    years: u32,
    end_year: i32,
) -> Result<SeedSummary>
where
    W: ObservationWriter + ?Sized,
{
    if years == 0 {
        return Err(AppError::InvalidInput(
            "at least one year of observations is required".to_string(),
        ));
    }
    let start_year = end_year - (years as i32 - 1);
    let first_date = NaiveDate::from_ymd_opt(start_year, 1, 1);
    let last_date = NaiveDate::from_ymd_opt(end_year, 12, 31);
    let (first_date, last_date) = first_date.zip(last_date).ok_or_else(|| {
        AppError::InvalidInput(format!("cannot seed years {}..={}", start_year, end_year))
    })?;

    info!(
        "Seeding {} mock locations from {} to {}",
        provider.sites().len(),
        first_date,
        last_date
    );

    let mut observations = 0;
    for site in provider.sites() {
        writer.upsert_location(&site.location()).await?;
        let batch = provider.observations_for(site, first_date, last_date);
        observations += writer.insert_observations(&batch).await?;
        debug!("Seeded {} observations for {}", batch.len(), site.name);
    }

    info!("Seeding complete: {} observations written", observations);
    Ok(SeedSummary {
        locations: provider.sites().len(),
        observations,
        first_date,
        last_date,
    })
}
