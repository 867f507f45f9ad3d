//! Provides PostgreSQL database interaction functionalities using `sqlx`.
//!
//! Includes capabilities for establishing connection pools, initializing the database schema,
//! seeding locations and daily observations, and the analytical queries behind the climate
//! normals engine and the weather twins matcher.
//! Also contains integration tests for database operations (requires the `integration-tests` feature).

use super::repository::{NormalsStore, ObservationRepository, ObservationWriter, WeatherStore};
use crate::config::DatabaseSettings;
use crate::error::{AppError, Result};
use crate::models::{
    ClimateNormal, LocatedObservation, Location, LocationCoverage, MonthlyAggregate, Observation,
    SnapshotDate, TemperatureRange,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use std::time::Duration;
use tracing::{debug, error, info};

/// Columns selected for a `LocatedObservation` (observation joined with its location).
const LOCATED_OBSERVATION_COLUMNS: &str = r#"
    o.location_id, o.date, o.temperature_high, o.temperature_low, o.temperature_avg,
    o.precipitation, o.humidity, o.wind_speed, o.cloud_cover, o.feels_like,
    o.weather_condition, o.weather_description,
    l.name AS location_name, l.country_code
"#;

/// Represents the database connection pool and provides methods for database operations.
///
/// Holds a `sqlx::Pool` for efficient connection management.
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    /// Creates a new `Database` instance by establishing a connection pool.
    ///
    /// # Arguments
    ///
    /// * `settings` - Connection string, pool size and acquire timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the connection pool cannot be established.
    pub async fn new(settings: &DatabaseSettings) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect(&settings.url)
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                AppError::from(e)
            })?;

        info!("Connected to database successfully");
        Ok(Self { pool })
    }

    /// Initializes the database schema: `locations`, `weather_observations`,
    /// `climate_normals` and their indexes.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` and `CREATE INDEX IF NOT EXISTS` to be idempotent,
    /// meaning it can be safely run multiple times.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any SQL statement fails during schema creation.
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema (if necessary)...");

        let statements = [
            (
                "locations table",
                r#"
                CREATE TABLE IF NOT EXISTS locations (
                    id BIGINT PRIMARY KEY,
                    name TEXT NOT NULL,
                    country_code TEXT NOT NULL,
                    latitude DOUBLE PRECISION,
                    longitude DOUBLE PRECISION,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "weather_observations table",
                r#"
                CREATE TABLE IF NOT EXISTS weather_observations (
                    id BIGSERIAL PRIMARY KEY,
                    location_id BIGINT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
                    date DATE NOT NULL,
                    temperature_high DOUBLE PRECISION,
                    temperature_low DOUBLE PRECISION,
                    temperature_avg DOUBLE PRECISION,
                    precipitation DOUBLE PRECISION,
                    humidity DOUBLE PRECISION,
                    wind_speed DOUBLE PRECISION,
                    cloud_cover DOUBLE PRECISION,
                    feels_like DOUBLE PRECISION,
                    weather_condition TEXT,
                    weather_description TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (location_id, date) -- One consolidated observation per day
                )
                "#,
            ),
            (
                "climate_normals table",
                r#"
                CREATE TABLE IF NOT EXISTS climate_normals (
                    location_id BIGINT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
                    month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
                    avg_temp_high DOUBLE PRECISION,
                    avg_temp_low DOUBLE PRECISION,
                    record_high DOUBLE PRECISION,
                    record_low DOUBLE PRECISION,
                    avg_precipitation DOUBLE PRECISION,
                    avg_humidity DOUBLE PRECISION,
                    avg_wind_speed DOUBLE PRECISION,
                    sunny_day_count BIGINT NOT NULL,
                    rainy_day_count BIGINT NOT NULL,
                    snowy_day_count BIGINT NOT NULL,
                    source_year_start INTEGER NOT NULL,
                    source_year_end INTEGER NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (location_id, month)
                )
                "#,
            ),
            (
                "observation date index",
                r#"CREATE INDEX IF NOT EXISTS idx_weather_observations_date ON weather_observations(date)"#,
            ),
            (
                "location country index",
                r#"CREATE INDEX IF NOT EXISTS idx_locations_country_code ON locations(country_code)"#,
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql).execute(&self.pool).await.map_err(|e| {
                error!("Failed to create {}: {}", what, e);
                AppError::from(e)
            })?;
        }

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Checks if the `weather_observations` table exists in the database schema.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query to `information_schema.tables` fails.
    pub async fn is_schema_initialized(&self) -> Result<bool> {
        debug!("Checking if database schema is initialized...");
        let query = "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'weather_observations')";
        let result = sqlx::query(query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to check schema existence: {}", e);
                AppError::from(e)
            })?;
        let initialized = result.try_get::<bool, _>(0)?;
        debug!("Schema initialized status: {}", initialized);
        Ok(initialized)
    }
}

#[async_trait]
impl ObservationRepository for Database {
    async fn query_monthly_aggregate(
        &self,
        location_id: i64,
        month: i32,
        year_start: i32,
        year_end: i32,
    ) -> Result<Option<MonthlyAggregate>> {
        debug!(
            "Aggregating month {} for location {} over {}-{}",
            month, location_id, year_start, year_end
        );

        // Aggregates always return one row; day_count = 0 means the month has no data.
        // AVG/MAX/MIN skip NULLs, matching the in-memory backend.
        let query = r#"
        SELECT
            COUNT(*) AS day_count,
            AVG(temperature_high) AS avg_temp_high,
            AVG(temperature_low) AS avg_temp_low,
            MAX(temperature_high) AS max_temp_high,
            MIN(temperature_low) AS min_temp_low,
            AVG(precipitation) AS avg_precipitation,
            AVG(humidity) AS avg_humidity,
            AVG(wind_speed) AS avg_wind_speed,
            COUNT(*) FILTER (WHERE cloud_cover < 30) AS sunny_days,
            COUNT(*) FILTER (WHERE precipitation > 1.0) AS rainy_days,
            COUNT(*) FILTER (WHERE weather_condition ILIKE '%snow%') AS snowy_days
        FROM weather_observations
        WHERE
            location_id = $1
            AND EXTRACT(MONTH FROM date)::INTEGER = $2
            AND EXTRACT(YEAR FROM date)::INTEGER BETWEEN $3 AND $4
        "#;

        let aggregate = sqlx::query_as::<_, MonthlyAggregate>(query)
            .bind(location_id)
            .bind(month)
            .bind(year_start)
            .bind(year_end)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!(
                    "Failed to aggregate month {} for location {}: {}",
                    month, location_id, e
                );
                AppError::from(e)
            })?;

        Ok((aggregate.day_count > 0).then_some(aggregate))
    }

    async fn query_locations_with_coverage(
        &self,
        year_start: i32,
        year_end: i32,
        min_days: i64,
    ) -> Result<Vec<LocationCoverage>> {
        info!(
            "Finding locations with at least {} observations in {}-{}",
            min_days, year_start, year_end
        );

        let query = r#"
        SELECT
            l.id AS location_id,
            l.name,
            l.country_code,
            COUNT(*) AS observation_count
        FROM locations l
        JOIN weather_observations o ON o.location_id = l.id
        WHERE EXTRACT(YEAR FROM o.date)::INTEGER BETWEEN $1 AND $2
        GROUP BY l.id, l.name, l.country_code
        HAVING COUNT(*) >= $3
        ORDER BY l.id
        "#;

        let results = sqlx::query_as::<_, LocationCoverage>(query)
            .bind(year_start)
            .bind(year_end)
            .bind(min_days)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to query location coverage: {}", e);
                AppError::from(e)
            })?;

        info!("{} locations meet the coverage threshold", results.len());
        Ok(results)
    }

    async fn query_snapshot_at(
        &self,
        location_id: i64,
        date: SnapshotDate,
    ) -> Result<LocatedObservation> {
        debug!("Resolving snapshot for location {} ({})", location_id, date);

        let (filter, day) = match date {
            SnapshotDate::Latest => ("", None),
            SnapshotDate::On(day) => ("AND o.date = $2", Some(day)),
        };
        let query = format!(
            r#"
            SELECT {}
            FROM weather_observations o
            JOIN locations l ON l.id = o.location_id
            WHERE o.location_id = $1 {}
            ORDER BY o.date DESC
            LIMIT 1
            "#,
            LOCATED_OBSERVATION_COLUMNS, filter
        );

        let mut q = sqlx::query_as::<_, LocatedObservation>(&query).bind(location_id);
        if let Some(day) = day {
            q = q.bind(day);
        }

        let snapshot = q.fetch_optional(&self.pool).await.map_err(|e| {
            error!(
                "Failed to query snapshot for location {}: {}",
                location_id, e
            );
            AppError::from(e)
        })?;

        snapshot.ok_or_else(|| {
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
        // A NULL country array disables the country restriction.
        let query = format!(
            r#"
            SELECT {}
            FROM weather_observations o
            JOIN locations l ON l.id = o.location_id
            WHERE
                o.date = $1
                AND o.location_id <> $2
                AND o.temperature_avg BETWEEN $3 AND $4
                AND ($5::TEXT[] IS NULL OR l.country_code = ANY($5))
            ORDER BY o.location_id
            "#,
            LOCATED_OBSERVATION_COLUMNS
        );

        let countries: Option<Vec<String>> = country_filter.map(|c| c.to_vec());
        let candidates = sqlx::query_as::<_, LocatedObservation>(&query)
            .bind(date)
            .bind(exclude_location_id)
            .bind(temp_range.min)
            .bind(temp_range.max)
            .bind(countries)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to query twin candidates on {}: {}", date, e);
                AppError::from(e)
            })?;

        debug!("Candidate query on {} returned {} rows", date, candidates.len());
        Ok(candidates)
    }
}

/// Upsert for one normal; every derived field is overwritten on conflict.
const UPSERT_NORMAL: &str = r#"
    INSERT INTO climate_normals
    (location_id, month, avg_temp_high, avg_temp_low, record_high, record_low,
     avg_precipitation, avg_humidity, avg_wind_speed, sunny_day_count, rainy_day_count,
     snowy_day_count, source_year_start, source_year_end, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
    ON CONFLICT (location_id, month) DO UPDATE SET
        avg_temp_high = EXCLUDED.avg_temp_high,
        avg_temp_low = EXCLUDED.avg_temp_low,
        record_high = EXCLUDED.record_high,
        record_low = EXCLUDED.record_low,
        avg_precipitation = EXCLUDED.avg_precipitation,
        avg_humidity = EXCLUDED.avg_humidity,
        avg_wind_speed = EXCLUDED.avg_wind_speed,
        sunny_day_count = EXCLUDED.sunny_day_count,
        rainy_day_count = EXCLUDED.rainy_day_count,
        snowy_day_count = EXCLUDED.snowy_day_count,
        source_year_start = EXCLUDED.source_year_start,
        source_year_end = EXCLUDED.source_year_end,
        updated_at = EXCLUDED.updated_at
"#;

fn bind_normal<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    n: &ClimateNormal,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(n.location_id)
        .bind(n.month)
        .bind(n.avg_temp_high)
        .bind(n.avg_temp_low)
        .bind(n.record_high)
        .bind(n.record_low)
        .bind(n.avg_precipitation)
        .bind(n.avg_humidity)
        .bind(n.avg_wind_speed)
        .bind(n.sunny_day_count)
        .bind(n.rainy_day_count)
        .bind(n.snowy_day_count)
        .bind(n.source_year_start)
        .bind(n.source_year_end)
        .bind(n.updated_at)
}

#[async_trait]
impl NormalsStore for Database {
    async fn count_months(&self, location_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM climate_normals WHERE location_id = $1")
                .bind(location_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to count normals for location {}: {}", location_id, e);
                    AppError::from(e)
                })?;
        Ok(count)
    }

    async fn upsert_month(&self, normal: &ClimateNormal) -> Result<()> {
        bind_normal(sqlx::query(UPSERT_NORMAL), normal)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(
                    "Failed to upsert normal for location {} month {}: {}",
                    normal.location_id, normal.month, e
                );
                AppError::from(e)
            })?;
        Ok(())
    }

    /// Upserts the new set and deletes the location's other months in the same transaction.
    async fn replace_months(
        &self,
        location_id: i64,
        normals: &[ClimateNormal],
    ) -> Result<Vec<i32>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin database transaction: {}", e);
            AppError::from(e)
        })?;

        for n in normals {
            bind_normal(sqlx::query(UPSERT_NORMAL), n)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!(
                        "Failed to upsert normal for location {} month {}: {}",
                        n.location_id, n.month, e
                    );
                    AppError::from(e)
                })?;
        }

        let keep: Vec<i32> = normals.iter().map(|n| n.month).collect();
        let mut removed: Vec<i32> = sqlx::query_scalar(
            "DELETE FROM climate_normals WHERE location_id = $1 AND NOT (month = ANY($2)) RETURNING month",
        )
        .bind(location_id)
        .bind(&keep)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            error!(
                "Failed to delete stale normals for location {}: {}",
                location_id, e
            );
            AppError::from(e)
        })?;
        removed.sort_unstable();

        tx.commit().await.map_err(|e| {
            error!("Failed to commit database transaction: {}", e);
            AppError::from(e)
        })?;

        debug!(
            "Replaced normals for location {}: {} written, {} removed",
            location_id,
            normals.len(),
            removed.len()
        );
        Ok(removed)
    }

    async fn normals_for(&self, location_id: i64) -> Result<Vec<ClimateNormal>> {
        let query = r#"
        SELECT
            location_id, month, avg_temp_high, avg_temp_low, record_high, record_low,
            avg_precipitation, avg_humidity, avg_wind_speed, sunny_day_count,
            rainy_day_count, snowy_day_count, source_year_start, source_year_end, updated_at
        FROM climate_normals
        WHERE location_id = $1
        ORDER BY month
        "#;

        sqlx::query_as::<_, ClimateNormal>(query)
            .bind(location_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to fetch normals for location {}: {}", location_id, e);
                AppError::from(e)
            })
    }
}

#[async_trait]
impl ObservationWriter for Database {
    async fn upsert_location(&self, location: &Location) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (id, name, country_code, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                country_code = EXCLUDED.country_code,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude
            "#,
        )
        .bind(location.id)
        .bind(&location.name)
        .bind(&location.country_code)
        .bind(location.latitude)
        .bind(location.longitude)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to upsert location {}: {}", location.id, e);
            AppError::from(e)
        })?;
        Ok(())
    }

    /// Inserts a batch of observations in a single transaction.
    ///
    /// Uses `ON CONFLICT (location_id, date) DO UPDATE` so re-seeding a day replaces it.
    async fn insert_observations(&self, observations: &[Observation]) -> Result<usize> {
        if observations.is_empty() {
            debug!("No observations provided for insertion.");
            return Ok(0);
        }

        info!(
            "Preparing to insert {} observations into database...",
            observations.len()
        );

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin database transaction: {}", e);
            AppError::from(e)
        })?;

        for o in observations {
            sqlx::query(
                r#"
                INSERT INTO weather_observations
                (location_id, date, temperature_high, temperature_low, temperature_avg,
                 precipitation, humidity, wind_speed, cloud_cover, feels_like,
                 weather_condition, weather_description)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (location_id, date) DO UPDATE SET
                    temperature_high = EXCLUDED.temperature_high,
                    temperature_low = EXCLUDED.temperature_low,
                    temperature_avg = EXCLUDED.temperature_avg,
                    precipitation = EXCLUDED.precipitation,
                    humidity = EXCLUDED.humidity,
                    wind_speed = EXCLUDED.wind_speed,
                    cloud_cover = EXCLUDED.cloud_cover,
                    feels_like = EXCLUDED.feels_like,
                    weather_condition = EXCLUDED.weather_condition,
                    weather_description = EXCLUDED.weather_description
                "#,
            )
            .bind(o.location_id)
            .bind(o.date)
            .bind(o.temperature_high)
            .bind(o.temperature_low)
            .bind(o.temperature_avg)
            .bind(o.precipitation)
            .bind(o.humidity)
            .bind(o.wind_speed)
            .bind(o.cloud_cover)
            .bind(o.feels_like)
            .bind(&o.weather_condition)
            .bind(&o.weather_description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(
                    "Failed to insert observation for location {} on {}: {}",
                    o.location_id, o.date, e
                );
                AppError::from(e)
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit database transaction: {}", e);
            AppError::from(e)
        })?;

        info!("Successfully inserted {} observations", observations.len());
        Ok(observations.len())
    }
}

#[async_trait]
impl WeatherStore for Database {
    async fn init_schema(&self) -> Result<()> {
        Database::init_schema(self).await
    }
}

// --- Integration Tests ---
// These tests interact with a real PostgreSQL database.
// They are gated by the `integration-tests` feature flag.
// Run using: `cargo test --features integration-tests`
// Requires a running PostgreSQL instance configured via DATABASE_URL env var.
#[cfg(test)]
#[cfg(feature = "integration-tests")]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};
    use sqlx::PgPool;

    fn location(id: i64, country: &str) -> Location {
        Location {
            id,
            name: format!("Test Location {}", id),
            country_code: country.to_string(),
            latitude: Some(52.0),
            longitude: Some(5.0),
        }
    }

    fn observation(location_id: i64, date: NaiveDate, high: f64, avg: f64) -> Observation {
        let mut o = Observation::empty(location_id, date);
        o.temperature_high = Some(high);
        o.temperature_low = Some(high - 10.0);
        o.temperature_avg = Some(avg);
        o.precipitation = Some(0.0);
        o.humidity = Some(50.0);
        o.wind_speed = Some(5.0);
        o.cloud_cover = Some(20.0);
        o.weather_condition = Some("Clear".to_string());
        o
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    async fn seeded(pool: PgPool) -> Result<Database> {
        let db = Database { pool };
        db.init_schema().await?;
        db.upsert_location(&location(1, "US")).await?;
        db.upsert_location(&location(2, "US")).await?;
        db.upsert_location(&location(3, "GB")).await?;
        db.insert_observations(&[
            observation(1, d(2020, 6, 1), 20.0, 15.0),
            observation(1, d(2020, 6, 2), 22.0, 16.0),
            observation(1, d(2020, 6, 3), 24.0, 17.0),
            observation(2, d(2020, 6, 3), 25.0, 18.0),
            observation(3, d(2020, 6, 3), 26.0, 19.0),
        ])
        .await?;
        Ok(db)
    }

    #[sqlx::test]
    async fn test_init_schema(pool: PgPool) -> Result<()> {
        let db = Database { pool };
        assert!(!db.is_schema_initialized().await?);
        db.init_schema().await?;
        db.init_schema().await?; // Idempotent
        assert!(db.is_schema_initialized().await?);
        Ok(())
    }

    #[sqlx::test]
    async fn test_monthly_aggregate(pool: PgPool) -> Result<()> {
        let db = seeded(pool).await?;

        let agg = db
            .query_monthly_aggregate(1, 6, 2020, 2020)
            .await?
            .expect("June 2020 has data");
        assert_eq!(agg.day_count, 3);
        assert!((agg.avg_temp_high.unwrap() - 22.0).abs() < 1e-9);
        assert_eq!(agg.max_temp_high, Some(24.0));
        assert_eq!(agg.sunny_days, 3);
        assert_eq!(agg.rainy_days, 0);

        assert!(db.query_monthly_aggregate(1, 7, 2020, 2020).await?.is_none());
        assert!(db.query_monthly_aggregate(1, 6, 2021, 2022).await?.is_none());
        Ok(())
    }

    #[sqlx::test]
    async fn test_snapshot_and_candidates(pool: PgPool) -> Result<()> {
        let db = seeded(pool).await?;

        let snap = db.query_snapshot_at(1, SnapshotDate::Latest).await?;
        assert_eq!(snap.observation.date, d(2020, 6, 3));
        assert_eq!(snap.country_code, "US");

        let missing = db.query_snapshot_at(99, SnapshotDate::Latest).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let range = TemperatureRange::around(17.0, 10.0);
        let all = db.query_candidates_at(d(2020, 6, 3), 1, range, None).await?;
        assert_eq!(
            all.iter().map(|c| c.location_id()).collect::<Vec<_>>(),
            vec![2, 3]
        );

        let us = vec!["US".to_string()];
        let local = db
            .query_candidates_at(d(2020, 6, 3), 1, range, Some(&us))
            .await?;
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].location_id(), 2);
        Ok(())
    }

    #[sqlx::test]
    async fn test_normals_upsert_replaces_record(pool: PgPool) -> Result<()> {
        let db = seeded(pool).await?;
        let agg = db.query_monthly_aggregate(1, 6, 2020, 2020).await?.unwrap();

        let first = ClimateNormal::from_aggregate(1, 6, &agg, 2019, 2020, Utc::now());
        db.replace_months(1, &[first]).await?;
        let second = ClimateNormal::from_aggregate(1, 6, &agg, 2020, 2020, Utc::now());
        db.upsert_month(&second).await?;

        assert_eq!(db.count_months(1).await?, 1);
        let stored = db.normals_for(1).await?;
        assert_eq!(stored[0].source_year_start, 2020);
        assert_eq!(stored[0].month, 6);
        assert_eq!(stored[0].updated_at.year(), second.updated_at.year());
        Ok(())
    }

    #[sqlx::test]
    async fn test_replace_months_deletes_unrefreshed_months(pool: PgPool) -> Result<()> {
        let db = seeded(pool).await?;
        let agg = db.query_monthly_aggregate(1, 6, 2020, 2020).await?.unwrap();
        let normal = |month: i32, first: i32| {
            ClimateNormal::from_aggregate(1, month, &agg, first, 2020, Utc::now())
        };
        for month in [5, 6, 7] {
            db.upsert_month(&normal(month, 2019)).await?;
        }

        let removed = db.replace_months(1, &[normal(6, 2020)]).await?;
        assert_eq!(removed, vec![5, 7]);

        let stored = db.normals_for(1).await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].month, 6);
        assert_eq!(stored[0].source_year_start, 2020);
        Ok(())
    }

    #[sqlx::test]
    async fn test_coverage_threshold(pool: PgPool) -> Result<()> {
        let db = seeded(pool).await?;
        let covered = db.query_locations_with_coverage(2020, 2020, 3).await?;
        assert_eq!(covered.len(), 1);
        assert_eq!(covered[0].location_id, 1);
        assert_eq!(covered[0].observation_count, 3);
        Ok(())
    }
}
