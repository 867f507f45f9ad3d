//! Provides a mock observation provider for generating plausible daily weather.
//!
//! Each mock site has a simple climate (annual mean, seasonal swing, humidity, wet-day
//! frequency). Daily values follow a seasonal cosine plus noise from a `StdRng` seeded per
//! location, so the same provider seed always yields the same history.

use crate::models::{Location, Observation};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use tracing::debug;

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 42;

/// Day of year with the warmest expected temperature in the northern hemisphere.
const WARMEST_DAY_OF_YEAR: f64 = 200.0;

/// A mock site and the climate its observations are drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct MockSite {
    pub id: i64,
    pub name: &'static str,
    pub country_code: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    /// Annual mean of the daily average temperature, °C.
    pub mean_temp: f64,
    /// Half the difference between the warmest and coldest seasonal means, °C.
    pub seasonal_swing: f64,
    /// Typical relative humidity on a dry day, %.
    pub base_humidity: f64,
    /// Probability that a given day has precipitation.
    pub wet_day_chance: f64,
}

impl MockSite {
    pub fn location(&self) -> Location {
        Location {
            id: self.id,
            name: self.name.to_string(),
            country_code: self.country_code.to_string(),
            latitude: Some(self.latitude),
            longitude: Some(self.longitude),
        }
    }

    /// Seasonal mean temperature on `date`; the season is inverted south of the equator.
    fn seasonal_temp(&self, date: NaiveDate) -> f64 {
        let phase = 2.0 * PI * (date.ordinal() as f64 - WARMEST_DAY_OF_YEAR) / 365.25;
        let hemisphere = if self.latitude < 0.0 { -1.0 } else { 1.0 };
        self.mean_temp + hemisphere * self.seasonal_swing * phase.cos()
    }
}

#[rustfmt::skip]
const SITES: [MockSite; 22] = [
    site(1, "New York", "US", 40.7128, -74.0060, 13.0, 12.0, 62.0, 0.33),
    site(2, "Chicago", "US", 41.8781, -87.6298, 10.5, 14.5, 66.0, 0.32),
    site(3, "Los Angeles", "US", 34.0522, -118.2437, 18.5, 4.5, 60.0, 0.10),
    site(4, "Miami", "US", 25.7617, -80.1918, 25.5, 3.5, 74.0, 0.38),
    site(5, "Denver", "US", 39.7392, -104.9903, 10.5, 12.0, 45.0, 0.24),
    site(6, "Seattle", "US", 47.6062, -122.3321, 11.5, 7.5, 72.0, 0.42),
    site(7, "Toronto", "CA", 43.6532, -79.3832, 9.0, 14.0, 68.0, 0.36),
    site(8, "Vancouver", "CA", 49.2827, -123.1207, 10.5, 7.0, 76.0, 0.45),
    site(9, "Montreal", "CA", 45.5019, -73.5674, 7.0, 16.0, 70.0, 0.38),
    site(10, "Mexico City", "MX", 19.4326, -99.1332, 17.0, 2.5, 55.0, 0.35),
    site(11, "Monterrey", "MX", 25.6866, -100.3161, 22.5, 7.0, 60.0, 0.18),
    site(12, "London", "GB", 51.5074, -0.1278, 11.5, 6.5, 76.0, 0.42),
    site(13, "Edinburgh", "GB", 55.9533, -3.1883, 9.0, 5.5, 80.0, 0.48),
    site(14, "Berlin", "DE", 52.5200, 13.4050, 10.0, 9.5, 72.0, 0.34),
    site(15, "Munich", "DE", 48.1351, 11.5820, 9.0, 9.5, 74.0, 0.38),
    site(16, "Paris", "FR", 48.8566, 2.3522, 12.5, 8.0, 72.0, 0.32),
    site(17, "Marseille", "FR", 43.2965, 5.3698, 15.5, 8.5, 62.0, 0.18),
    site(18, "Madrid", "ES", 40.4168, -3.7038, 15.0, 10.0, 55.0, 0.17),
    site(19, "Barcelona", "ES", 41.3851, 2.1734, 16.5, 7.5, 68.0, 0.20),
    site(20, "Karachi", "PK", 24.8607, 67.0011, 26.5, 5.0, 62.0, 0.05),
    site(21, "Lahore", "PK", 31.5204, 74.3587, 24.5, 9.5, 55.0, 0.15),
    site(22, "Sydney", "AU", -33.8688, 151.2093, 18.5, 4.5, 68.0, 0.30),
];

#[allow(clippy::too_many_arguments)]
const fn site(
    id: i64,
    name: &'static str,
    country_code: &'static str,
    latitude: f64,
    longitude: f64,
    mean_temp: f64,
    seasonal_swing: f64,
    base_humidity: f64,
    wet_day_chance: f64,
) -> MockSite {
    MockSite {
        id,
        name,
        country_code,
        latitude,
        longitude,
        mean_temp,
        seasonal_swing,
        base_humidity,
        wet_day_chance,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Generates deterministic daily observations for the mock sites.
#[derive(Debug, Clone)]
pub struct MockObservationProvider {
    seed: u64,
}

impl Default for MockObservationProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl MockObservationProvider {
    pub fn new(seed: u64) -> Self {
        debug!("Creating MockObservationProvider with seed {}", seed);
        Self { seed }
    }

    /// All mock sites, ordered by id.
    pub fn sites(&self) -> &'static [MockSite] {
        &SITES
    }

    /// One observation per day in `start..=end` for `site`. Empty if the range is inverted.
    pub fn observations_for(
        &self,
        site: &MockSite,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Observation> {
        let mut rng =
            StdRng::seed_from_u64(self.seed ^ (site.id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let observations: Vec<Observation> = start
            .iter_days()
            .take_while(|date| *date <= end)
            .map(|date| self.generate_day(site, date, &mut rng))
            .collect();
        debug!(
            "Generated {} mock observations for {} ({} to {})",
            observations.len(),
            site.name,
            start,
            end
        );
        observations
    }

    fn generate_day(&self, site: &MockSite, date: NaiveDate, rng: &mut impl Rng) -> Observation {
        let avg = site.seasonal_temp(date) + rng.gen_range(-3.5..3.5);
        let spread = rng.gen_range(4.0..11.0);
        let wet = rng.gen_bool(site.wet_day_chance);

        let precipitation = if wet { rng.gen_range(0.2..18.0) } else { 0.0 };
        let cloud_cover: f64 = if wet {
            rng.gen_range(65.0..100.0)
        } else {
            rng.gen_range(0.0..75.0)
        };
        let humidity = (site.base_humidity + if wet { 15.0 } else { 0.0 } + rng.gen_range(-10.0..10.0))
            .clamp(10.0, 100.0);
        let wind_speed: f64 = rng.gen_range(0.0..28.0);

        let condition = match (wet, avg) {
            (true, t) if t <= 1.0 => "Snow",
            (true, _) if precipitation >= 5.0 => "Rain",
            (true, _) => "Light rain",
            (false, _) if cloud_cover < 30.0 => "Clear",
            (false, _) if cloud_cover < 60.0 => "Partly cloudy",
            (false, _) => "Cloudy",
        };

        let high = avg + spread / 2.0;
        let low = avg - spread / 2.0;
        Observation {
            location_id: site.id,
            date,
            temperature_high: Some(round1(high)),
            temperature_low: Some(round1(low)),
            temperature_avg: Some(round1(avg)),
            precipitation: Some(round1(precipitation)),
            humidity: Some(round1(humidity)),
            wind_speed: Some(round1(wind_speed)),
            cloud_cover: Some(cloud_cover.round()),
            feels_like: Some(round1(avg - wind_speed * 0.1)),
            weather_condition: Some(condition.to_string()),
            weather_description: Some(format!(
                "{} with a high of {:.0}°C in {}",
                condition, high, site.name
            )),
        }
    }
}
