//! Weighted multi-feature similarity between two weather snapshots.
//!
//! Each dimension maps an absolute difference onto a 0..=100 sub-score with a linear
//! penalty; the overall score is the rounded weighted sum. Every rule is symmetric in its
//! two arguments, so `similarity(a, b) == similarity(b, a)`.

use crate::models::{ConditionLabel, Observation, SimilarityScores};

pub const TEMPERATURE_WEIGHT: f64 = 0.40;
pub const HUMIDITY_WEIGHT: f64 = 0.20;
pub const PRECIPITATION_WEIGHT: f64 = 0.20;
pub const WIND_WEIGHT: f64 = 0.10;
pub const CONDITIONS_WEIGHT: f64 = 0.10;

/// Score points lost per degree of temperature difference.
const TEMPERATURE_PENALTY: f64 = 5.0;
/// Per percentage point of humidity difference.
const HUMIDITY_PENALTY: f64 = 2.0;
/// Per unit of precipitation difference.
const PRECIPITATION_PENALTY: f64 = 20.0;
/// Per unit of wind speed difference.
const WIND_PENALTY: f64 = 5.0;

fn linear_score(a: f64, b: f64, penalty: f64) -> f64 {
    (100.0 - penalty * (a - b).abs()).max(0.0)
}

pub fn temperature_score(a: f64, b: f64) -> f64 {
    linear_score(a, b, TEMPERATURE_PENALTY)
}

pub fn humidity_score(a: f64, b: f64) -> f64 {
    linear_score(a, b, HUMIDITY_PENALTY)
}

/// Dry versus wet is a hard mismatch; two wet days are compared by amount.
pub fn precipitation_score(a: f64, b: f64) -> f64 {
    match (a == 0.0, b == 0.0) {
        (true, true) => 100.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => linear_score(a, b, PRECIPITATION_PENALTY),
    }
}

pub fn wind_score(a: f64, b: f64) -> f64 {
    linear_score(a, b, WIND_PENALTY)
}

pub fn conditions_score(a: &ConditionLabel, b: &ConditionLabel) -> f64 {
    if a == b {
        100.0
    } else if a.overlaps(b) {
        50.0
    } else {
        0.0
    }
}

/// Scores `candidate` against `reference`. Missing numeric values count as 0.
pub fn similarity(reference: &Observation, candidate: &Observation) -> SimilarityScores {
    let value = |v: Option<f64>| v.unwrap_or(0.0);

    let temperature = temperature_score(
        value(reference.temperature_avg),
        value(candidate.temperature_avg),
    );
    let humidity = humidity_score(value(reference.humidity), value(candidate.humidity));
    let precipitation = precipitation_score(
        value(reference.precipitation),
        value(candidate.precipitation),
    );
    let wind = wind_score(value(reference.wind_speed), value(candidate.wind_speed));
    let conditions = conditions_score(&reference.condition(), &candidate.condition());

    let weighted = TEMPERATURE_WEIGHT * temperature
        + HUMIDITY_WEIGHT * humidity
        + PRECIPITATION_WEIGHT * precipitation
        + WIND_WEIGHT * wind
        + CONDITIONS_WEIGHT * conditions;

    SimilarityScores {
        temperature,
        humidity,
        precipitation,
        wind,
        conditions,
        overall: weighted.round().clamp(0.0, 100.0) as u32,
    }
}
