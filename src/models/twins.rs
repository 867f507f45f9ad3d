//! Query options and result payloads for weather-twin searches.

use super::LocatedObservation;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Countries searched by the `regional` scope.
pub const REGIONAL_COUNTRIES: [&str; 3] = [
    "US", // United States
    "CA", // Canada
    "MX", // Mexico
];

/// Geographic restriction applied to twin candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Same country as the reference location.
    Local,
    /// The fixed `REGIONAL_COUNTRIES` set.
    Regional,
    /// No country filter.
    #[default]
    Global,
}

impl Scope {
    /// Country codes a candidate must belong to, or `None` for no restriction.
    pub fn country_filter(&self, reference_country: &str) -> Option<Vec<String>> {
        match self {
            Scope::Local => Some(vec![reference_country.to_uppercase()]),
            Scope::Regional => Some(REGIONAL_COUNTRIES.iter().map(|c| c.to_string()).collect()),
            Scope::Global => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Local => "local",
            Scope::Regional => "regional",
            Scope::Global => "global",
        };
        f.write_str(name)
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Scope::Local),
            "regional" => Ok(Scope::Regional),
            "global" => Ok(Scope::Global),
            other => Err(format!(
                "unknown scope '{}', expected local, regional or global",
                other
            )),
        }
    }
}

/// Options for `find_twins`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwinOptions {
    pub scope: Scope,
    /// Maximum number of twins returned.
    pub limit: usize,
    /// Minimum overall score, on 0..=100.
    pub min_similarity: u32,
}

impl Default for TwinOptions {
    fn default() -> Self {
        Self {
            scope: Scope::Global,
            limit: 5,
            min_similarity: 80,
        }
    }
}

/// Per-dimension similarity sub-scores and the weighted overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityScores {
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub wind: f64,
    pub conditions: f64,
    /// Weighted sum of the sub-scores, rounded, on 0..=100.
    pub overall: u32,
}

/// A candidate that cleared the similarity floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Twin {
    pub location_id: i64,
    pub location_name: String,
    pub country_code: String,
    pub conditions: LocatedObservation,
    pub scores: SimilarityScores,
}

/// Counts describing how a twin search narrowed its candidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMetadata {
    pub scope: Scope,
    pub date: NaiveDate,
    pub min_similarity: u32,
    pub limit: usize,
    /// Candidates returned by the pre-filter, before scoring.
    pub candidates_considered: usize,
    /// Candidates at or above `min_similarity`, before truncation to `limit`.
    pub candidates_matched: usize,
    pub returned: usize,
}

/// The full result of a twin search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwinsReport {
    pub reference: LocatedObservation,
    pub twins: Vec<Twin>,
    pub metadata: SearchMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("local", Scope::Local)]
    #[case(" Regional", Scope::Regional)]
    #[case("GLOBAL", Scope::Global)]
    fn test_scope_parses(#[case] input: &str, #[case] expected: Scope) {
        assert_eq!(input.parse::<Scope>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_scope_is_rejected() {
        let err = "continental".parse::<Scope>().unwrap_err();
        assert!(err.contains("continental"));
    }

    #[test]
    fn test_country_filters() {
        assert_eq!(
            Scope::Local.country_filter("gb"),
            Some(vec!["GB".to_string()])
        );
        assert_eq!(
            Scope::Regional.country_filter("GB").unwrap(),
            vec!["US", "CA", "MX"]
        );
        assert_eq!(Scope::Global.country_filter("GB"), None);
    }

    #[test]
    fn test_default_options() {
        let options = TwinOptions::default();
        assert_eq!(options.limit, 5);
        assert_eq!(options.min_similarity, 80);
        assert_eq!(options.scope, Scope::Global);
    }
}
