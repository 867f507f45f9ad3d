//! Normalised weather-condition labels.
//!
//! Providers report conditions as free text ("Light Snow", "snow showers", " Clear ").
//! Every comparison the analytics core makes on these labels is case-insensitive, so the
//! label is normalised once on construction and compared as plain lower-case text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A trimmed, lower-cased weather-condition label. A missing label is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionLabel(String);

impl ConditionLabel {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// Normalises an optional provider label, mapping `None` to the empty label.
    pub fn from_option(raw: Option<&str>) -> Self {
        raw.map(Self::new).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive substring check against an arbitrary token.
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(&token.trim().to_lowercase())
    }

    /// `true` when either label is contained in the other.
    ///
    /// The empty label is a substring of everything, so two labels where one is
    /// missing still count as overlapping.
    pub fn overlaps(&self, other: &ConditionLabel) -> bool {
        self.0.contains(other.as_str()) || other.0.contains(self.as_str())
    }
}

impl From<&str> for ConditionLabel {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for ConditionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_is_normalised() {
        let label = ConditionLabel::new("  Light SNOW ");
        assert_eq!(label.as_str(), "light snow");
        assert_eq!(label, ConditionLabel::from("light snow"));
    }

    #[test]
    fn test_contains_ignores_case() {
        let label = ConditionLabel::new("Heavy Snow Showers");
        assert!(label.contains("snow"));
        assert!(label.contains("SNOW"));
        assert!(!label.contains("rain"));
    }

    #[test]
    fn test_missing_label_is_empty() {
        let label = ConditionLabel::from_option(None);
        assert!(label.is_empty());
        assert_eq!(label.to_string(), "");
    }

    #[test]
    fn test_overlaps_in_either_direction() {
        let rain = ConditionLabel::new("Rain");
        let light_rain = ConditionLabel::new("Light rain");
        assert!(rain.overlaps(&light_rain));
        assert!(light_rain.overlaps(&rain));
        assert!(!rain.overlaps(&ConditionLabel::new("Clear")));
    }
}
