//! Observation, feature and temporal filter types.
//!
//! These are the minimal shapes the dispatch pipeline and the reference
//! backend need; the full O&M and SensorML information models are not
//! represented.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default value reference for temporal filters.
pub const PHENOMENON_TIME: &str = "om:phenomenonTime";

/// A single observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Identifier assigned by the service on insertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    pub procedure: String,

    pub observed_property: String,

    pub feature_of_interest: String,

    pub phenomenon_time: DateTime<Utc>,

    pub result: ObservationValue,
}

/// Observation result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    /// Numeric value with unit of measure.
    Measure { value: f64, uom: String },
    /// Free text or category value.
    Text(String),
}

impl fmt::Display for ObservationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationValue::Measure { value, .. } => write!(f, "{}", value),
            ObservationValue::Text(text) => f.write_str(text),
        }
    }
}

/// WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

/// Feature of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Point>,
}

impl Feature {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: None,
            geometry: None,
        }
    }
}

/// Error parsing a temporal filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalFilterError {
    #[error("invalid time position '{0}'")]
    InvalidTime(String),

    #[error("period begin {begin} is after end {end}")]
    InvertedPeriod { begin: String, end: String },

    #[error("empty temporal filter")]
    Empty,
}

/// Temporal filter on a time-valued property, either an instant or a
/// closed period.
///
/// KVP form: `om:phenomenonTime,2024-01-01T00:00:00Z/2024-01-02T00:00:00Z`.
/// The value reference may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemporalFilter {
    pub value_reference: String,
    pub begin: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TemporalFilter {
    pub fn instant(time: DateTime<Utc>) -> Self {
        Self {
            value_reference: PHENOMENON_TIME.to_string(),
            begin: time,
            end: None,
        }
    }

    pub fn period(begin: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TemporalFilterError> {
        if begin > end {
            return Err(TemporalFilterError::InvertedPeriod {
                begin: format_time(&begin),
                end: format_time(&end),
            });
        }
        Ok(Self {
            value_reference: PHENOMENON_TIME.to_string(),
            begin,
            end: Some(end),
        })
    }

    pub fn with_value_reference(mut self, value_reference: impl Into<String>) -> Self {
        self.value_reference = value_reference.into();
        self
    }

    /// Whether `time` lies within the filter (inclusive bounds).
    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        match &self.end {
            Some(end) => *time >= self.begin && time <= end,
            None => *time == self.begin,
        }
    }
}

pub(crate) fn parse_time(value: &str) -> Result<DateTime<Utc>, TemporalFilterError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| TemporalFilterError::InvalidTime(value.trim().to_string()))
}

pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl FromStr for TemporalFilter {
    type Err = TemporalFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TemporalFilterError::Empty);
        }

        // Value reference is optional
        let (value_reference, range) = match s.split_once(',') {
            Some((reference, range)) => (reference.trim(), range),
            None => (PHENOMENON_TIME, s),
        };

        let filter = match range.split_once('/') {
            Some((begin, end)) => TemporalFilter::period(parse_time(begin)?, parse_time(end)?)?,
            None => TemporalFilter::instant(parse_time(range)?),
        };
        Ok(filter.with_value_reference(value_reference))
    }
}

impl fmt::Display for TemporalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.value_reference, format_time(&self.begin))?;
        if let Some(end) = &self.end {
            write!(f, "/{}", format_time(end))?;
        }
        Ok(())
    }
}

impl TryFrom<String> for TemporalFilter {
    type Error = TemporalFilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TemporalFilter> for String {
    fn from(filter: TemporalFilter) -> Self {
        filter.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_period() {
        let filter: TemporalFilter = "om:phenomenonTime,2024-01-01T00:00:00Z/2024-01-02T00:00:00Z"
            .parse()
            .unwrap();
        assert_eq!(filter.value_reference, "om:phenomenonTime");
        assert_eq!(filter.begin, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(filter.end, Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_instant_without_reference() {
        let filter: TemporalFilter = "2024-06-01T12:00:00Z".parse().unwrap();
        assert_eq!(filter.value_reference, PHENOMENON_TIME);
        assert!(filter.end.is_none());
        assert!(filter.contains(&Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
    }

    #[test]
    fn test_inverted_period_rejected() {
        let err = "2024-01-02T00:00:00Z/2024-01-01T00:00:00Z"
            .parse::<TemporalFilter>()
            .unwrap_err();
        assert!(matches!(err, TemporalFilterError::InvertedPeriod { .. }));
    }

    #[test]
    fn test_invalid_time_rejected() {
        let err = "om:phenomenonTime,yesterday".parse::<TemporalFilter>().unwrap_err();
        assert_eq!(err, TemporalFilterError::InvalidTime("yesterday".to_string()));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let begin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let filter = TemporalFilter::period(begin, end).unwrap();
        assert!(filter.contains(&begin));
        assert!(filter.contains(&end));
        assert!(!filter.contains(&Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_observation_value_untagged() {
        let measure: ObservationValue =
            serde_json::from_str(r#"{"value": 21.5, "uom": "Cel"}"#).unwrap();
        assert_eq!(
            measure,
            ObservationValue::Measure {
                value: 21.5,
                uom: "Cel".to_string()
            }
        );

        let text: ObservationValue = serde_json::from_str(r#""cloudy""#).unwrap();
        assert_eq!(text, ObservationValue::Text("cloudy".to_string()));
    }

    #[test]
    fn test_filter_serializes_as_string() {
        let filter: TemporalFilter = "2024-06-01T12:00:00Z".parse().unwrap();
        let json = serde_json::to_string(&filter).unwrap();
        assert_eq!(json, r#""om:phenomenonTime,2024-06-01T12:00:00Z""#);
    }
}
