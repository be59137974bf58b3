/// Shared data types for event extraction and scoring.
///
/// Every series carries an explicit `SeriesId` so flags, events and report
/// columns can be tied back to the series they came from without any
/// column-name conventions.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the baseline, extraction and matching stages.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    /// No stable run was found and the configured fallback refuses to
    /// substitute the series minimum.
    #[error("no stable period found in series '{series}'")]
    BaselineUnstable { series: String },

    /// A parameter or input shape makes the computation undefined.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The series has no strict local maximum, so no rise threshold exists.
    #[error("series '{series}' has no candidate peaks; rise threshold is undefined")]
    NoCandidatePeaks { series: String },

    /// Timestamps out of order, duplicated, or values not finite.
    #[error("invalid series: {0}")]
    InvalidSeries(String),

    /// A batch worker stopped before reporting a result for this series.
    #[error("scoring job for series '{series}' did not complete")]
    JobAborted { series: String },
}

pub type Result<T> = std::result::Result<T, ScoreError>;

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Explicit handle naming a series (usually its CSV column header).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SeriesId(String);

impl SeriesId {
    pub fn new(id: impl Into<String>) -> Self {
        SeriesId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeriesId {
    fn from(id: &str) -> Self {
        SeriesId::new(id)
    }
}

impl From<String> for SeriesId {
    fn from(id: String) -> Self {
        SeriesId(id)
    }
}

/// One dated observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub date: NaiveDate,
    pub value: f64,
}

/// A validated, time-ordered series.
///
/// Construction through `TimeSeries::new` guarantees strictly increasing
/// dates and finite values; nothing mutates a series afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    id: SeriesId,
    samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new(id: impl Into<SeriesId>, samples: Vec<Sample>) -> Result<Self> {
        let id = id.into();

        for (i, sample) in samples.iter().enumerate() {
            if !sample.value.is_finite() {
                return Err(ScoreError::InvalidSeries(format!(
                    "{}: non-finite value at {}",
                    id, sample.date
                )));
            }
            if i > 0 && sample.date <= samples[i - 1].date {
                return Err(ScoreError::InvalidSeries(format!(
                    "{}: date {} does not follow {}",
                    id,
                    sample.date,
                    samples[i - 1].date
                )));
            }
        }

        Ok(TimeSeries { id, samples })
    }

    /// Convenience constructor from parallel date/value slices.
    pub fn from_pairs(
        id: impl Into<SeriesId>,
        dates: &[NaiveDate],
        values: &[f64],
    ) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ScoreError::InvalidParameter(format!(
                "{} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        let samples = dates
            .iter()
            .zip(values)
            .map(|(&date, &value)| Sample { date, value })
            .collect();
        TimeSeries::new(id, samples)
    }

    pub fn id(&self) -> &SeriesId {
        &self.id
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Fails with `InvalidParameter` when differencing is undefined.
    pub(crate) fn require_differencable(&self) -> Result<()> {
        if self.samples.len() < 2 {
            return Err(ScoreError::InvalidParameter(format!(
                "series '{}' has {} sample(s); at least 2 are required",
                self.id,
                self.samples.len()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Rise,
    Peak,
    Jump,
}

/// A flagged sample lifted out of an annotated series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Event {
    pub date: NaiveDate,
    pub value: f64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(date: NaiveDate, value: f64, kind: EventKind) -> Self {
        Event { date, value, kind }
    }

    /// Absolute gap in whole days.
    pub fn days_from(&self, other: NaiveDate) -> i64 {
        (self.date - other).num_days().abs()
    }
}

// ---------------------------------------------------------------------------
// Matching output
// ---------------------------------------------------------------------------

/// One row of a matching result.
///
/// `primary` is `None` only for penalty rows created for spurious secondary
/// events; `secondary` is `None` for unmatched primary events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchRecord {
    pub primary: Option<NaiveDate>,
    pub secondary: Option<NaiveDate>,
    pub difference: f64,
}

impl MatchRecord {
    pub fn is_matched(&self) -> bool {
        self.primary.is_some() && self.secondary.is_some()
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
pub(crate) fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let result = TimeSeries::from_pairs("WL", &[day(0), day(1), day(1)], &[1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(ScoreError::InvalidSeries(_))));
    }

    #[test]
    fn test_series_rejects_decreasing_dates() {
        let result = TimeSeries::from_pairs("WL", &[day(2), day(1)], &[1.0, 2.0]);
        assert!(matches!(result, Err(ScoreError::InvalidSeries(_))));
    }

    #[test]
    fn test_series_rejects_nan_values() {
        let result = TimeSeries::from_pairs("WL", &[day(0), day(1)], &[1.0, f64::NAN]);
        assert!(matches!(result, Err(ScoreError::InvalidSeries(_))));
    }

    #[test]
    fn test_series_rejects_length_mismatch() {
        let result = TimeSeries::from_pairs("WL", &[day(0), day(1)], &[1.0]);
        assert!(matches!(result, Err(ScoreError::InvalidParameter(_))));
    }

    #[test]
    fn test_single_sample_is_not_differencable() {
        let series = TimeSeries::from_pairs("WL", &[day(0)], &[1.0]).unwrap();
        assert!(series.require_differencable().is_err());
    }

    #[test]
    fn test_event_day_gap_is_symmetric() {
        let event = Event::new(day(10), 1.0, EventKind::Peak);
        assert_eq!(event.days_from(day(7)), 3);
        assert_eq!(event.days_from(day(13)), 3);
    }

    #[test]
    fn test_mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }
}
