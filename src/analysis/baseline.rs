/// Baseline (resting level) estimation.
///
/// The baseline is the pooled mean of every sample that belongs to a long
/// enough run of near-flat readings. Rises are measured from this level, so
/// a series with no flat stretch at all cannot produce a trustworthy value;
/// what happens then is decided by `BaselineFallback`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Result, ScoreError, TimeSeries};

/// Default maximum step between consecutive samples for them to count as stable.
pub const DEFAULT_STABLE_THRESHOLD: f64 = 0.05;

/// Default minimum number of consecutive stable samples in a qualifying run.
pub const DEFAULT_MIN_STABLE_LENGTH: usize = 6;

/// What to do when no qualifying stable run exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineFallback {
    /// Use the lowest value of the series and flag the estimate.
    #[default]
    SeriesMinimum,
    /// Fail with `ScoreError::BaselineUnstable`.
    Reject,
}

/// Where a baseline level came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BaselineSource {
    /// Pooled mean over `sample_count` samples in qualifying stable runs.
    StablePeriods { sample_count: usize },
    /// No stable run qualified; the series minimum was substituted.
    SeriesMinimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaselineEstimate {
    pub level: f64,
    pub source: BaselineSource,
}

impl BaselineEstimate {
    /// True when the level is the series minimum rather than a stable mean.
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, BaselineSource::SeriesMinimum)
    }
}

/// Indices of every sample inside a run of at least `min_stable_length`
/// consecutive stable samples.
///
/// Sample `i` is stable when `|v[i] - v[i-1]| < threshold`. The first sample
/// has no predecessor and never counts.
pub fn stable_indices(values: &[f64], threshold: f64, min_stable_length: usize) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut run_start: Option<usize> = None;

    for i in 0..values.len() {
        let stable = i > 0 && (values[i] - values[i - 1]).abs() < threshold;

        if stable {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            if i - start >= min_stable_length {
                indices.extend(start..i);
            }
        }
    }

    // A run still open at the end of the series
    if let Some(start) = run_start {
        if values.len() - start >= min_stable_length {
            indices.extend(start..values.len());
        }
    }

    indices
}

/// Estimates the resting level of `series`.
///
/// # Errors
/// - `InvalidParameter` for fewer than two samples, a non-positive or
///   non-finite `threshold`, or a zero `min_stable_length`.
/// - `BaselineUnstable` when no run qualifies and `fallback` is `Reject`.
pub fn estimate_baseline(
    series: &TimeSeries,
    threshold: f64,
    min_stable_length: usize,
    fallback: BaselineFallback,
) -> Result<BaselineEstimate> {
    series.require_differencable()?;
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(ScoreError::InvalidParameter(format!(
            "stable threshold must be positive, got {}",
            threshold
        )));
    }
    if min_stable_length == 0 {
        return Err(ScoreError::InvalidParameter(
            "min_stable_length must be at least 1".to_string(),
        ));
    }

    let values = series.values();
    let indices = stable_indices(&values, threshold, min_stable_length);

    if !indices.is_empty() {
        let level = indices.iter().map(|&i| values[i]).sum::<f64>() / indices.len() as f64;
        debug!(series = %series.id(), level, samples = indices.len(), "baseline from stable periods");
        return Ok(BaselineEstimate {
            level,
            source: BaselineSource::StablePeriods {
                sample_count: indices.len(),
            },
        });
    }

    match fallback {
        BaselineFallback::SeriesMinimum => {
            let level = values.iter().copied().fold(f64::INFINITY, f64::min);
            warn!(
                series = %series.id(),
                level,
                "no stable period detected, lowest point used as baseline"
            );
            Ok(BaselineEstimate {
                level,
                source: BaselineSource::SeriesMinimum,
            })
        }
        BaselineFallback::Reject => Err(ScoreError::BaselineUnstable {
            series: series.id().to_string(),
        }),
    }
}
