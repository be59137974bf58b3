/// Rise, peak and jump detection.
///
/// # Detection process
///
/// 1. **Candidate peaks**: strict local maxima of the raw series.
/// 2. **Rise threshold**: mean height of the candidate peaks above the
///    baseline, divided by `height_divisor`.
/// 3. **Rise-onsets**: a climb larger than the threshold is confirmed on the
///    sample where it lands, then back-dated one sample to where it began.
/// 4. **Local maxima**: from each rise-onset, the first decline is
///    confirmed on the sample that drops, then back-dated to the top sample.
/// 5. **Jump points**: see `jumps::derive_jump_points`.
///
/// Steps 3 and 4 share the same confirm-then-backdate transform so the
/// alignment lives in one place.

use serde::Serialize;
use tracing::{debug, warn};

use crate::analysis::baseline::BaselineEstimate;
use crate::analysis::jumps::derive_jump_points;
use crate::model::{Event, EventKind, Result, Sample, ScoreError, SeriesId, TimeSeries};

// ---------------------------------------------------------------------------
// Annotated series
// ---------------------------------------------------------------------------

/// A series together with its per-sample event flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedSeries {
    pub id: SeriesId,
    pub samples: Vec<Sample>,
    /// Every detected rise-onset, before jump derivation.
    pub rise_onsets: Vec<bool>,
    /// Rise-onsets not consumed as jump points.
    pub rise: Vec<bool>,
    pub local_max: Vec<bool>,
    pub jump_point: Vec<bool>,
    pub baseline: BaselineEstimate,
    pub rise_threshold: f64,
}

impl AnnotatedSeries {
    /// Events of one kind in chronological order.
    pub fn events(&self, kind: EventKind) -> Vec<Event> {
        let flags = match kind {
            EventKind::Rise => &self.rise,
            EventKind::Peak => &self.local_max,
            EventKind::Jump => &self.jump_point,
        };
        self.samples
            .iter()
            .zip(flags)
            .filter(|&(_, &flagged)| flagged)
            .map(|(s, _)| Event::new(s.date, s.value, kind))
            .collect()
    }

    pub fn peaks(&self) -> Vec<Event> {
        self.events(EventKind::Peak)
    }

    pub fn jumps(&self) -> Vec<Event> {
        self.events(EventKind::Jump)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Detection steps
// ---------------------------------------------------------------------------

/// Indices strictly greater than both neighbours. Plateaus and endpoints
/// are never peaks.
pub fn find_candidate_peaks(values: &[f64]) -> Vec<usize> {
    values
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2])
        .map(|(i, _)| i + 1)
        .collect()
}

/// Mean peak height above `baseline`, divided by `height_divisor`.
///
/// Returns `None` when there are no peaks.
pub fn rise_threshold(values: &[f64], peaks: &[usize], baseline: f64, height_divisor: f64) -> Option<f64> {
    if peaks.is_empty() {
        return None;
    }
    let mean_height = peaks.iter().map(|&i| values[i] - baseline).sum::<f64>() / peaks.len() as f64;
    Some(mean_height / height_divisor)
}

/// Moves every flag one sample earlier.
///
/// A condition confirmed at sample `i` is reported at `i - 1`; a flag on the
/// first sample is dropped and the last sample is always clear.
pub fn confirm_then_backdate(confirmed: &[bool]) -> Vec<bool> {
    let mut out = vec![false; confirmed.len()];
    for i in 1..confirmed.len() {
        out[i - 1] = confirmed[i];
    }
    out
}

/// Samples where the climb from the previous sample exceeds `threshold`.
fn rise_confirmations(values: &[f64], threshold: f64) -> Vec<bool> {
    let mut confirmed = vec![false; values.len()];
    for i in 1..values.len() {
        confirmed[i] = values[i] - values[i - 1] > threshold;
    }
    confirmed
}

/// For each rise-onset, the first later sample lower than its predecessor.
fn decline_confirmations(values: &[f64], rise_onsets: &[bool]) -> Vec<bool> {
    let mut confirmed = vec![false; values.len()];
    for (i, _) in rise_onsets.iter().enumerate().filter(|&(_, &r)| r) {
        if let Some(j) = (i + 1..values.len()).find(|&j| values[j] - values[j - 1] < 0.0) {
            confirmed[j] = true;
        }
    }
    confirmed
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Annotates `series` with rise, local-max and jump flags.
///
/// # Errors
/// - `InvalidParameter` for fewer than two samples, a non-positive or
///   non-finite `height_divisor`, or a non-finite baseline level.
/// - `NoCandidatePeaks` when the series has no strict local maximum.
pub fn extract_events(
    series: &TimeSeries,
    baseline: BaselineEstimate,
    height_divisor: f64,
) -> Result<AnnotatedSeries> {
    series.require_differencable()?;
    if !height_divisor.is_finite() || height_divisor <= 0.0 {
        return Err(ScoreError::InvalidParameter(format!(
            "height_divisor must be positive, got {}",
            height_divisor
        )));
    }
    if !baseline.level.is_finite() {
        return Err(ScoreError::InvalidParameter(format!(
            "baseline level for '{}' is not finite",
            series.id()
        )));
    }

    let values = series.values();
    let peaks = find_candidate_peaks(&values);
    let threshold = rise_threshold(&values, &peaks, baseline.level, height_divisor).ok_or_else(|| {
        ScoreError::NoCandidatePeaks {
            series: series.id().to_string(),
        }
    })?;

    if threshold <= 0.0 {
        warn!(
            series = %series.id(),
            threshold,
            baseline = baseline.level,
            "rise threshold is not positive; baseline sits above the mean peak"
        );
    }
    debug!(
        series = %series.id(),
        baseline = baseline.level,
        threshold,
        candidate_peaks = peaks.len(),
        "rise threshold computed"
    );

    let rise_onsets = confirm_then_backdate(&rise_confirmations(&values, threshold));
    let local_max = confirm_then_backdate(&decline_confirmations(&values, &rise_onsets));
    let (jump_point, rise) = derive_jump_points(&rise_onsets, &local_max)?;

    Ok(AnnotatedSeries {
        id: series.id().clone(),
        samples: series.samples().to_vec(),
        rise_onsets,
        rise,
        local_max,
        jump_point,
        baseline,
        rise_threshold: threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::baseline::BaselineSource;
    use crate::model::day;

    fn series(values: &[f64]) -> TimeSeries {
        let dates: Vec<_> = (0..values.len() as i64).map(day).collect();
        TimeSeries::from_pairs("WL", &dates, values).unwrap()
    }

    fn baseline(level: f64) -> BaselineEstimate {
        BaselineEstimate {
            level,
            source: BaselineSource::StablePeriods { sample_count: 6 },
        }
    }

    fn indices(m: &[bool]) -> Vec<usize> {
        m.iter().enumerate().filter(|&(_, &b)| b).map(|(i, _)| i).collect()
    }

    /// Flat at 1.0, two excursions topping out at indices 5 and 13.
    fn two_excursions() -> Vec<f64> {
        vec![
            1.0, 1.0, 1.0, 1.5, 2.0, 2.2, 1.8, 1.4, 1.2, 1.0, 1.0, 1.6, 2.3, 2.4, 1.9, 1.5, 1.2,
        ]
    }

    // --- Building blocks -----------------------------------------------------

    #[test]
    fn test_candidate_peaks_are_strict() {
        let values = [1.0, 3.0, 2.0, 2.0, 4.0, 4.0, 1.0, 5.0];
        // Index 1 is strict; 4/5 is a plateau; index 7 is an endpoint
        assert_eq!(find_candidate_peaks(&values), vec![1]);
    }

    #[test]
    fn test_rise_threshold_uses_mean_peak_height() {
        let values = [0.0, 3.0, 0.0, 5.0, 0.0];
        let t = rise_threshold(&values, &[1, 3], 1.0, 2.0).unwrap();
        // Heights 2.0 and 4.0, mean 3.0, halved
        assert_eq!(t, 1.5);
        assert_eq!(rise_threshold(&values, &[], 1.0, 2.0), None);
    }

    #[test]
    fn test_confirm_then_backdate_shifts_one_sample_earlier() {
        let confirmed = [true, false, true, false, true];
        assert_eq!(
            confirm_then_backdate(&confirmed),
            vec![false, true, false, true, false]
        );
    }

    #[test]
    fn test_confirm_then_backdate_never_flags_last_sample() {
        let out = confirm_then_backdate(&[true, true, true]);
        assert!(!out[2]);
    }

    // --- Extraction ----------------------------------------------------------

    #[test]
    fn test_extract_two_excursions() {
        let s = series(&two_excursions());
        let annotated = extract_events(&s, baseline(1.0), 2.0).unwrap();

        // Peaks 2.2 and 2.4 over baseline 1.0: mean 1.3, halved = 0.65
        assert!((annotated.rise_threshold - 0.65).abs() < 1e-12);

        // Only 1.6->2.3 (11->12) climbs more than 0.65; the first excursion
        // rises in 0.5 steps and is missed
        assert_eq!(indices(&annotated.rise_onsets), vec![11]);
        assert_eq!(indices(&annotated.local_max), vec![13]);
        assert_eq!(indices(&annotated.jump_point), vec![11]);
        assert!(indices(&annotated.rise).is_empty());
    }

    #[test]
    fn test_lower_threshold_catches_both_excursions() {
        let s = series(&two_excursions());
        let annotated = extract_events(&s, baseline(1.0), 4.0).unwrap();

        // Threshold 0.325: climbs of 0.5 at 2->3, 3->4 and 0.6/0.7 at 10->11, 11->12
        assert_eq!(indices(&annotated.rise_onsets), vec![2, 3, 10, 11]);
        assert_eq!(indices(&annotated.local_max), vec![5, 13]);
        assert_eq!(indices(&annotated.jump_point), vec![2, 10]);
        assert_eq!(annotated.peaks().len(), 2);
        assert_eq!(annotated.peaks()[0].value, 2.2);
        assert_eq!(annotated.jumps()[1].date, day(10));
    }

    #[test]
    fn test_every_local_max_follows_a_rise() {
        let s = series(&[
            0.0, 0.1, 0.9, 1.8, 1.2, 0.4, 0.3, 1.1, 1.0, 2.0, 2.5, 1.0, 0.2, 0.9, 0.1,
        ]);
        let annotated = extract_events(&s, baseline(0.0), 3.0).unwrap();
        assert!(!indices(&annotated.local_max).is_empty());
        for m in indices(&annotated.local_max) {
            assert!(
                annotated.rise_onsets[..m].iter().any(|&r| r),
                "local max at {} has no earlier rise",
                m
            );
        }
    }

    #[test]
    fn test_rise_running_to_series_end_has_no_local_max() {
        let s = series(&[1.0, 2.0, 1.0, 1.0, 1.5, 2.5]);
        let annotated = extract_events(&s, baseline(1.0), 2.0).unwrap();
        // Threshold 0.5: climbs at 0->1 and 4->5; the first has a decline, the second never does
        assert_eq!(indices(&annotated.rise_onsets), vec![0, 4]);
        assert_eq!(indices(&annotated.local_max), vec![1]);
    }

    #[test]
    fn test_no_candidate_peaks_fails() {
        let s = series(&[1.0, 2.0, 3.0, 4.0]);
        let result = extract_events(&s, baseline(1.0), 2.0);
        assert_eq!(
            result,
            Err(ScoreError::NoCandidatePeaks {
                series: "WL".to_string()
            })
        );
    }

    #[test]
    fn test_zero_height_divisor_is_invalid() {
        let s = series(&two_excursions());
        assert!(matches!(
            extract_events(&s, baseline(1.0), 0.0),
            Err(ScoreError::InvalidParameter(_))
        ));
        assert!(matches!(
            extract_events(&s, baseline(1.0), -2.0),
            Err(ScoreError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_non_finite_baseline_is_invalid() {
        let s = series(&two_excursions());
        assert!(matches!(
            extract_events(&s, baseline(f64::NAN), 2.0),
            Err(ScoreError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_input_series_is_not_modified() {
        let s = series(&two_excursions());
        let before = s.clone();
        let _ = extract_events(&s, baseline(1.0), 2.0).unwrap();
        assert_eq!(s, before);
    }
}
