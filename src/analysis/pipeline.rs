/// End-to-end evaluation of predicted series against an observed series.
///
/// `annotate` runs baseline estimation, event extraction and jump
/// derivation for one series. `evaluate` annotates an (observed, predicted)
/// pair and computes both scores; a failure to annotate either series aborts
/// that evaluation, while the magnitude and timing scores are kept as
/// independent results so one cannot hide the other.
///
/// `evaluate_batch` scores many predictions against one observed series on a
/// worker pool. Each job owns its claim sets, so running them in parallel
/// gives exactly the results a sequential loop would.

use std::sync::Arc;
use std::sync::mpsc;

use serde::Serialize;
use threadpool::ThreadPool;
use tracing::{info, warn};

use crate::analysis::baseline::estimate_baseline;
use crate::analysis::events::{AnnotatedSeries, extract_events};
use crate::analysis::magnitude::{MagnitudeMatch, match_peaks};
use crate::analysis::timing::{TimingScore, score_timing};
use crate::config::ScoringConfig;
use crate::model::{Result, ScoreError, SeriesId, TimeSeries};

/// Scores of one predicted series against the observed series.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub observed: AnnotatedSeries,
    pub predicted: AnnotatedSeries,
    #[serde(serialize_with = "serialize_result")]
    pub magnitude: Result<MagnitudeMatch>,
    #[serde(serialize_with = "serialize_result")]
    pub timing: Result<TimingScore>,
}

/// Outcome of one prediction in a batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub predicted: SeriesId,
    pub evaluation: Result<Evaluation>,
}

fn serialize_result<T: Serialize, S: serde::Serializer>(
    value: &Result<T>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    #[serde(rename_all = "snake_case")]
    enum Outcome<'a, T> {
        Ok(&'a T),
        Error(String),
    }
    match value {
        Ok(v) => Outcome::Ok(v).serialize(serializer),
        Err(e) => Outcome::<T>::Error(e.to_string()).serialize(serializer),
    }
}

/// Baseline, events and jump points for one series.
pub fn annotate(series: &TimeSeries, config: &ScoringConfig) -> Result<AnnotatedSeries> {
    let baseline = estimate_baseline(
        series,
        config.baseline.threshold,
        config.baseline.min_stable_length,
        config.baseline.fallback,
    )?;
    extract_events(series, baseline, config.extraction.height_divisor)
}

/// Scores an already annotated pair.
pub fn evaluate_annotated(
    observed: AnnotatedSeries,
    predicted: AnnotatedSeries,
    config: &ScoringConfig,
) -> Evaluation {
    let tolerance = config.matching.tolerance_days;

    let observed_peaks = observed.peaks();
    let predicted_peaks = predicted.peaks();

    let magnitude = match_peaks(&observed_peaks, &predicted_peaks, tolerance);
    if let Err(e) = &magnitude {
        warn!(predicted = %predicted.id, error = %e, "magnitude matching failed");
    }

    let timing = score_timing(
        &observed_peaks,
        &observed.jumps(),
        &predicted_peaks,
        &predicted.jumps(),
        tolerance,
        config.matching.timing_policy,
    );
    if let Err(e) = &timing {
        warn!(predicted = %predicted.id, error = %e, "timing scoring failed");
    }

    Evaluation {
        observed,
        predicted,
        magnitude,
        timing,
    }
}

/// Annotates both series and scores `predicted` against `observed`.
pub fn evaluate(
    observed: &TimeSeries,
    predicted: &TimeSeries,
    config: &ScoringConfig,
) -> Result<Evaluation> {
    let observed = annotate(observed, config)?;
    let predicted = annotate(predicted, config)?;
    Ok(evaluate_annotated(observed, predicted, config))
}

/// Scores every prediction against `observed`, `config.workers` at a time.
///
/// The observed series is annotated once up front; if that fails the error
/// is returned for the whole batch. Outcomes come back in input order.
pub fn evaluate_batch(
    observed: &TimeSeries,
    predictions: Vec<TimeSeries>,
    config: &ScoringConfig,
) -> Result<Vec<BatchOutcome>> {
    if config.workers == 0 {
        return Err(ScoreError::InvalidParameter(
            "workers must be at least 1".to_string(),
        ));
    }

    let observed = Arc::new(annotate(observed, config)?);
    let config = Arc::new(config.clone());
    let total = predictions.len();
    let ids: Vec<SeriesId> = predictions.iter().map(|p| p.id().clone()).collect();

    info!(
        observed = %observed.id,
        predictions = total,
        workers = config.workers,
        "scoring batch"
    );

    let pool = ThreadPool::new(config.workers.min(total.max(1)));
    let (tx, rx) = mpsc::channel();

    for (position, prediction) in predictions.into_iter().enumerate() {
        let tx = tx.clone();
        let observed = Arc::clone(&observed);
        let config = Arc::clone(&config);

        pool.execute(move || {
            let predicted = prediction.id().clone();
            let evaluation = annotate(&prediction, &config)
                .map(|annotated| evaluate_annotated((*observed).clone(), annotated, &config));
            if let Err(e) = &evaluation {
                warn!(predicted = %predicted, error = %e, "prediction could not be annotated");
            }
            // The receiver outlives the pool; a send failure means the
            // caller is gone and the result has nowhere to go.
            let _ = tx.send((position, BatchOutcome { predicted, evaluation }));
        });
    }
    drop(tx);

    let received: Vec<(usize, BatchOutcome)> = rx.iter().collect();
    pool.join();

    Ok(collect_outcomes(ids, received))
}

/// Orders received outcomes by input position. A position with no outcome
/// (its worker panicked) becomes a `JobAborted` failure for that series only.
fn collect_outcomes(ids: Vec<SeriesId>, received: Vec<(usize, BatchOutcome)>) -> Vec<BatchOutcome> {
    let mut slots: Vec<Option<BatchOutcome>> = vec![None; ids.len()];
    for (position, outcome) in received {
        if let Some(slot) = slots.get_mut(position) {
            *slot = Some(outcome);
        }
    }

    ids.into_iter()
        .zip(slots)
        .map(|(predicted, slot)| {
            slot.unwrap_or_else(|| {
                warn!(predicted = %predicted, "scoring job did not report back");
                BatchOutcome {
                    evaluation: Err(ScoreError::JobAborted {
                        series: predicted.to_string(),
                    }),
                    predicted,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::baseline::BaselineFallback;
    use crate::analysis::timing::TimingPolicy;
    use crate::model::day;

    fn series(id: &str, values: &[f64]) -> TimeSeries {
        let dates: Vec<_> = (0..values.len() as i64).map(day).collect();
        TimeSeries::from_pairs(id, &dates, values).unwrap()
    }

    /// Flat stretches at 1.0 separated by two sharp excursions.
    fn observed_values() -> Vec<f64> {
        let mut v = vec![1.0; 8];
        v.extend([3.0, 4.0, 3.2, 2.0, 1.3]);
        v.extend([1.0; 8]);
        v.extend([3.2, 4.2, 3.0, 1.9, 1.3]);
        v.extend([1.0; 8]);
        v
    }

    #[test]
    fn test_annotate_finds_both_excursions() {
        let config = ScoringConfig::default();
        let annotated = annotate(&series("WL", &observed_values()), &config).unwrap();
        assert!(!annotated.baseline.is_fallback());
        assert_eq!(annotated.baseline.level, 1.0);
        assert_eq!(annotated.peaks().len(), 2);
        assert_eq!(annotated.jumps().len(), 2);
    }

    #[test]
    fn test_evaluate_identical_series_scores_zero() {
        let config = ScoringConfig::default();
        let obs = series("WL", &observed_values());
        let pred = series("WL_1", &observed_values());
        let evaluation = evaluate(&obs, &pred, &config).unwrap();

        let magnitude = evaluation.magnitude.as_ref().unwrap();
        assert_eq!(magnitude.average_percentage_difference(), Some(0.0));
        let timing = evaluation.timing.as_ref().unwrap();
        assert_eq!(timing.combined_score, 0.0);
    }

    #[test]
    fn test_evaluate_shifted_prediction() {
        let config = ScoringConfig::default();
        let obs = series("WL", &observed_values());
        let mut shifted = vec![1.0];
        shifted.extend(observed_values());
        shifted.pop();
        let pred = series("WL_1", &shifted);
        let evaluation = evaluate(&obs, &pred, &config).unwrap();

        let timing = evaluation.timing.unwrap();
        assert_eq!(timing.avg_peak_diff, 1.0);
        assert_eq!(timing.avg_jump_diff, 1.0);
    }

    #[test]
    fn test_bad_tolerance_fails_scores_not_evaluation() {
        let mut config = ScoringConfig::default();
        config.matching.tolerance_days = 0;
        let obs = series("WL", &observed_values());
        let evaluation = evaluate(&obs, &obs, &config).unwrap();
        assert!(evaluation.magnitude.is_err());
        assert!(evaluation.timing.is_err());
    }

    #[test]
    fn test_unannotatable_prediction_aborts_evaluation() {
        let config = ScoringConfig::default();
        let obs = series("WL", &observed_values());
        let flat = series("WL_1", &[1.0; 10]);
        let result = evaluate(&obs, &flat, &config);
        assert!(matches!(result, Err(ScoreError::NoCandidatePeaks { .. })));
    }

    #[test]
    fn test_reject_fallback_surfaces_baseline_error() {
        let mut config = ScoringConfig::default();
        config.baseline.fallback = BaselineFallback::Reject;
        let jagged = series("WL", &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0]);
        let result = annotate(&jagged, &config);
        assert!(matches!(result, Err(ScoreError::BaselineUnstable { .. })));
    }

    #[test]
    fn test_batch_preserves_order_and_matches_sequential() {
        let mut config = ScoringConfig::default();
        config.workers = 3;
        config.matching.timing_policy = TimingPolicy::ExtraPoints;

        let obs = series("WL", &observed_values());
        let mut shifted = vec![1.0, 1.0];
        shifted.extend(observed_values());
        shifted.truncate(observed_values().len());

        let predictions = vec![
            series("WL_1", &observed_values()),
            series("WL_2", &shifted),
            series("WL_3", &[1.0; 12]),
            series("WL_4", &shifted),
        ];

        let outcomes = evaluate_batch(&obs, predictions.clone(), &config).unwrap();
        let ids: Vec<&str> = outcomes.iter().map(|o| o.predicted.as_str()).collect();
        assert_eq!(ids, vec!["WL_1", "WL_2", "WL_3", "WL_4"]);
        assert!(outcomes[2].evaluation.is_err());

        for (outcome, prediction) in outcomes.iter().zip(&predictions) {
            let sequential = evaluate(&obs, prediction, &config);
            match (&outcome.evaluation, sequential) {
                (Ok(batch), Ok(seq)) => {
                    assert_eq!(batch.timing, seq.timing);
                    assert_eq!(batch.magnitude, seq.magnitude);
                }
                (Err(a), Err(b)) => assert_eq!(a, &b),
                _ => panic!("batch and sequential disagree for {}", outcome.predicted),
            }
        }
    }

    #[test]
    fn test_batch_fails_when_observed_cannot_be_annotated() {
        let config = ScoringConfig::default();
        let flat = series("WL", &[1.0; 10]);
        let result = evaluate_batch(&flat, vec![series("WL_1", &observed_values())], &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_job_fails_only_its_own_outcome() {
        let config = ScoringConfig::default();
        let obs = series("WL", &observed_values());
        let done = evaluate(&obs, &series("WL_1", &observed_values()), &config).unwrap();
        let ids: Vec<SeriesId> = vec!["WL_1".into(), "WL_2".into(), "WL_3".into()];
        let received = vec![
            (2, BatchOutcome { predicted: "WL_3".into(), evaluation: Ok(done.clone()) }),
            (0, BatchOutcome { predicted: "WL_1".into(), evaluation: Ok(done) }),
        ];

        let outcomes = collect_outcomes(ids, received);
        let order: Vec<&str> = outcomes.iter().map(|o| o.predicted.as_str()).collect();
        assert_eq!(order, vec!["WL_1", "WL_2", "WL_3"]);
        assert!(outcomes[0].evaluation.is_ok());
        assert_eq!(
            outcomes[1].evaluation.as_ref().unwrap_err(),
            &ScoreError::JobAborted { series: "WL_2".to_string() }
        );
        assert!(outcomes[2].evaluation.is_ok());
    }

    #[test]
    fn test_empty_batch_is_ok() {
        let config = ScoringConfig::default();
        let obs = series("WL", &observed_values());
        assert!(evaluate_batch(&obs, Vec::new(), &config).unwrap().is_empty());
    }
}
