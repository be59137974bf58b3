/// Output adapters: CSV detail tables, annotated-series export and JSON
/// summaries.
///
/// Column headers are built from the series ids, so scoring `WL_1` against
/// `WL` produces `Date_WL_Peak`, `Date_WL_1_Peak`, ... Absent dates and
/// padded cells are written as empty fields.

use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::analysis::events::AnnotatedSeries;
use crate::analysis::magnitude::MagnitudeMatch;
use crate::analysis::pipeline::{BatchOutcome, Evaluation};
use crate::analysis::timing::TimingScore;
use crate::model::{MatchRecord, SeriesId};

fn date_cell(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn record_cells(record: Option<&MatchRecord>) -> [String; 3] {
    match record {
        Some(r) => [
            date_cell(r.primary),
            date_cell(r.secondary),
            r.difference.to_string(),
        ],
        None => [String::new(), String::new(), String::new()],
    }
}

// ---------------------------------------------------------------------------
// CSV tables
// ---------------------------------------------------------------------------

/// Writes the side-by-side peak/jump timing table.
pub fn write_timing_detail<W: Write>(
    writer: W,
    score: &TimingScore,
    observed: &SeriesId,
    predicted: &SeriesId,
) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        "Matching_Index".to_string(),
        format!("Date_{}_Peak", observed),
        format!("Date_{}_Peak", predicted),
        "Peak_Timing_Difference".to_string(),
        format!("Date_{}_Jump", observed),
        format!("Date_{}_Jump", predicted),
        "Jump_Timing_Difference".to_string(),
    ])?;

    for row in score.detail_rows() {
        let [peak_p, peak_s, peak_d] = record_cells(row.peak.as_ref());
        let [jump_p, jump_s, jump_d] = record_cells(row.jump.as_ref());
        out.write_record([
            row.matching_index.to_string(),
            peak_p,
            peak_s,
            peak_d,
            jump_p,
            jump_s,
            jump_d,
        ])?;
    }
    out.flush()?;
    Ok(())
}

/// Writes one row per matched peak pair.
pub fn write_magnitude_detail<W: Write>(
    writer: W,
    result: &MagnitudeMatch,
    observed: &SeriesId,
    predicted: &SeriesId,
) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        "Matching_Index".to_string(),
        format!("Date_{}", observed),
        format!("Date_{}", predicted),
        "Percentage_Difference".to_string(),
    ])?;

    for (i, record) in result.records.iter().enumerate() {
        let [primary, secondary, difference] = record_cells(Some(record));
        out.write_record([(i + 1).to_string(), primary, secondary, difference])?;
    }
    out.flush()?;
    Ok(())
}

/// Writes dates, values and flags of an annotated series, ready for a
/// plotting tool.
pub fn write_annotated<W: Write>(writer: W, series: &AnnotatedSeries) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["Time", series.id.as_str(), "rise", "local_max", "jump_point"])?;

    for (i, sample) in series.samples.iter().enumerate() {
        out.write_record([
            date_cell(Some(sample.date)),
            sample.value.to_string(),
            series.rise[i].to_string(),
            series.local_max[i].to_string(),
            series.jump_point[i].to_string(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

/// Writes `<predicted>_timing.csv` and, when magnitude matching succeeded,
/// `<predicted>_magnitude.csv` into `dir`. Returns the files written.
pub fn write_evaluation_files(dir: &Path, evaluation: &Evaluation) -> Result<Vec<PathBuf>, csv::Error> {
    std::fs::create_dir_all(dir)?;
    let observed = &evaluation.observed.id;
    let predicted = &evaluation.predicted.id;
    let mut written = Vec::new();

    if let Ok(timing) = &evaluation.timing {
        let path = dir.join(format!("{}_timing.csv", predicted));
        write_timing_detail(std::fs::File::create(&path)?, timing, observed, predicted)?;
        written.push(path);
    }
    if let Ok(magnitude) = &evaluation.magnitude {
        let path = dir.join(format!("{}_magnitude.csv", predicted));
        write_magnitude_detail(std::fs::File::create(&path)?, magnitude, observed, predicted)?;
        written.push(path);
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Headline numbers for one prediction.
///
/// Undefined scores (no matches, nothing to score, or a failed stage) are
/// `None` and serialize as `null`. An infinite magnitude average (a matched
/// observed peak at level 0) is also reported as `None`; it is told apart
/// from "no matches" by `matched_peaks > 0` and `zero_level_peaks > 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub observed: String,
    pub predicted: String,
    pub observed_baseline_fallback: Option<bool>,
    pub predicted_baseline_fallback: Option<bool>,
    pub primary_peaks: Option<usize>,
    pub matched_peaks: Option<usize>,
    /// Matched peaks whose percentage difference is infinite.
    pub zero_level_peaks: Option<usize>,
    pub average_percentage_difference: Option<f64>,
    pub avg_peak_diff: Option<f64>,
    pub avg_jump_diff: Option<f64>,
    pub combined_score: Option<f64>,
    /// Days charged for each unmatched timing event.
    pub timing_penalty: Option<f64>,
    /// Timing rows without a matched pair (penalties, both policies).
    pub unmatched_timing_events: Option<usize>,
    pub errors: Vec<String>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

struct MagnitudeFields {
    primary_peaks: usize,
    matched_peaks: usize,
    zero_level_peaks: usize,
    average: Option<f64>,
}

fn magnitude_fields(m: &MagnitudeMatch) -> MagnitudeFields {
    MagnitudeFields {
        primary_peaks: m.primary_count,
        matched_peaks: m.matched_count(),
        zero_level_peaks: m.records.iter().filter(|r| r.difference.is_infinite()).count(),
        average: m.average_percentage_difference().and_then(finite),
    }
}

fn unmatched_timing_events(t: &TimingScore) -> usize {
    t.peak_records
        .iter()
        .chain(&t.jump_records)
        .filter(|r| !r.is_matched())
        .count()
}

impl ScoreSummary {
    pub fn from_evaluation(evaluation: &Evaluation) -> Self {
        let mut summary = Self::empty(&evaluation.observed.id, &evaluation.predicted.id, Vec::new());
        summary.observed_baseline_fallback = Some(evaluation.observed.baseline.is_fallback());
        summary.predicted_baseline_fallback = Some(evaluation.predicted.baseline.is_fallback());

        match &evaluation.magnitude {
            Ok(m) => {
                let fields = magnitude_fields(m);
                summary.primary_peaks = Some(fields.primary_peaks);
                summary.matched_peaks = Some(fields.matched_peaks);
                summary.zero_level_peaks = Some(fields.zero_level_peaks);
                summary.average_percentage_difference = fields.average;
            }
            Err(e) => summary.errors.push(format!("magnitude: {}", e)),
        }

        match &evaluation.timing {
            Ok(t) => {
                summary.avg_peak_diff = finite(t.avg_peak_diff);
                summary.avg_jump_diff = finite(t.avg_jump_diff);
                summary.combined_score = finite(t.combined_score);
                summary.timing_penalty = Some(t.penalty());
                summary.unmatched_timing_events = Some(unmatched_timing_events(t));
            }
            Err(e) => summary.errors.push(format!("timing: {}", e)),
        }

        summary
    }

    pub fn from_outcome(observed: &SeriesId, outcome: &BatchOutcome) -> Self {
        match &outcome.evaluation {
            Ok(evaluation) => Self::from_evaluation(evaluation),
            Err(e) => Self::empty(observed, &outcome.predicted, vec![e.to_string()]),
        }
    }

    fn empty(observed: &SeriesId, predicted: &SeriesId, errors: Vec<String>) -> Self {
        ScoreSummary {
            observed: observed.to_string(),
            predicted: predicted.to_string(),
            observed_baseline_fallback: None,
            predicted_baseline_fallback: None,
            primary_peaks: None,
            matched_peaks: None,
            zero_level_peaks: None,
            average_percentage_difference: None,
            avg_peak_diff: None,
            avg_jump_diff: None,
            combined_score: None,
            timing_penalty: None,
            unmatched_timing_events: None,
            errors,
        }
    }
}

/// Renders an optional score, "n/a" when undefined.
pub fn display_score(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "n/a".to_string())
}
