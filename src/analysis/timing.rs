/// Peak and jump timing comparison.
///
/// Every primary event is scored in days: the gap to its matched secondary
/// event, or a fixed penalty of `tolerance_days + 1` when it cannot be
/// matched. The penalty is larger than any gap a real match can have, so an
/// unmatched event always costs more than a late one.
///
/// Two policies are available:
/// - `Standard` only scores primary events. A primary event whose nearest
///   in-window candidate is already taken is penalized; it does not fall
///   back to a farther candidate.
/// - `ExtraPoints` additionally penalizes every secondary event left
///   unclaimed, so spurious events in the secondary series also raise the
///   score.

use serde::{Deserialize, Serialize};

use crate::analysis::matching::{ClaimSet, nearest_in_window, validate_tolerance};
use crate::model::{Event, MatchRecord, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimingPolicy {
    #[default]
    Standard,
    ExtraPoints,
}

impl TimingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimingPolicy::Standard => "standard",
            TimingPolicy::ExtraPoints => "extra-points",
        }
    }
}

/// Timing scores for one (primary, secondary) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingScore {
    pub policy: TimingPolicy,
    pub tolerance_days: i64,
    pub peak_records: Vec<MatchRecord>,
    pub jump_records: Vec<MatchRecord>,
    /// Mean peak difference in days; infinite when there is nothing to score.
    pub avg_peak_diff: f64,
    /// Mean jump difference in days; infinite when there is nothing to score.
    pub avg_jump_diff: f64,
    /// Count-weighted mean over peak and jump records together.
    pub combined_score: f64,
}

/// One line of the side-by-side peak/jump table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetailRow {
    /// 1-based row number.
    pub matching_index: usize,
    pub peak: Option<MatchRecord>,
    pub jump: Option<MatchRecord>,
}

impl TimingScore {
    pub fn penalty(&self) -> f64 {
        penalty_days(self.tolerance_days)
    }

    /// Peak and jump records side by side; the shorter list is padded with
    /// `None`.
    pub fn detail_rows(&self) -> Vec<DetailRow> {
        let rows = self.peak_records.len().max(self.jump_records.len());
        (0..rows)
            .map(|i| DetailRow {
                matching_index: i + 1,
                peak: self.peak_records.get(i).copied(),
                jump: self.jump_records.get(i).copied(),
            })
            .collect()
    }
}

fn penalty_days(tolerance_days: i64) -> f64 {
    tolerance_days as f64 + 1.0
}

fn average_or_infinite(records: &[MatchRecord]) -> f64 {
    if records.is_empty() {
        return f64::INFINITY;
    }
    records.iter().map(|r| r.difference).sum::<f64>() / records.len() as f64
}

/// Scores each primary event against same-kind secondary events.
///
/// Records come back in chronological primary order, one per primary
/// event. Matched secondaries are added to `claims`.
pub fn match_timing(
    primary: &[Event],
    secondary: &[Event],
    tolerance_days: i64,
    claims: &mut ClaimSet,
) -> Vec<MatchRecord> {
    let mut ordered: Vec<&Event> = primary.iter().collect();
    ordered.sort_by_key(|e| e.date);

    ordered
        .into_iter()
        .map(|event| {
            let nearest = nearest_in_window(event, secondary, tolerance_days, |_| true);
            match nearest {
                Some(idx) if !claims.is_claimed(idx) => {
                    claims.claim(idx);
                    MatchRecord {
                        primary: Some(event.date),
                        secondary: Some(secondary[idx].date),
                        difference: event.days_from(secondary[idx].date) as f64,
                    }
                }
                // Nothing in the window, or the nearest one is already taken
                _ => MatchRecord {
                    primary: Some(event.date),
                    secondary: None,
                    difference: penalty_days(tolerance_days),
                },
            }
        })
        .collect()
}

/// Penalty records for every secondary event nobody claimed.
pub fn extra_point_penalties(
    secondary: &[Event],
    claims: &ClaimSet,
    tolerance_days: i64,
) -> Vec<MatchRecord> {
    claims
        .unclaimed(secondary.len())
        .map(|idx| MatchRecord {
            primary: None,
            secondary: Some(secondary[idx].date),
            difference: penalty_days(tolerance_days),
        })
        .collect()
}

/// Scores peak and jump timing of `secondary_*` against `primary_*`.
///
/// Peaks and jumps are matched independently, each with its own claim set.
///
/// # Errors
/// `InvalidParameter` when `tolerance_days` is outside
/// `1..=MAX_TOLERANCE_DAYS`.
pub fn score_timing(
    primary_peaks: &[Event],
    primary_jumps: &[Event],
    secondary_peaks: &[Event],
    secondary_jumps: &[Event],
    tolerance_days: i64,
    policy: TimingPolicy,
) -> Result<TimingScore> {
    validate_tolerance(tolerance_days)?;

    let score_kind = |primary: &[Event], secondary: &[Event]| {
        let mut claims = ClaimSet::new();
        let mut records = match_timing(primary, secondary, tolerance_days, &mut claims);
        if policy == TimingPolicy::ExtraPoints {
            records.extend(extra_point_penalties(secondary, &claims, tolerance_days));
        }
        records
    };

    let peak_records = score_kind(primary_peaks, secondary_peaks);
    let jump_records = score_kind(primary_jumps, secondary_jumps);

    let combined: Vec<MatchRecord> = peak_records.iter().chain(&jump_records).copied().collect();

    Ok(TimingScore {
        policy,
        tolerance_days,
        avg_peak_diff: average_or_infinite(&peak_records),
        avg_jump_diff: average_or_infinite(&jump_records),
        combined_score: average_or_infinite(&combined),
        peak_records,
        jump_records,
    })
}
