/// Peak magnitude comparison.
///
/// Pairs each primary peak with the nearest unclaimed secondary peak inside
/// the tolerance window and reports how far apart their levels are, as a
/// percentage of the primary level.

use serde::Serialize;

use crate::analysis::matching::{ClaimSet, nearest_in_window, validate_tolerance};
use crate::model::{Event, EventKind, MatchRecord, Result, mean};

/// Outcome of `match_peaks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MagnitudeMatch {
    /// Number of primary peaks considered.
    pub primary_count: usize,
    /// One record per matched primary peak, in chronological order.
    pub records: Vec<MatchRecord>,
}

impl MagnitudeMatch {
    pub fn matched_count(&self) -> usize {
        self.records.len()
    }

    pub fn percentage_differences(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.difference).collect()
    }

    /// Mean percentage difference over matched peaks; `None` when nothing
    /// matched.
    pub fn average_percentage_difference(&self) -> Option<f64> {
        mean(&self.percentage_differences())
    }
}

/// `|primary - secondary| / |primary| * 100`.
///
/// A zero primary level gives 0 if the secondary is also zero, otherwise
/// infinity.
pub fn percentage_difference(primary: f64, secondary: f64) -> f64 {
    let gap = (primary - secondary).abs();
    if primary == 0.0 {
        return if gap == 0.0 { 0.0 } else { f64::INFINITY };
    }
    gap / primary.abs() * 100.0
}

/// Matches peak events of `primary` against peak events of `secondary`.
///
/// Events of other kinds in either slice are ignored. Primary peaks are
/// processed in chronological order and earlier ones win contested
/// secondary peaks; a claimed secondary peak is skipped when looking for
/// the nearest candidate.
///
/// # Errors
/// `InvalidParameter` when `tolerance_days` is outside
/// `1..=MAX_TOLERANCE_DAYS`.
pub fn match_peaks(
    primary: &[Event],
    secondary: &[Event],
    tolerance_days: i64,
) -> Result<MagnitudeMatch> {
    validate_tolerance(tolerance_days)?;

    let mut primary_peaks = only_peaks(primary);
    primary_peaks.sort_by_key(|e| e.date);
    let secondary_peaks = only_peaks(secondary);

    let mut claims = ClaimSet::new();
    let mut records = Vec::new();

    for peak in &primary_peaks {
        let nearest = nearest_in_window(peak, &secondary_peaks, tolerance_days, |i| {
            !claims.is_claimed(i)
        });
        let Some(idx) = nearest else {
            continue;
        };
        claims.claim(idx);
        let matched = secondary_peaks[idx];
        records.push(MatchRecord {
            primary: Some(peak.date),
            secondary: Some(matched.date),
            difference: percentage_difference(peak.value, matched.value),
        });
    }

    Ok(MagnitudeMatch {
        primary_count: primary_peaks.len(),
        records,
    })
}

fn only_peaks(events: &[Event]) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::Peak)
        .copied()
        .collect()
}
