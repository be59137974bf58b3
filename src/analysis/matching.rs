/// Shared event-matching primitives.
///
/// Both matchers walk the primary events in chronological order and pair
/// each one with a secondary event inside a ±tolerance window. A secondary
/// event can be paired at most once; the `ClaimSet` records which ones are
/// taken. The claim set is created by whoever runs a matching pass and is
/// handed in explicitly, so separate passes never see each other's claims.

use std::collections::HashSet;

use crate::model::{Event, Result, ScoreError};

/// Secondary events already paired during one matching pass, by index into
/// the secondary slice.
#[derive(Debug, Default, Clone)]
pub struct ClaimSet {
    claimed: HashSet<usize>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `index` as taken. Returns false if it was already claimed.
    pub fn claim(&mut self, index: usize) -> bool {
        self.claimed.insert(index)
    }

    pub fn is_claimed(&self, index: usize) -> bool {
        self.claimed.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    /// Indices in `0..total` nobody claimed, ascending.
    pub fn unclaimed(&self, total: usize) -> impl Iterator<Item = usize> + '_ {
        (0..total).filter(move |i| !self.claimed.contains(i))
    }
}

/// Widest accepted matching window, in days (about a century).
pub const MAX_TOLERANCE_DAYS: i64 = 36_500;

/// Tolerance windows must span at least one day and at most
/// `MAX_TOLERANCE_DAYS`.
pub(crate) fn validate_tolerance(tolerance_days: i64) -> Result<()> {
    if !(1..=MAX_TOLERANCE_DAYS).contains(&tolerance_days) {
        return Err(ScoreError::InvalidParameter(format!(
            "tolerance_days must be between 1 and {}, got {}",
            MAX_TOLERANCE_DAYS, tolerance_days
        )));
    }
    Ok(())
}

/// Index of the secondary event closest in time to `target` among those
/// within `tolerance_days` that pass `eligible`.
///
/// Ties go to the earliest index.
pub(crate) fn nearest_in_window(
    target: &Event,
    secondary: &[Event],
    tolerance_days: i64,
    eligible: impl Fn(usize) -> bool,
) -> Option<usize> {
    secondary
        .iter()
        .enumerate()
        .filter(|&(i, candidate)| candidate.days_from(target.date) <= tolerance_days && eligible(i))
        .min_by_key(|&(i, candidate)| (candidate.days_from(target.date), i))
        .map(|(i, _)| i)
}
