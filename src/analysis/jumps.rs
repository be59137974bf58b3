/// Jump-point derivation.
///
/// Rise-onset flags fire on every sample where the level climbs faster than
/// the rise threshold, so a single excursion can carry several of them. A
/// jump point is the rise-onset that opens a *new* excursion: the first rise
/// of the series, and the first unconsumed rise after each local maximum.

use crate::model::{Result, ScoreError};

/// Splits `rise_flags` into jump points and the rise points left over.
///
/// Returns `(jump_flags, remaining_rise_flags)`. Both masks have the input
/// length; every jump point was a rise point and no rise point is used twice.
///
/// # Errors
/// `InvalidParameter` when the two masks differ in length.
pub fn derive_jump_points(
    rise_flags: &[bool],
    local_max_flags: &[bool],
) -> Result<(Vec<bool>, Vec<bool>)> {
    if rise_flags.len() != local_max_flags.len() {
        return Err(ScoreError::InvalidParameter(format!(
            "rise mask has {} entries, local-max mask has {}",
            rise_flags.len(),
            local_max_flags.len()
        )));
    }

    let mut jumps = vec![false; rise_flags.len()];
    let mut remaining = rise_flags.to_vec();

    if let Some(first) = rise_flags.iter().position(|&r| r) {
        jumps[first] = true;
        remaining[first] = false;
    }

    for (max_idx, _) in local_max_flags.iter().enumerate().filter(|&(_, &m)| m) {
        if let Some(next) = (max_idx + 1..remaining.len()).find(|&j| remaining[j]) {
            jumps[next] = true;
            remaining[next] = false;
        }
    }

    Ok((jumps, remaining))
}
