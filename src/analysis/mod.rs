/// Event extraction and scoring for groundwater-level series.
///
/// Submodules, leaf first:
/// - `baseline`: resting level from long stable runs.
/// - `jumps`: splits rise-onsets into jump points and leftovers.
/// - `events`: rise, local-max and jump flags for one series.
/// - `matching`: claim bookkeeping and window search shared by the matchers.
/// - `magnitude`: percentage difference of matched peaks.
/// - `timing`: day differences of matched peaks and jumps, two policies.
/// - `pipeline`: runs the stages for one pair or a batch of predictions.

pub mod baseline;
pub mod events;
pub mod jumps;
pub mod magnitude;
pub mod matching;
pub mod pipeline;
pub mod timing;
