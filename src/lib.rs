/// gwl_eventscore: event-based scoring of groundwater-level predictions.
///
/// # Module structure
///
/// ```text
/// gwl_eventscore
/// ├── model       — shared data types (TimeSeries, Event, MatchRecord, ScoreError, …)
/// ├── config      — scoring configuration loader (scoring.toml)
/// ├── ingest
/// │   └── csv_series — date-indexed CSV tables, one series per column
/// ├── analysis
/// │   ├── baseline  — resting level from stable runs
/// │   ├── events    — rise / local-max extraction with confirm-then-backdate
/// │   ├── jumps     — jump points from rise flags and local maxima
/// │   ├── matching  — claim sets and window search
/// │   ├── magnitude — percentage difference of matched peaks
/// │   ├── timing    — peak and jump timing scores (standard / extra-points)
/// │   └── pipeline  — single-pair and batch evaluation
/// └── report      — CSV detail tables and JSON summaries
/// ```

/// Public modules
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod model;
pub mod report;
