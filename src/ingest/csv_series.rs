/// CSV time series loader.
///
/// Reads a table with one date column and one numeric column per series:
///
/// ```text
/// Time,WL,WL_1,WL_2
/// 2021-01-01,1.02,1.05,0.98
/// 2021-01-02,1.03,1.04,
/// ```
///
/// Each non-date column becomes a `TimeSeries` whose `SeriesId` is the
/// column header. Blank cells are skipped for that column only, so a
/// prediction with gaps still lines up with the observed dates it has.

use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::model::{Sample, ScoreError, TimeSeries};

/// Date column name used when none is given.
pub const DEFAULT_TIME_COLUMN: &str = "Time";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column: {0}")]
    MissingColumn(String),
    #[error("row {row}: cannot parse date '{value}'")]
    BadDate { row: usize, value: String },
    #[error("row {row}, column {column}: cannot parse value '{value}'")]
    BadValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error(transparent)]
    Series(#[from] ScoreError),
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time of day which is
/// dropped.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
}

/// Parses every series in a CSV table.
///
/// Columns come back in header order. Dates must be strictly increasing
/// within each column.
pub fn read_series<R: Read>(reader: R, time_column: &str) -> Result<Vec<TimeSeries>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h == time_column)
        .ok_or_else(|| IngestError::MissingColumn(time_column.to_string()))?;

    let value_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != time_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();
    let mut samples: Vec<Vec<Sample>> = vec![Vec::new(); value_columns.len()];

    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = record?;
        // Header is line 1
        let row = row_idx + 2;

        let raw_date = record.get(time_idx).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| IngestError::BadDate {
            row,
            value: raw_date.to_string(),
        })?;

        for (slot, (col_idx, name)) in value_columns.iter().enumerate() {
            let raw = record.get(*col_idx).unwrap_or_default();
            if raw.is_empty() {
                continue;
            }
            let value: f64 = raw.parse().map_err(|_| IngestError::BadValue {
                row,
                column: name.clone(),
                value: raw.to_string(),
            })?;
            samples[slot].push(Sample { date, value });
        }
    }

    value_columns
        .into_iter()
        .zip(samples)
        .map(|((_, name), samples)| TimeSeries::new(name, samples).map_err(IngestError::from))
        .collect()
}

/// Loads every series from a CSV file.
pub fn load_series(path: impl AsRef<Path>, time_column: &str) -> Result<Vec<TimeSeries>, IngestError> {
    let file = File::open(path.as_ref())?;
    read_series(file, time_column)
}
