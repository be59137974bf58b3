/// Input adapters.
///
/// - `csv_series`: date-indexed CSV tables, one series per column.

pub mod csv_series;
