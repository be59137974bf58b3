/// Scoring configuration loader - parses scoring.toml
///
/// Keeps the tuning knobs of the event extraction and matching stages out of
/// the code so different model runs can be scored with different baselines,
/// tolerances or penalty policies without recompiling.
///
/// Every key is optional; anything missing takes the default below.
///
/// ```toml
/// workers = 4
///
/// [baseline]
/// threshold = 0.05
/// min_stable_length = 6
/// fallback = "series-minimum"   # or "reject"
///
/// [extraction]
/// height_divisor = 2.0
///
/// [matching]
/// tolerance_days = 3
/// timing_policy = "standard"    # or "extra-points"
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::baseline::{BaselineFallback, DEFAULT_MIN_STABLE_LENGTH, DEFAULT_STABLE_THRESHOLD};
use crate::analysis::matching::MAX_TOLERANCE_DAYS;
use crate::analysis::timing::TimingPolicy;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "GWL_SCORING_CONFIG";

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "scoring.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselineConfig {
    /// Largest step between consecutive samples that still counts as stable.
    pub threshold: f64,
    /// Minimum length of a stable run.
    pub min_stable_length: usize,
    pub fallback: BaselineFallback,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_STABLE_THRESHOLD,
            min_stable_length: DEFAULT_MIN_STABLE_LENGTH,
            fallback: BaselineFallback::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Mean peak height above baseline is divided by this to get the rise
    /// threshold; larger values detect smaller rises.
    pub height_divisor: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { height_divisor: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Half-width of the matching window in days.
    pub tolerance_days: i64,
    pub timing_policy: TimingPolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance_days: 3,
            timing_policy: TimingPolicy::default(),
        }
    }
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Worker threads used when scoring several predictions at once.
    pub workers: usize,
    pub baseline: BaselineConfig,
    pub extraction: ExtractionConfig,
    pub matching: MatchingConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            baseline: BaselineConfig::default(),
            extraction: ExtractionConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Rejects values the analysis stages would refuse anyway, so a bad file
    /// is reported once at startup instead of once per series.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if !(self.baseline.threshold.is_finite() && self.baseline.threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "baseline.threshold must be positive, got {}",
                self.baseline.threshold
            )));
        }
        if self.baseline.min_stable_length == 0 {
            return Err(ConfigError::Invalid(
                "baseline.min_stable_length must be at least 1".into(),
            ));
        }
        if !(self.extraction.height_divisor.is_finite() && self.extraction.height_divisor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "extraction.height_divisor must be positive, got {}",
                self.extraction.height_divisor
            )));
        }
        if !(1..=MAX_TOLERANCE_DAYS).contains(&self.matching.tolerance_days) {
            return Err(ConfigError::Invalid(format!(
                "matching.tolerance_days must be between 1 and {}, got {}",
                MAX_TOLERANCE_DAYS, self.matching.tolerance_days
            )));
        }
        Ok(())
    }
}

/// Parses and validates configuration text.
pub fn parse_config(contents: &str, path: &Path) -> Result<ScoringConfig, ConfigError> {
    let config: ScoringConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from an explicit file.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<ScoringConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

/// Loads configuration from `$GWL_SCORING_CONFIG` (a `.env` file is honoured),
/// else `scoring.toml` in the working directory, else built-in defaults.
pub fn load_config() -> Result<ScoringConfig, ConfigError> {
    dotenv::dotenv().ok();

    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return load_config_from(path);
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return load_config_from(default_path);
    }

    Ok(ScoringConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(text: &str) -> Result<ScoringConfig, ConfigError> {
        parse_config(text, Path::new("test.toml"))
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse("").expect("empty config should parse");
        assert_eq!(config, ScoringConfig::default());
        assert_eq!(config.baseline.threshold, 0.05);
        assert_eq!(config.baseline.min_stable_length, 6);
        assert_eq!(config.matching.tolerance_days, 3);
        assert_eq!(config.matching.timing_policy, TimingPolicy::Standard);
        assert_eq!(config.baseline.fallback, BaselineFallback::SeriesMinimum);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = parse(
            r#"
            [matching]
            timing_policy = "extra-points"
            "#,
        )
        .unwrap();
        assert_eq!(config.matching.timing_policy, TimingPolicy::ExtraPoints);
        assert_eq!(config.matching.tolerance_days, 3);
        assert_eq!(config.extraction.height_divisor, 2.0);
    }

    #[test]
    fn test_full_file_parses() {
        let config = parse(
            r#"
            workers = 2

            [baseline]
            threshold = 0.02
            min_stable_length = 10
            fallback = "reject"

            [extraction]
            height_divisor = 3.5

            [matching]
            tolerance_days = 5
            timing_policy = "standard"
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.baseline.fallback, BaselineFallback::Reject);
        assert_eq!(config.baseline.min_stable_length, 10);
        assert_eq!(config.extraction.height_divisor, 3.5);
        assert_eq!(config.matching.tolerance_days, 5);
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let result = parse("[matching]\ntiming_policy = \"lenient\"\n");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_key_is_a_parse_error() {
        let result = parse("[matching]\ntolerance = 3\n");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_divisor_is_invalid() {
        let result = parse("[extraction]\nheight_divisor = 0.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_tolerance_is_invalid() {
        let result = parse("[matching]\ntolerance_days = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_oversized_tolerance_is_invalid() {
        let result = parse("[matching]\ntolerance_days = 9223372036854775807\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert!(parse("[matching]\ntolerance_days = 36500\n").is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[matching]\ntolerance_days = 7").unwrap();
        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.matching.tolerance_days, 7);
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let result = load_config_from("/nonexistent/scoring.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
