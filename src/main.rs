//! Groundwater Event Scoring
//!
//! Scores one or more predicted groundwater-level series against an observed
//! series from the same CSV table:
//! 1. Estimate each series' baseline and extract rise / peak / jump events
//! 2. Match predicted peaks to observed peaks by magnitude
//! 3. Match peak and jump timing, penalizing unmatched events
//! 4. Print a summary and optionally write per-prediction detail tables
//!
//! Usage:
//!   cargo run --release -- --input levels.csv --observed WL
//!   cargo run --release -- --input levels.csv --observed WL --predicted WL_1 \
//!       --tolerance 5 --policy extra-points --output-dir results/
//!
//! Environment:
//!   GWL_SCORING_CONFIG - path to a scoring.toml (overridden by --config)
//!   RUST_LOG           - log filter, defaults to "info"

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gwl_eventscore::analysis::pipeline::evaluate_batch;
use gwl_eventscore::analysis::timing::TimingPolicy;
use gwl_eventscore::config::{load_config, load_config_from};
use gwl_eventscore::ingest::csv_series::{DEFAULT_TIME_COLUMN, load_series};
use gwl_eventscore::report::{ScoreSummary, display_score, write_evaluation_files};

#[derive(Parser)]
#[command(name = "gwl_eventscore")]
#[command(version, about = "Event-based scoring of groundwater-level predictions", long_about = None)]
struct Cli {
    /// CSV table with a date column and one column per series
    #[arg(short, long)]
    input: PathBuf,

    /// Column holding the observed series
    #[arg(short, long)]
    observed: String,

    /// Columns to score; every other column when omitted
    #[arg(short, long)]
    predicted: Vec<String>,

    /// Name of the date column
    #[arg(long, default_value = DEFAULT_TIME_COLUMN)]
    time_column: String,

    /// Scoring configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Matching window half-width in days
    #[arg(short, long)]
    tolerance: Option<i64>,

    /// Timing penalty policy
    #[arg(long, value_parser = parse_policy)]
    policy: Option<TimingPolicy>,

    /// Directory for per-prediction timing and magnitude tables
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print summaries as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn parse_policy(text: &str) -> Result<TimingPolicy, String> {
    match text {
        "standard" => Ok(TimingPolicy::Standard),
        "extra-points" => Ok(TimingPolicy::ExtraPoints),
        other => Err(format!("unknown policy '{}' (standard or extra-points)", other)),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .context("loading scoring configuration")?;

    if let Some(tolerance) = cli.tolerance {
        config.matching.tolerance_days = tolerance;
    }
    if let Some(policy) = cli.policy {
        config.matching.timing_policy = policy;
    }
    config.validate().context("applying command-line overrides")?;

    let mut series = load_series(&cli.input, &cli.time_column)
        .with_context(|| format!("reading {}", cli.input.display()))?;

    let observed_idx = series
        .iter()
        .position(|s| s.id().as_str() == cli.observed)
        .with_context(|| format!("observed column '{}' not found", cli.observed))?;
    let observed = series.remove(observed_idx);

    let predictions = if cli.predicted.is_empty() {
        series
    } else {
        let mut chosen = Vec::with_capacity(cli.predicted.len());
        for name in &cli.predicted {
            let idx = series
                .iter()
                .position(|s| s.id().as_str() == name)
                .with_context(|| format!("predicted column '{}' not found", name))?;
            chosen.push(series.remove(idx));
        }
        chosen
    };
    if predictions.is_empty() {
        bail!("no predicted columns to score");
    }

    if !cli.json {
        println!("💧 Groundwater Event Scoring");
        println!("============================\n");
        println!("⚙️  Configuration:");
        println!("  - Observed: {} ({} samples)", observed.id(), observed.len());
        println!("  - Predictions: {}", predictions.len());
        println!("  - Tolerance: {} days", config.matching.tolerance_days);
        println!("  - Timing policy: {}", config.matching.timing_policy.as_str());
        println!("  - Baseline fallback: {:?}\n", config.baseline.fallback);
    }

    let outcomes = evaluate_batch(&observed, predictions, &config)
        .with_context(|| format!("annotating observed series {}", observed.id()))?;

    let mut summaries = Vec::with_capacity(outcomes.len());
    for outcome in &outcomes {
        let summary = ScoreSummary::from_outcome(observed.id(), outcome);

        if let (Some(dir), Ok(evaluation)) = (&cli.output_dir, &outcome.evaluation) {
            let written = write_evaluation_files(dir, evaluation)
                .with_context(|| format!("writing tables for {}", outcome.predicted))?;
            if !cli.json {
                for path in written {
                    println!("   📄 {}", path.display());
                }
            }
        }

        if !cli.json {
            print_summary(&summary);
        }
        summaries.push(summary);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        let failed = summaries.iter().filter(|s| !s.errors.is_empty()).count();
        println!("✓ Scored {} predictions ({} with errors)", summaries.len(), failed);
    }

    Ok(())
}

fn print_summary(summary: &ScoreSummary) {
    println!("📋 {} vs {}", summary.predicted, summary.observed);
    if let (Some(matched), Some(total)) = (summary.matched_peaks, summary.primary_peaks) {
        println!("   Matched peaks: {}/{}", matched, total);
    }
    println!(
        "   Peak magnitude difference: {}%",
        display_score(summary.average_percentage_difference)
    );
    println!("   Peak timing: {} days", display_score(summary.avg_peak_diff));
    println!("   Jump timing: {} days", display_score(summary.avg_jump_diff));
    println!("   Combined timing score: {}", display_score(summary.combined_score));
    if summary.predicted_baseline_fallback == Some(true) {
        println!("   ⚠️  Baseline fell back to the series minimum");
    }
    for error in &summary.errors {
        println!("   ✗ {}", error);
    }
    println!();
}
