//! Series Annotation
//!
//! Runs baseline estimation and event extraction on one column of a CSV
//! table and writes the annotated series (values plus rise, local-max and
//! jump-point flags) for inspection or plotting.
//!
//! Usage:
//!   cargo run --bin annotate_series -- --input levels.csv --column WL
//!
//! Options:
//!   --output FILE       Write the annotated CSV here instead of stdout
//!   --config FILE       Scoring configuration (defaults as gwl_eventscore)

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gwl_eventscore::analysis::baseline::BaselineSource;
use gwl_eventscore::analysis::pipeline::annotate;
use gwl_eventscore::config::{load_config, load_config_from};
use gwl_eventscore::ingest::csv_series::{DEFAULT_TIME_COLUMN, load_series};
use gwl_eventscore::report::write_annotated;

#[derive(Parser)]
#[command(name = "annotate_series")]
#[command(version, about = "Annotate rise, peak and jump events of one series", long_about = None)]
struct Cli {
    /// CSV table with a date column and one column per series
    #[arg(short, long)]
    input: PathBuf,

    /// Column to annotate
    #[arg(short = 'n', long)]
    column: String,

    /// Name of the date column
    #[arg(long, default_value = DEFAULT_TIME_COLUMN)]
    time_column: String,

    /// Scoring configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output CSV path; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .context("loading scoring configuration")?;

    let series = load_series(&cli.input, &cli.time_column)
        .with_context(|| format!("reading {}", cli.input.display()))?
        .into_iter()
        .find(|s| s.id().as_str() == cli.column)
        .with_context(|| format!("column '{}' not found", cli.column))?;

    let annotated = annotate(&series, &config).with_context(|| format!("annotating {}", cli.column))?;

    match &cli.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_annotated(file, &annotated)?;

            let source = match annotated.baseline.source {
                BaselineSource::StablePeriods { sample_count } => {
                    format!("{} stable samples", sample_count)
                }
                BaselineSource::SeriesMinimum => "series minimum".to_string(),
            };
            println!("✓ {} annotated -> {}", annotated.id, path.display());
            println!("  - Baseline: {:.3} ({})", annotated.baseline.level, source);
            println!("  - Rise threshold: {:.3}", annotated.rise_threshold);
            println!("  - Peaks: {}", annotated.peaks().len());
            println!("  - Jump points: {}", annotated.jumps().len());
        }
        None => write_annotated(std::io::stdout().lock(), &annotated)?,
    }

    Ok(())
}
