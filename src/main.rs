use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use petshelf_analytics::config::{AnalysisConfig, load_config};
use petshelf_analytics::export::{OutputFormat, write_outputs};
use petshelf_analytics::ingest::read_dataset;
use petshelf_analytics::pipeline;

/// Batch analytics over scraped pet-food listings.
#[derive(Parser, Debug)]
#[command(name = "petshelf-analytics", version, about)]
struct Cli {
    /// Dataset to analyze (.csv, .json or .jsonl)
    input: PathBuf,

    /// Analysis config (JSON). Without it a default brand-level run is done.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the output artifacts
    #[arg(short, long, default_value = "analysis_out")]
    out_dir: PathBuf,

    /// Output artifact format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Both)]
    format: OutputFormat,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Config load error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => AnalysisConfig::default(),
    };

    let dataset = match read_dataset(&cli.input) {
        Ok(dataset) => dataset,
        Err(e) => {
            error!("Dataset read error: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        records = dataset.records.len(),
        unreadable = dataset.unreadable_rows,
        "Dataset loaded"
    );

    let output = match pipeline::run(&dataset, &config) {
        Ok(output) => output,
        Err(e) => {
            error!("Analysis failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        normalized = output.summary.records_normalized,
        skipped = output.summary.records_skipped,
        "Analysis finished"
    );

    match write_outputs(&output, &cli.out_dir, cli.format) {
        Ok(written) => {
            info!("✅ Run complete: {} files in {}", written.len(), cli.out_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Export error: {e}");
            ExitCode::FAILURE
        }
    }
}
