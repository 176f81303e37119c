//! Batch preparation jobs
//!
//! Aggregates bureau and installment history to one row per applicant and
//! cleans the application tables.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use credit_risk_scoring::{
    cleaning::{clean_application, clean_previous_application},
    config::AppConfig,
    etl::{bureau, installments},
    frame::{read_csv, write_table},
};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "risk-etl", about = "Prepare credit risk training tables")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate bureau.csv per applicant
    Bureau(JobArgs),
    /// Aggregate installments_payments.csv per applicant
    Installments(JobArgs),
    /// Clean application_train.csv
    CleanApplication(JobArgs),
    /// Clean previous_application.csv
    CleanPrevious(JobArgs),
}

#[derive(Args)]
struct JobArgs {
    /// Input table (defaults under etl.raw_dir)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output table (defaults under etl.processed_dir). Parquet unless it ends in `.csv`
    #[arg(long)]
    output: Option<PathBuf>,

    /// Application table whose applicant ids every aggregate row must cover
    #[arg(long)]
    applicants: Option<PathBuf>,
}

impl JobArgs {
    fn paths(&self, config: &AppConfig, input: &str, output: &str) -> (PathBuf, PathBuf) {
        (
            self.input
                .clone()
                .unwrap_or_else(|| Path::new(&config.etl.raw_dir).join(input)),
            self.output
                .clone()
                .unwrap_or_else(|| Path::new(&config.etl.processed_dir).join(output)),
        )
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load_from_path(path)
    } else {
        Ok(AppConfig::default())
    }
}

fn clean_table(
    input: &Path,
    output: &Path,
    table: &str,
    clean: impl Fn(&DataFrame) -> credit_risk_scoring::Result<DataFrame>,
) -> Result<usize> {
    let df = read_csv(input, table).with_context(|| format!("Failed to read {}", input.display()))?;

    let mut cleaned = clean(&df)?;
    write_table(&mut cleaned, output)?;
    info!(table, rows = cleaned.height(), columns = cleaned.width(), "Cleaned table saved");
    Ok(cleaned.height())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    config.logging.init("risk_etl")?;

    let start = Instant::now();
    let rows = match &cli.command {
        Command::Bureau(args) => {
            let (input, output) = args.paths(&config, "bureau.csv", "bureau_agg.parquet");
            bureau::run(&input, &output, args.applicants.as_deref())
                .context("Bureau aggregation failed")?
        }
        Command::Installments(args) => {
            let (input, output) =
                args.paths(&config, "installments_payments.csv", "installments_agg.parquet");
            installments::run(&input, &output, args.applicants.as_deref())
                .context("Installments aggregation failed")?
        }
        Command::CleanApplication(args) => {
            let (input, output) =
                args.paths(&config, "application_train.csv", "application_clean.parquet");
            clean_table(&input, &output, "application", |frame| {
                clean_application(frame, &config.cleaning)
            })?
        }
        Command::CleanPrevious(args) => {
            let (input, output) =
                args.paths(&config, "previous_application.csv", "previous_application_clean.parquet");
            clean_table(&input, &output, "previous_application", |frame| {
                clean_previous_application(frame, &config.cleaning)
            })?
        }
    };

    info!(rows, elapsed_ms = start.elapsed().as_millis() as u64, "Job completed");
    Ok(())
}
