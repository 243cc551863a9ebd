//! Command-line parsing for the CDS returns pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! analytics code. Every stage takes the same [`RunArgs`]; flags fall back to
//! environment variables (and `.env`) where a deployment would set them.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::credit::{DEFAULT_LOSS_GIVEN_DEFAULT, DEFAULT_QUANTILES};
use crate::domain::{AggregationMethod, CdsSourceSpec, PipelineConfig};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cdsr", version, about = "Treasury discount curves and CDS portfolio returns")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands, one per pipeline stage.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pull short and long Treasury rates and write the month-end rate matrix.
    Rates(RunArgs),
    /// Interpolate the curve and write quarterly discount factors.
    Discount(RunArgs),
    /// Aggregate CDS quotes into monthly quantile-portfolio spreads.
    Cds(RunArgs),
    /// Compute risky durations and monthly returns of the CDS portfolios.
    Returns(RunArgs),
    /// Compare calculated returns against published CDS test-asset returns.
    Compare(CompareArgs),
}

/// Options shared by every stage.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// First date of the rate window (YYYY-MM-DD).
    #[arg(long, default_value = "2001-01-02")]
    pub start: NaiveDate,

    /// Last date of the rate window (YYYY-MM-DD).
    #[arg(long, default_value = "2024-01-31")]
    pub end: NaiveDate,

    /// Reuse a rate-matrix CSV instead of pulling FRED and the Fed yield-curve pages.
    #[arg(long, value_name = "CSV")]
    pub rates_csv: Option<PathBuf>,

    /// Directory of yearly CDS exports (`cds_{year}.csv`).
    #[arg(long, env = "CDS_DIR", value_name = "DIR", conflicts_with = "synthetic")]
    pub cds_dir: Option<PathBuf>,

    /// Use a seeded synthetic CDS panel instead of exports.
    #[arg(long)]
    pub synthetic: bool,

    /// Ticker count of the synthetic panel.
    #[arg(long, default_value_t = 60)]
    pub synthetic_tickers: usize,

    /// Seed of the synthetic panel.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First CDS year to load.
    #[arg(long, default_value_t = 2001)]
    pub cds_start_year: i32,

    /// Last CDS year to load.
    #[arg(long, default_value_t = 2023)]
    pub cds_end_year: i32,

    /// How spreads are combined within a quantile portfolio.
    #[arg(short = 'm', long, value_enum, default_value_t = AggregationMethod::Mean)]
    pub method: AggregationMethod,

    /// Number of spread-ranked portfolios.
    #[arg(short = 'q', long, default_value_t = DEFAULT_QUANTILES)]
    pub quantiles: usize,

    /// Loss given default used in the hazard-rate approximation.
    #[arg(long, default_value_t = DEFAULT_LOSS_GIVEN_DEFAULT)]
    pub lgd: f64,

    /// Cache directory (CDS monthly aggregates).
    #[arg(long, env = "DATA_DIR", default_value = "_data")]
    pub data_dir: PathBuf,

    /// Checkpoint directory (one CSV per stage).
    #[arg(long, env = "OUTPUT_DIR", default_value = "_output")]
    pub output_dir: PathBuf,
}

/// Options for `cdsr compare`.
#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Published monthly returns (`yyyymm, CDS_01 .. CDS_20`).
    #[arg(long, value_name = "CSV")]
    pub actual: PathBuf,

    /// Last month included in the comparison.
    #[arg(long, default_value = "2012-12-31")]
    pub cutoff: NaiveDate,
}

impl RunArgs {
    pub fn cds_source(&self) -> Option<CdsSourceSpec> {
        if self.synthetic {
            return Some(CdsSourceSpec::Synthetic {
                tickers: self.synthetic_tickers,
                seed: self.seed,
            });
        }
        self.cds_dir.clone().map(CdsSourceSpec::Csv)
    }
}

pub fn config_from_args(args: &RunArgs) -> PipelineConfig {
    PipelineConfig {
        start_date: args.start,
        end_date: args.end,
        rates_csv: args.rates_csv.clone(),
        cds_source: args.cds_source(),
        cds_start_year: args.cds_start_year,
        cds_end_year: args.cds_end_year,
        method: args.method,
        n_quantiles: args.quantiles,
        loss_given_default: args.lgd,
        data_dir: args.data_dir.clone(),
        output_dir: args.output_dir.clone(),
    }
}
