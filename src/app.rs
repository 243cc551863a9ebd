//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the requested pipeline stage
//! - prints a summary and writes the stage checkpoints

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Command, CompareArgs, RunArgs, config_from_args};
use crate::curve::{MIN_SPLINE_POINTS, drop_sparse_rows};
use crate::domain::{ColumnLabel, PipelineConfig, TimeFrame};
use crate::error::AppError;
use crate::io::{
    DISCOUNT_FACTORS_FILE, INTERPOLATED_CURVE_FILE, RATE_MATRIX_FILE, cds_returns_file, return_diff_file,
    risky_durations_file, write_frame_csv,
};
use crate::report;

pub mod pipeline;

/// Entry point for the `cdsr` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Rates(args) => handle_rates(&args),
        Command::Discount(args) => handle_discount(&args),
        Command::Cds(args) => handle_cds(&args),
        Command::Returns(args) => handle_returns(&args),
        Command::Compare(args) => handle_compare(&args),
    }
}

/// Log to stderr so stdout stays a clean report. `RUST_LOG` overrides the default level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn resolve(args: &RunArgs) -> Result<PipelineConfig, AppError> {
    let config = config_from_args(args);
    config.validate()?;
    Ok(config)
}

fn no_rate_data() -> Result<(), AppError> {
    eprintln!("No rate data loaded; nothing to compute.");
    Ok(())
}

fn handle_rates(args: &RunArgs) -> Result<(), AppError> {
    let config = resolve(args)?;
    let Some(matrix) = pipeline::load_rate_matrix(&config)? else {
        return no_rate_data();
    };
    let (_, dropped) = drop_sparse_rows(&matrix, MIN_SPLINE_POINTS);

    let path = config.output_dir.join(RATE_MATRIX_FILE);
    write_checkpoint(&path, &matrix)?;
    println!("{}", report::format_rates_summary(&matrix, &dropped, &path));
    Ok(())
}

fn handle_discount(args: &RunArgs) -> Result<(), AppError> {
    let config = resolve(args)?;
    let Some(run) = pipeline::run_curve(&config)? else {
        return no_rate_data();
    };

    write_checkpoint(&config.output_dir.join(RATE_MATRIX_FILE), &run.matrix)?;
    write_checkpoint(&config.output_dir.join(INTERPOLATED_CURVE_FILE), &run.curve)?;
    let path = config.output_dir.join(DISCOUNT_FACTORS_FILE);
    write_checkpoint(&path, &run.discount)?;
    println!("{}", report::format_curve_summary(&run, &path));
    Ok(())
}

fn handle_cds(args: &RunArgs) -> Result<(), AppError> {
    let config = resolve(args)?;
    let cds = pipeline::run_cds(&config)?;
    println!(
        "{}",
        report::format_cds_summary(&cds.portfolio, config.method, &cds.cache_path)
    );
    Ok(())
}

fn handle_returns(args: &RunArgs) -> Result<(), AppError> {
    let config = resolve(args)?;
    let Some(run) = pipeline::run_returns(&config)? else {
        return no_rate_data();
    };

    let path = write_returns(&config, &run)?;
    println!(
        "{}",
        report::format_returns_summary(&run.output, config.method, &path)
    );
    Ok(())
}

fn handle_compare(args: &CompareArgs) -> Result<(), AppError> {
    let config = resolve(&args.run)?;
    let Some((run, comparison)) = pipeline::run_compare(&config, &args.actual, args.cutoff)? else {
        return no_rate_data();
    };

    write_returns(&config, &run)?;
    let diff_path = config.output_dir.join(return_diff_file(config.method.as_str()));
    write_checkpoint(&diff_path, &comparison.diff)?;
    println!("{}", report::format_comparison(&comparison, args.cutoff));
    println!("Wrote {}", diff_path.display());
    Ok(())
}

fn write_returns(config: &PipelineConfig, run: &pipeline::ReturnsRun) -> Result<std::path::PathBuf, AppError> {
    let method = config.method.as_str();
    write_checkpoint(&config.output_dir.join(DISCOUNT_FACTORS_FILE), &run.curve.discount)?;
    write_checkpoint(&config.output_dir.join(risky_durations_file(method)), &run.output.durations)?;
    let path = config.output_dir.join(cds_returns_file(method));
    write_checkpoint(&path, &run.output.returns)?;
    Ok(path)
}

fn write_checkpoint<C: ColumnLabel>(path: &Path, frame: &TimeFrame<C>) -> Result<(), AppError> {
    write_frame_csv(path, frame)?;
    tracing::debug!(path = %path.display(), rows = frame.len(), "wrote checkpoint");
    Ok(())
}
