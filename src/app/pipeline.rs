//! Shared stage logic behind every `cdsr` subcommand.
//!
//! Each stage builds on the previous ones:
//! rates -> curve/discount -> (with CDS portfolios) returns -> comparison
//!
//! Handlers in `app` only print and write checkpoints.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::credit::{CdsReturnOutput, ReturnComparison, aggregate_cached, cds_returns, compare_returns};
use crate::curve::{CurveRun, build_curve_from_matrix, merge_rates};
use crate::data::{
    CdsSource, CsvCdsSource, CsvRateSource, FedYieldCurveClient, FredClient, RateSource, SyntheticCdsSource,
    UnavailableSource,
};
use crate::domain::{CdsPortfolio, CdsSourceSpec, PipelineConfig, RateMatrix};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::io::read_actual_returns_csv;

/// Merged month-end rate matrix, from a checkpoint or the live sources.
///
/// `Ok(None)` when no rate source delivered data.
pub fn load_rate_matrix(config: &PipelineConfig) -> AnalyticsResult<Option<RateMatrix>> {
    if let Some(path) = &config.rates_csv {
        let matrix = CsvRateSource::new(path).pull(config.start_date, config.end_date)?;
        info!(path = %path.display(), rows = matrix.len(), "loaded rate matrix checkpoint");
        return Ok((!matrix.is_empty()).then_some(matrix));
    }

    let fred = short_rate_source(FredClient::from_env());
    let fed = FedYieldCurveClient::new();
    merge_rates(fred.as_ref(), &fed, config.start_date, config.end_date)
}

/// The FRED client, or an always-failing stand-in when it cannot be built.
///
/// A missing `FRED_API_KEY` then costs the 3- and 6-month points only.
pub fn short_rate_source(client: AnalyticsResult<FredClient>) -> Box<dyn RateSource> {
    match client {
        Ok(client) => Box::new(client),
        Err(e) => {
            warn!(error = %e, "FRED client unavailable; continuing with long rates only");
            Box::new(UnavailableSource::new("fred", e.to_string()))
        }
    }
}

/// Rate matrix through discount factors.
pub fn run_curve(config: &PipelineConfig) -> AnalyticsResult<Option<CurveRun>> {
    match load_rate_matrix(config)? {
        Some(matrix) => build_curve_from_matrix(matrix).map(Some),
        None => Ok(None),
    }
}

pub fn cds_source(config: &PipelineConfig) -> AnalyticsResult<Box<dyn CdsSource>> {
    match &config.cds_source {
        Some(CdsSourceSpec::Csv(dir)) => Ok(Box::new(CsvCdsSource::new(dir))),
        Some(CdsSourceSpec::Synthetic { tickers, seed }) => Ok(Box::new(SyntheticCdsSource::new(*tickers, *seed))),
        None => Err(AnalyticsError::invalid(
            "no CDS source configured: pass --cds-dir <DIR> or --synthetic",
        )),
    }
}

#[derive(Debug, Clone)]
pub struct CdsRun {
    pub portfolio: CdsPortfolio,
    pub quotes: usize,
    pub cache_path: PathBuf,
}

/// CDS quotes through the monthly quantile-portfolio panel.
pub fn run_cds(config: &PipelineConfig) -> AnalyticsResult<CdsRun> {
    let source = cds_source(config)?;
    run_cds_from(source.as_ref(), config)
}

pub fn run_cds_from(source: &dyn CdsSource, config: &PipelineConfig) -> AnalyticsResult<CdsRun> {
    let observations = source.pull(config.cds_start_year..=config.cds_end_year)?;
    info!(source = source.name(), quotes = observations.len(), "pulled CDS quotes");
    let (portfolio, cache_path) =
        aggregate_cached(&observations, config.method, config.n_quantiles, &config.data_dir)?;
    Ok(CdsRun {
        portfolio,
        quotes: observations.len(),
        cache_path,
    })
}

#[derive(Debug, Clone)]
pub struct ReturnsRun {
    pub curve: CurveRun,
    pub cds: CdsRun,
    pub output: CdsReturnOutput,
}

/// Discount factors and CDS portfolios through monthly returns.
///
/// `Ok(None)` when no rate data was loaded.
pub fn run_returns(config: &PipelineConfig) -> AnalyticsResult<Option<ReturnsRun>> {
    let Some(curve) = run_curve(config)? else {
        return Ok(None);
    };
    let cds = run_cds(config)?;
    combine(curve, cds, config).map(Some)
}

pub fn combine(curve: CurveRun, cds: CdsRun, config: &PipelineConfig) -> AnalyticsResult<ReturnsRun> {
    let output = cds_returns(&curve.discount, &cds.portfolio, config.loss_given_default)?;
    Ok(ReturnsRun { curve, cds, output })
}

/// Returns plus a comparison against the published series in `actual`.
pub fn run_compare(
    config: &PipelineConfig,
    actual: &Path,
    cutoff: NaiveDate,
) -> AnalyticsResult<Option<(ReturnsRun, ReturnComparison)>> {
    let published = read_actual_returns_csv(actual)?;
    let Some(run) = run_returns(config)? else {
        return Ok(None);
    };
    let comparison = compare_returns(&run.output.returns, &published, cutoff)?;
    Ok(Some((run, comparison)))
}
