//! Shared domain types.
//!
//! Rates are stored as DECIMALS everywhere inside the crate (`0.0125` for 1.25%).
//! Source adapters convert published percent quotes on the way in. CDS par
//! spreads are decimals as delivered by the CDS source (`0.01` for 100bp).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::frame::{Maturity, Quantile, Quarter, TimeFrame};
use crate::error::{AnalyticsError, AnalyticsResult};

/// Date × maturity matrix of observed rates (sparse tenors).
pub type RateMatrix = TimeFrame<Maturity>;
/// Date × quarterly-maturity matrix of interpolated rates (dense, 3..=120 months).
pub type InterpolatedCurve = TimeFrame<Maturity>;
/// Date × horizon matrix of zero-coupon discount factors.
pub type DiscountFactors = TimeFrame<Quarter>;
/// Date × quantile matrix of aggregated par spreads.
pub type CdsPortfolio = TimeFrame<Quantile>;
/// Date × quantile matrix of risky annuity durations.
pub type RiskyDurations = TimeFrame<Quantile>;
/// Date × quantile matrix of monthly CDS returns.
pub type CdsReturns = TimeFrame<Quantile>;

/// Par-yield tenors supplied by the long-rate source.
pub const LONG_MATURITIES: [u32; 10] = [12, 24, 36, 48, 60, 72, 84, 96, 108, 120];

/// Convert a published percent quote to a decimal rate.
pub fn percent_to_decimal(value: f64) -> f64 {
    value / 100.0
}

/// One raw CDS quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdsObservation {
    pub date: NaiveDate,
    pub ticker: String,
    pub tenor: String,
    pub country: String,
    /// Par spread as a decimal.
    pub parspread: f64,
}

/// How spreads within one (date, quantile) bucket are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    Mean,
    Median,
    /// Spread-weighted mean, each name weighted by its own spread.
    Weighted,
}

impl AggregationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationMethod::Mean => "mean",
            AggregationMethod::Median => "median",
            AggregationMethod::Weighted => "weighted",
        }
    }
}

/// Where CDS quotes come from for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum CdsSourceSpec {
    /// Directory of yearly exports (`cds_{year}.csv`).
    Csv(PathBuf),
    /// Seeded synthetic panel (offline runs).
    Synthetic { tickers: usize, seed: u64 },
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from CLI flags, `.env` and defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// Previously written rate-matrix checkpoint to use instead of live pulls.
    pub rates_csv: Option<PathBuf>,

    /// Required by the CDS stages only.
    pub cds_source: Option<CdsSourceSpec>,
    pub cds_start_year: i32,
    pub cds_end_year: i32,

    pub method: AggregationMethod,
    pub n_quantiles: usize,
    pub loss_given_default: f64,

    /// Cache directory (CDS monthly aggregates).
    pub data_dir: PathBuf,
    /// Checkpoint directory (one CSV per stage).
    pub output_dir: PathBuf,
}

impl PipelineConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.start_date > self.end_date {
            return Err(AnalyticsError::invalid(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.cds_start_year > self.cds_end_year {
            return Err(AnalyticsError::invalid(format!(
                "CDS year range {}..={} is empty",
                self.cds_start_year, self.cds_end_year
            )));
        }
        if self.n_quantiles == 0 {
            return Err(AnalyticsError::invalid("quantile count must be > 0"));
        }
        if !(self.loss_given_default.is_finite()
            && self.loss_given_default > 0.0
            && self.loss_given_default <= 1.0)
        {
            return Err(AnalyticsError::invalid(format!(
                "loss given default must be in (0, 1], got {}",
                self.loss_given_default
            )));
        }
        if let Some(CdsSourceSpec::Synthetic { tickers: 0, .. }) = self.cds_source {
            return Err(AnalyticsError::invalid("synthetic ticker count must be > 0"));
        }
        Ok(())
    }
}
