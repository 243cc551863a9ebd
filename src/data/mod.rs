//! Data sources.
//!
//! Rate sources deliver a [`RateMatrix`] for a date window; CDS sources deliver
//! raw quotes for a range of years. Both are traits so the pipeline can run
//! against live feeds, CSV exports or in-memory fixtures alike.
//!
//! Adapters treat each page, series or yearly table as a fragment: a failing
//! fragment is logged and skipped, and only a source with no surviving
//! fragment reports [`AnalyticsError::SourceUnavailable`].

pub mod cds;
pub mod fed_curve;
pub mod fred;
pub mod sample;

use std::ops::RangeInclusive;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::{CdsObservation, RateMatrix};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::io::read_frame_csv;

pub use cds::CsvCdsSource;
pub use fed_curve::FedYieldCurveClient;
pub use fred::FredClient;
pub use sample::SyntheticCdsSource;

/// Something that yields a date × maturity matrix of decimal rates.
pub trait RateSource {
    fn name(&self) -> &str;
    fn pull(&self, start: NaiveDate, end: NaiveDate) -> AnalyticsResult<RateMatrix>;
}

/// Something that yields raw CDS quotes for a range of calendar years.
pub trait CdsSource {
    fn name(&self) -> &str;
    fn pull(&self, years: RangeInclusive<i32>) -> AnalyticsResult<Vec<CdsObservation>>;
}

/// A rate matrix previously written by the `rates` stage.
#[derive(Debug, Clone)]
pub struct CsvRateSource {
    path: PathBuf,
}

impl CsvRateSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RateSource for CsvRateSource {
    fn name(&self) -> &str {
        "rate-matrix-csv"
    }

    fn pull(&self, start: NaiveDate, end: NaiveDate) -> AnalyticsResult<RateMatrix> {
        let matrix: RateMatrix = read_frame_csv(&self.path)
            .map_err(|e| AnalyticsError::source_unavailable(self.name(), e.to_string()))?;
        Ok(matrix.between(start, end))
    }
}

/// Stand-in for a rate source that could not be constructed (e.g. a missing API key).
///
/// Every pull fails with [`AnalyticsError::SourceUnavailable`], so a merge carries on
/// with the remaining sources.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    name: String,
    reason: String,
}

impl UnavailableSource {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl RateSource for UnavailableSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn pull(&self, _start: NaiveDate, _end: NaiveDate) -> AnalyticsResult<RateMatrix> {
        Err(AnalyticsError::source_unavailable(&self.name, &self.reason))
    }
}
