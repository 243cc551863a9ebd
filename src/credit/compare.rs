//! Calculated returns against published CDS test-asset returns.

use chrono::NaiveDate;
use tracing::info;

use crate::domain::{CdsReturns, ColumnLabel};
use crate::error::{AnalyticsError, AnalyticsResult};

/// Last month covered by the published test-asset series used for validation.
pub fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2012, 12, 31).unwrap_or(NaiveDate::MAX)
}

#[derive(Debug, Clone)]
pub struct ReturnComparison {
    pub actual: CdsReturns,
    pub calculated: CdsReturns,
    /// `(actual - calculated) * 100`, in percentage points.
    pub diff: CdsReturns,
}

/// Line up calculated returns with published ones.
///
/// Calculated rows after `cutoff` or with any missing value are dropped; the
/// published series is reindexed onto the remaining months.
pub fn compare_returns(
    calculated: &CdsReturns,
    actual: &CdsReturns,
    cutoff: NaiveDate,
) -> AnalyticsResult<ReturnComparison> {
    if calculated.columns() != actual.columns() {
        return Err(AnalyticsError::invalid(format!(
            "portfolio columns differ: calculated [{}] vs actual [{}]",
            labels(calculated),
            labels(actual)
        )));
    }

    let start = calculated.first_date().unwrap_or(cutoff);
    let (calculated, _) = calculated
        .between(start, cutoff)
        .retain_rows(|_, row| row.iter().all(Option::is_some));
    if calculated.is_empty() {
        return Err(AnalyticsError::invalid(format!(
            "no complete calculated returns on or before {cutoff}"
        )));
    }

    let actual = actual.reindex(calculated.dates());
    let diff = actual.zip_with(&calculated, |a, c| (a - c) * 100.0)?;
    info!(months = calculated.len(), "compared against published returns");
    Ok(ReturnComparison {
        actual,
        calculated,
        diff,
    })
}

fn labels(frame: &CdsReturns) -> String {
    frame
        .columns()
        .iter()
        .map(ColumnLabel::label)
        .collect::<Vec<_>>()
        .join(",")
}
