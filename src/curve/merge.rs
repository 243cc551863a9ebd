//! Rate merger: short and long sources onto one month-end grid.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::data::RateSource;
use crate::domain::RateMatrix;
use crate::error::AnalyticsResult;

/// Fewest maturities a spline can be fitted through.
pub const MIN_SPLINE_POINTS: usize = 2;

/// Pull both sources, join them on date, keep the last valid quote per month
/// and restrict to `[start, end]`.
///
/// A failing source is logged and the other is used alone. Returns `Ok(None)`
/// when neither source delivered anything.
pub fn merge_rates(
    short: &dyn RateSource,
    long: &dyn RateSource,
    start: NaiveDate,
    end: NaiveDate,
) -> AnalyticsResult<Option<RateMatrix>> {
    let pulled: Vec<RateMatrix> = [short, long]
        .into_iter()
        .filter_map(|source| match source.pull(start, end) {
            Ok(matrix) if matrix.is_empty() => {
                warn!(source = source.name(), %start, %end, "rate source returned no rows");
                None
            }
            Ok(matrix) => Some(matrix),
            Err(e) => {
                warn!(source = source.name(), error = %e, "rate source failed");
                None
            }
        })
        .collect();

    let Some(joined) = pulled.iter().skip(1).fold(pulled.first().cloned(), |acc, next| {
        acc.map(|acc| acc.outer_join(next))
    }) else {
        warn!("no rate data loaded");
        return Ok(None);
    };

    let monthly = joined.resample_month_end().between(start, end);
    info!(
        rows = monthly.len(),
        maturities = monthly.columns().len(),
        "merged rate matrix"
    );
    Ok(Some(monthly))
}

/// Split off rows with fewer than `min_points` valid maturities.
///
/// Every dropped date is logged so gaps in the output series can be audited.
pub fn drop_sparse_rows(matrix: &RateMatrix, min_points: usize) -> (RateMatrix, Vec<NaiveDate>) {
    let (kept, dropped) = matrix.retain_rows(|_, row| valid_points(row) >= min_points);
    for date in &dropped {
        let actual = matrix.row(*date).map(valid_points).unwrap_or(0);
        warn!(%date, actual, required = min_points, "dropping rate row with too few maturities");
    }
    (kept, dropped)
}

pub(crate) fn valid_points(row: &[Option<f64>]) -> usize {
    row.iter().filter(|v| v.is_some()).count()
}
