//! Discount factor engine.
//!
//! For horizon `q` quarters and the interpolated decimal rate `r` at `3q`
//! months: `DF(q) = exp(-(q * r) / 4)`.

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use tracing::info;

use crate::curve::interpolate::interpolate;
use crate::curve::merge::{MIN_SPLINE_POINTS, drop_sparse_rows, merge_rates};
use crate::data::RateSource;
use crate::domain::{DiscountFactors, InterpolatedCurve, Maturity, Quarter, RateMatrix, TimeFrame};
use crate::error::{AnalyticsError, AnalyticsResult};

/// Horizons used by the return engine: 1..=20 quarters (five years).
pub const DEFAULT_QUARTERS: RangeInclusive<u32> = 1..=20;

pub fn discount_factor(quarters: u32, rate: f64) -> f64 {
    (-(f64::from(quarters) * rate) / 4.0).exp()
}

/// Discount factors at each horizon in `quarters`, read off the curve at `3q` months.
pub fn discount(curve: &InterpolatedCurve, quarters: RangeInclusive<u32>) -> AnalyticsResult<DiscountFactors> {
    let horizons: Vec<Quarter> = quarters.map(Quarter).collect();
    let mut positions = Vec::with_capacity(horizons.len());
    for q in &horizons {
        let maturity = Maturity(q.0 * 3);
        let pos = curve.column_index(maturity).ok_or_else(|| {
            AnalyticsError::invalid(format!("curve has no {}-month rate for quarter {}", maturity.0, q.0))
        })?;
        positions.push(pos);
    }

    let mut factors = TimeFrame::new(horizons.clone());
    for (date, row) in curve.rows() {
        let values = horizons
            .iter()
            .zip(&positions)
            .map(|(q, pos)| row[*pos].map(|r| discount_factor(q.0, r)))
            .collect();
        factors.insert_row(date, values)?;
    }
    Ok(factors)
}

/// Everything the curve stage produces for one window.
#[derive(Debug, Clone)]
pub struct CurveRun {
    /// Merged month-end matrix, before sparse rows are dropped.
    pub matrix: RateMatrix,
    /// Dates removed for having fewer than two maturities.
    pub dropped: Vec<NaiveDate>,
    pub curve: InterpolatedCurve,
    pub discount: DiscountFactors,
}

/// Drop sparse rows, interpolate and discount an already merged matrix.
pub fn build_curve_from_matrix(matrix: RateMatrix) -> AnalyticsResult<CurveRun> {
    let (usable, dropped) = drop_sparse_rows(&matrix, MIN_SPLINE_POINTS);
    if usable.is_empty() {
        return Err(AnalyticsError::invalid(
            "no date in the rate matrix has enough maturities to fit a curve",
        ));
    }
    let curve = interpolate(&usable)?;
    let discount = discount(&curve, DEFAULT_QUARTERS)?;
    info!(
        rows = discount.len(),
        dropped = dropped.len(),
        "discount factors computed"
    );
    Ok(CurveRun {
        matrix,
        dropped,
        curve,
        discount,
    })
}

/// Merge, interpolate and discount. `Ok(None)` when no rate data was loaded.
pub fn build_curve(
    short: &dyn RateSource,
    long: &dyn RateSource,
    start: NaiveDate,
    end: NaiveDate,
) -> AnalyticsResult<Option<CurveRun>> {
    match merge_rates(short, long, start, end)? {
        Some(matrix) => build_curve_from_matrix(matrix).map(Some),
        None => Ok(None),
    }
}

/// Discount factors straight from the rate sources.
pub fn calc_discount(
    short: &dyn RateSource,
    long: &dyn RateSource,
    start: NaiveDate,
    end: NaiveDate,
) -> AnalyticsResult<Option<DiscountFactors>> {
    Ok(build_curve(short, long, start, end)?.map(|run| run.discount))
}
