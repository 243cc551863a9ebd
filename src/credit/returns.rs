//! CDS return engine.
//!
//! A reduced-form approximation turns each portfolio's par spread `s` into
//!
//! ```text
//! hazard      λ    = 4 ln(1 + s / (4 LGD))
//! survival    S(q) = exp(-q λ / 4)                     q = 1..=20 quarters
//! duration    D    = 0.25 Σ_q S(q) DF(q)
//! return      r(t) = s(t-1) / 12 + (s(t) - s(t-1)) D(t-1)
//! ```
//!
//! The first month has no predecessor, so its return is missing.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::{CdsPortfolio, CdsReturns, DiscountFactors, Quarter, RiskyDurations, TimeFrame};
use crate::error::{AnalyticsError, AnalyticsResult};

pub const DEFAULT_LOSS_GIVEN_DEFAULT: f64 = 0.6;

pub fn hazard_rate(spread: f64, loss_given_default: f64) -> f64 {
    4.0 * (1.0 + spread / (4.0 * loss_given_default)).ln()
}

pub fn survival_probability(quarters: u32, hazard: f64) -> f64 {
    (-(f64::from(quarters) * hazard) / 4.0).exp()
}

/// `0.25 Σ S(q) DF(q)` over the horizons present in `factors`; missing factors add nothing.
pub fn risky_duration(hazard: f64, horizons: &[Quarter], factors: &[Option<f64>]) -> f64 {
    0.25 * horizons
        .iter()
        .zip(factors)
        .filter_map(|(q, df)| df.map(|df| survival_probability(q.0, hazard) * df))
        .sum::<f64>()
}

#[derive(Debug, Clone)]
pub struct CdsReturnOutput {
    /// Risky duration per month and portfolio (unshifted).
    pub durations: RiskyDurations,
    pub returns: CdsReturns,
}

/// Monthly returns of each spread portfolio.
///
/// Spread gaps are back-filled first. Discount factors and spreads are then
/// aligned on their common dates; dates only one side has are logged and dropped.
pub fn cds_returns(
    discount: &DiscountFactors,
    portfolio: &CdsPortfolio,
    loss_given_default: f64,
) -> AnalyticsResult<CdsReturnOutput> {
    if !(loss_given_default.is_finite() && loss_given_default > 0.0 && loss_given_default <= 1.0) {
        return Err(AnalyticsError::invalid(format!(
            "loss given default must be in (0, 1], got {loss_given_default}"
        )));
    }

    let spreads = portfolio.bfill();
    let common = align_dates(discount, &spreads)?;
    let spreads = spreads.restrict_to(&common);
    let discount = discount.restrict_to(&common);

    let horizons = discount.columns();
    let mut durations = TimeFrame::new(spreads.columns().to_vec());
    for (date, row) in spreads.rows() {
        let Some(factors) = discount.row(date) else {
            continue;
        };
        let mut values = Vec::with_capacity(row.len());
        for spread in row {
            let value = match spread {
                Some(s) => Some(duration_for(date, *s, loss_given_default, horizons, factors)?),
                None => None,
            };
            values.push(value);
        }
        durations.insert_row(date, values)?;
    }

    let carry = spreads.shift(1).map_values(|s| s / 12.0);
    let repricing = spreads.diff().zip_with(&durations.shift(1), |ds, d| ds * d)?;
    let returns = carry.zip_with(&repricing, |c, r| c + r)?;

    info!(months = returns.len(), portfolios = returns.columns().len(), "CDS returns computed");
    Ok(CdsReturnOutput { durations, returns })
}

fn duration_for(
    date: NaiveDate,
    spread: f64,
    loss_given_default: f64,
    horizons: &[Quarter],
    factors: &[Option<f64>],
) -> AnalyticsResult<f64> {
    if 1.0 + spread / (4.0 * loss_given_default) <= 0.0 {
        return Err(AnalyticsError::Numerical(format!(
            "spread {spread} on {date} has no real hazard rate"
        )));
    }
    Ok(risky_duration(hazard_rate(spread, loss_given_default), horizons, factors))
}

fn align_dates(discount: &DiscountFactors, spreads: &CdsPortfolio) -> AnalyticsResult<BTreeSet<NaiveDate>> {
    let left: BTreeSet<NaiveDate> = discount.dates().collect();
    let right: BTreeSet<NaiveDate> = spreads.dates().collect();
    let common: BTreeSet<NaiveDate> = left.intersection(&right).copied().collect();

    if common.is_empty() {
        return Err(AnalyticsError::MergeMismatch {
            left: "discount factors".to_string(),
            right: "CDS portfolios".to_string(),
        });
    }

    let only_discount = left.len() - common.len();
    let only_spreads = right.len() - common.len();
    if only_discount > 0 || only_spreads > 0 {
        warn!(
            only_discount,
            only_spreads,
            common = common.len(),
            "dropping months not shared by discount factors and CDS portfolios"
        );
    }
    Ok(common)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::discount_factor;
    use crate::domain::Quantile;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flat_discount(rate: f64, dates: &[NaiveDate]) -> DiscountFactors {
        let horizons: Vec<Quarter> = (1..=20).map(Quarter).collect();
        TimeFrame::from_rows(
            horizons.clone(),
            dates
                .iter()
                .map(|date| (*date, horizons.iter().map(|q| Some(discount_factor(q.0, rate))).collect())),
        )
        .unwrap()
    }

    #[test]
    fn hand_computed_two_month_return() {
        let dates = [d(2020, 1, 31), d(2020, 2, 29)];
        let discount = flat_discount(0.02, &dates);
        let portfolio =
            TimeFrame::from_rows(vec![Quantile(1)], vec![(dates[0], vec![Some(0.01)]), (dates[1], vec![Some(0.015)])])
                .unwrap();

        let out = cds_returns(&discount, &portfolio, DEFAULT_LOSS_GIVEN_DEFAULT).unwrap();

        assert_relative_eq!(hazard_rate(0.01, 0.6), 0.016632040594654708, epsilon = 1e-15);
        assert_relative_eq!(out.durations.get(dates[0], Quantile(1)).unwrap(), 4.547932526519722, epsilon = 1e-12);
        assert_eq!(out.returns.get(dates[0], Quantile(1)), None);
        // 0.01 / 12 + 0.005 * 4.547932526519722
        assert_relative_eq!(out.returns.get(dates[1], Quantile(1)).unwrap(), 0.023572995965931945, epsilon = 1e-12);
    }

    #[test]
    fn durations_shrink_as_spreads_widen() {
        let horizons: Vec<Quarter> = (1..=20).map(Quarter).collect();
        let factors = vec![Some(1.0); 20];
        let tight = risky_duration(hazard_rate(0.002, 0.6), &horizons, &factors);
        let wide = risky_duration(hazard_rate(0.05, 0.6), &horizons, &factors);
        assert!(wide < tight && tight < 5.0);
        assert_relative_eq!(risky_duration(0.0, &horizons, &factors), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn spread_gaps_are_back_filled_and_dates_aligned() {
        let dates = [d(2020, 1, 31), d(2020, 2, 29), d(2020, 3, 31)];
        let discount = flat_discount(0.01, &dates[1..]);
        let portfolio = TimeFrame::from_rows(
            vec![Quantile(1), Quantile(2)],
            vec![
                (dates[0], vec![Some(0.01), Some(0.02)]),
                (dates[1], vec![None, Some(0.02)]),
                (dates[2], vec![Some(0.012), Some(0.02)]),
            ],
        )
        .unwrap();

        let out = cds_returns(&discount, &portfolio, 0.6).unwrap();
        let months: Vec<_> = out.returns.dates().collect();
        assert_eq!(months, vec![dates[1], dates[2]]);
        // February was back-filled from March, so March carries no spread change.
        assert_relative_eq!(out.returns.get(dates[2], Quantile(1)).unwrap(), 0.012 / 12.0, epsilon = 1e-15);
        assert_relative_eq!(out.returns.get(dates[2], Quantile(2)).unwrap(), 0.02 / 12.0, epsilon = 1e-15);
    }

    #[test]
    fn disjoint_dates_are_a_merge_mismatch() {
        let discount = flat_discount(0.01, &[d(2019, 1, 31)]);
        let portfolio = TimeFrame::from_rows(vec![Quantile(1)], vec![(d(2020, 1, 31), vec![Some(0.01)])]).unwrap();
        let err = cds_returns(&discount, &portfolio, 0.6).unwrap_err();
        assert!(matches!(err, AnalyticsError::MergeMismatch { .. }));
    }

    #[test]
    fn invalid_inputs_raise() {
        let dates = [d(2020, 1, 31)];
        let discount = flat_discount(0.01, &dates);
        let portfolio = TimeFrame::from_rows(vec![Quantile(1)], vec![(dates[0], vec![Some(-3.0)])]).unwrap();
        assert!(matches!(
            cds_returns(&discount, &portfolio, 0.6),
            Err(AnalyticsError::Numerical(_))
        ));
        assert!(cds_returns(&discount, &portfolio, 0.0).is_err());
    }
}
