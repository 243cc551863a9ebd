//! Curve interpolator: one natural cubic spline per date.
//!
//! Each row of the rate matrix is fitted independently through its valid
//! (maturity, rate) pairs and evaluated on the quarterly ladder 3, 6, ..., 120
//! months. Rows are fitted in parallel; output order follows the input dates.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::info;

use crate::curve::merge::{MIN_SPLINE_POINTS, valid_points};
use crate::domain::{InterpolatedCurve, Maturity, RateMatrix, TimeFrame};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::math::NaturalCubicSpline;

pub const LADDER_STEP_MONTHS: u32 = 3;
pub const LADDER_MAX_MONTHS: u32 = 120;

/// 3, 6, ..., 120 months.
pub fn quarterly_ladder() -> Vec<Maturity> {
    (1..=LADDER_MAX_MONTHS / LADDER_STEP_MONTHS)
        .map(|k| Maturity(k * LADDER_STEP_MONTHS))
        .collect()
}

/// Interpolate every row onto the quarterly ladder.
///
/// Fails with `InsufficientData` on the earliest row with fewer than two valid
/// maturities; callers drop such rows first (see `drop_sparse_rows`).
pub fn interpolate(matrix: &RateMatrix) -> AnalyticsResult<InterpolatedCurve> {
    interpolate_at(matrix, &quarterly_ladder())
}

/// Interpolate every row onto `ladder`.
pub fn interpolate_at(matrix: &RateMatrix, ladder: &[Maturity]) -> AnalyticsResult<InterpolatedCurve> {
    let columns = matrix.columns();
    let rows: Vec<(NaiveDate, &[Option<f64>])> = matrix.rows().collect();

    let fitted: Vec<AnalyticsResult<(NaiveDate, Vec<Option<f64>>)>> = rows
        .par_iter()
        .map(|(date, row)| interpolate_row(*date, columns, row, ladder).map(|values| (*date, values)))
        .collect();

    // Sequential pass so the reported failure is the earliest date, not the first thread to fail.
    let mut curve = TimeFrame::new(ladder.to_vec());
    for result in fitted {
        let (date, values) = result?;
        curve.insert_row(date, values)?;
    }
    info!(rows = curve.len(), tenors = ladder.len(), "interpolated curve");
    Ok(curve)
}

fn interpolate_row(
    date: NaiveDate,
    columns: &[Maturity],
    row: &[Option<f64>],
    ladder: &[Maturity],
) -> AnalyticsResult<Vec<Option<f64>>> {
    let actual = valid_points(row);
    if actual < MIN_SPLINE_POINTS {
        return Err(AnalyticsError::InsufficientData {
            date,
            required: MIN_SPLINE_POINTS,
            actual,
        });
    }

    let (xs, ys): (Vec<f64>, Vec<f64>) = columns
        .iter()
        .zip(row)
        .filter_map(|(m, v)| v.map(|rate| (f64::from(m.months()), rate)))
        .unzip();

    let spline = NaturalCubicSpline::new(xs, ys)?;
    let values: Vec<Option<f64>> = ladder
        .iter()
        .map(|m| Some(spline.eval(f64::from(m.months()))))
        .collect();

    if values.iter().any(|v| !v.is_some_and(f64::is_finite)) {
        return Err(AnalyticsError::Numerical(format!(
            "non-finite interpolated rate on {date}"
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn ladder_has_forty_quarterly_tenors() {
        let ladder = quarterly_ladder();
        assert_eq!(ladder.len(), 40);
        assert_eq!(ladder[0], Maturity(3));
        assert_eq!(ladder[39], Maturity(120));
    }

    #[test]
    fn spline_reproduces_input_maturities() {
        let columns = vec![3, 6, 12, 24, 36, 60, 84, 120].into_iter().map(Maturity).collect::<Vec<_>>();
        let rates = [0.0155, 0.0157, 0.0152, 0.0140, 0.0138, 0.0145, 0.0160, 0.0178];
        let matrix = TimeFrame::from_rows(
            columns.clone(),
            vec![(d(2020, 1, 31), rates.iter().map(|r| Some(*r)).collect())],
        )
        .unwrap();

        let curve = interpolate(&matrix).unwrap();
        for (m, r) in columns.iter().zip(rates) {
            assert_relative_eq!(curve.get(d(2020, 1, 31), *m).unwrap(), r, epsilon = 1e-14);
        }
    }

    #[test]
    fn missing_tenors_are_skipped_per_row() {
        let matrix = TimeFrame::from_rows(
            vec![Maturity(3), Maturity(12), Maturity(24), Maturity(36)],
            vec![
                (d(2020, 1, 31), vec![None, Some(0.010), Some(0.012), Some(0.014)]),
                (d(2020, 2, 29), vec![Some(0.02), Some(0.02), None, Some(0.02)]),
            ],
        )
        .unwrap();

        let curve = interpolate(&matrix).unwrap();
        assert_eq!(curve.len(), 2);
        assert_relative_eq!(curve.get(d(2020, 1, 31), Maturity(3)).unwrap(), 0.0085, epsilon = 1e-12);
        assert_relative_eq!(curve.get(d(2020, 2, 29), Maturity(90)).unwrap(), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn single_maturity_row_is_rejected() {
        let matrix = TimeFrame::from_rows(
            vec![Maturity(3), Maturity(12)],
            vec![
                (d(2020, 1, 31), vec![Some(0.01), Some(0.02)]),
                (d(2020, 2, 29), vec![None, Some(0.02)]),
                (d(2020, 3, 31), vec![None, None]),
            ],
        )
        .unwrap();

        match interpolate(&matrix) {
            Err(AnalyticsError::InsufficientData { date, required, actual }) => {
                assert_eq!(date, d(2020, 2, 29));
                assert_eq!(required, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }
}
