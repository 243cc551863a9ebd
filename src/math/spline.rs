//! Natural cubic spline.
//!
//! For knots `x_0 < ... < x_{n-1}` the spline is piecewise cubic with continuous
//! first and second derivatives, and zero second derivative at both ends.
//!
//! The interior second derivatives `M_1 .. M_{n-2}` solve the tridiagonal system
//!
//! ```text
//! h_{i-1} M_{i-1} + 2 (h_{i-1} + h_i) M_i + h_i M_{i+1}
//!     = 6 * ((y_{i+1} - y_i) / h_i - (y_i - y_{i-1}) / h_{i-1})
//! ```
//!
//! with `M_0 = M_{n-1} = 0`. The system is at most a dozen rows for a Treasury
//! curve, so a dense LU solve is plenty.
//!
//! Outside the knot range the end segments' cubics are extended as-is, which
//! reproduces the usual `extrapolate=True` behavior of spline libraries.

use nalgebra::{DMatrix, DVector};

use crate::error::{AnalyticsError, AnalyticsResult};

#[derive(Debug, Clone)]
pub struct NaturalCubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Fit through `(xs[i], ys[i])`.
    ///
    /// Requires at least two knots, finite values and strictly increasing `xs`.
    /// Two knots give the straight line through them.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> AnalyticsResult<Self> {
        if xs.len() != ys.len() {
            return Err(AnalyticsError::invalid(format!(
                "spline knots and values differ in length: {} vs {}",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(AnalyticsError::invalid(format!(
                "spline needs at least 2 knots, got {}",
                xs.len()
            )));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(AnalyticsError::invalid("spline inputs must be finite"));
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalyticsError::invalid(
                "spline knots must be strictly increasing",
            ));
        }

        let m = second_derivatives(&xs, &ys)?;
        Ok(Self { xs, ys, m })
    }

    /// Evaluate the spline at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let i = self.segment(x);
        let (a, b, h) = self.weights(i, x);
        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * (h * h) / 6.0
    }

    /// Second derivative at `x`.
    pub fn second_derivative(&self, x: f64) -> f64 {
        let i = self.segment(x);
        let (a, b, _) = self.weights(i, x);
        a * self.m[i] + b * self.m[i + 1]
    }

    fn weights(&self, i: usize, x: f64) -> (f64, f64, f64) {
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        (a, b, h)
    }

    /// Index `i` of the segment `[x_i, x_{i+1}]` used for `x` (end segments outside the range).
    fn segment(&self, x: f64) -> usize {
        let last = self.xs.len() - 2;
        self.xs.partition_point(|k| *k <= x).saturating_sub(1).min(last)
    }
}

fn second_derivatives(xs: &[f64], ys: &[f64]) -> AnalyticsResult<Vec<f64>> {
    let n = xs.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return Ok(m);
    }

    let k = n - 2;
    let mut a = DMatrix::<f64>::zeros(k, k);
    let mut rhs = DVector::<f64>::zeros(k);

    for row in 0..k {
        let i = row + 1;
        let h0 = xs[i] - xs[i - 1];
        let h1 = xs[i + 1] - xs[i];
        if row > 0 {
            a[(row, row - 1)] = h0;
        }
        a[(row, row)] = 2.0 * (h0 + h1);
        if row + 1 < k {
            a[(row, row + 1)] = h1;
        }
        rhs[row] = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
    }

    let solution = a
        .lu()
        .solve(&rhs)
        .ok_or_else(|| AnalyticsError::Numerical("singular spline system".to_string()))?;

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::Numerical(
            "non-finite spline second derivatives".to_string(),
        ));
    }

    m[1..n - 1].copy_from_slice(solution.as_slice());
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn passes_through_knots_exactly() {
        let xs = vec![3.0, 6.0, 12.0, 24.0, 36.0, 60.0, 120.0];
        let ys = vec![0.015, 0.016, 0.017, 0.019, 0.02, 0.022, 0.025];
        let spline = NaturalCubicSpline::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(&ys) {
            assert_eq!(spline.eval(*x), *y);
        }
    }

    #[test]
    fn matches_hand_computed_value() {
        // M_1 = 6 * (-1 - 1) / 4 = -3, so s(0.5) = 0.5 + (0.375 * 3) / 6.
        let spline = NaturalCubicSpline::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0]).unwrap();
        assert_relative_eq!(spline.eval(0.5), 0.6875, epsilon = 1e-12);
        assert_relative_eq!(spline.eval(1.5), 0.6875, epsilon = 1e-12);
    }

    #[test]
    fn natural_boundary_has_zero_curvature_at_the_ends() {
        let spline =
            NaturalCubicSpline::new(vec![1.0, 2.0, 4.0, 7.0], vec![1.0, 3.0, 2.0, 5.0]).unwrap();
        assert_relative_eq!(spline.second_derivative(1.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(spline.second_derivative(7.0), 0.0, epsilon = 1e-12);
        assert!(spline.second_derivative(2.0).abs() > 1e-6);
    }

    #[test]
    fn linear_data_stays_linear_inside_and_outside() {
        let spline =
            NaturalCubicSpline::new(vec![12.0, 24.0, 36.0], vec![0.010, 0.012, 0.014]).unwrap();
        assert_relative_eq!(spline.eval(3.0), 0.0085, epsilon = 1e-12);
        assert_relative_eq!(spline.eval(30.0), 0.013, epsilon = 1e-12);
        assert_relative_eq!(spline.eval(120.0), 0.028, epsilon = 1e-12);
    }

    #[test]
    fn two_knots_give_a_line() {
        let spline = NaturalCubicSpline::new(vec![3.0, 6.0], vec![0.01, 0.02]).unwrap();
        assert_relative_eq!(spline.eval(9.0), 0.03, epsilon = 1e-12);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(NaturalCubicSpline::new(vec![1.0], vec![1.0]).is_err());
        assert!(NaturalCubicSpline::new(vec![1.0, 1.0], vec![1.0, 2.0]).is_err());
        assert!(NaturalCubicSpline::new(vec![1.0, 2.0], vec![1.0, f64::NAN]).is_err());
    }
}
