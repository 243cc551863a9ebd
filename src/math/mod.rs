//! Mathematical utilities: natural cubic splines and cross-sectional statistics.

pub mod spline;
pub mod stats;

pub use spline::*;
pub use stats::*;
