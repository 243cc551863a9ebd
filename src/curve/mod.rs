//! Treasury curve construction.
//!
//! - merge short and long rate sources onto a month-end grid (`merge`)
//! - natural cubic spline per date onto quarterly maturities (`interpolate`)
//! - zero-coupon discount factors at quarterly horizons (`discount`)

pub mod discount;
pub mod interpolate;
pub mod merge;

pub use discount::{
    CurveRun, DEFAULT_QUARTERS, build_curve, build_curve_from_matrix, calc_discount, discount, discount_factor,
};
pub use interpolate::{interpolate, interpolate_at, quarterly_ladder};
pub use merge::{MIN_SPLINE_POINTS, drop_sparse_rows, merge_rates};
