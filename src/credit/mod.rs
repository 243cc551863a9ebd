//! CDS analytics.
//!
//! - quote panel → monthly quantile-portfolio spreads (`aggregate`)
//! - spreads + discount factors → risky durations and returns (`returns`)
//! - calculated vs published returns (`compare`)

pub mod aggregate;
pub mod compare;
pub mod returns;

pub use aggregate::{DEFAULT_QUANTILES, aggregate, aggregate_cached, cache_file_name, cache_key};
pub use compare::{ReturnComparison, compare_returns, default_cutoff};
pub use returns::{
    CdsReturnOutput, DEFAULT_LOSS_GIVEN_DEFAULT, cds_returns, hazard_rate, risky_duration, survival_probability,
};
