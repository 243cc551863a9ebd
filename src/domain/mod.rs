//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the date-indexed table (`TimeFrame`) and its column labels
//! - stage outputs as table aliases (`RateMatrix`, `DiscountFactors`, ...)
//! - raw CDS observations and run configuration

pub mod frame;
pub mod types;

pub use frame::*;
pub use types::*;
