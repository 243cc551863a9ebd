//! `cds-curves` library crate.
//!
//! Treasury discount curves and CDS quantile-portfolio returns. The binary
//! (`cdsr`) is a thin wrapper around this library so that:
//!
//! - each pipeline stage is testable without spawning processes
//! - sources are traits, so stages run against live feeds or fixtures alike

pub mod app;
pub mod cli;
pub mod credit;
pub mod curve;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod report;
