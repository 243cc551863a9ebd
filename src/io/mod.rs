//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - stage checkpoints (`checkpoint`)

pub mod checkpoint;
pub mod ingest;

pub use checkpoint::*;
pub use ingest::*;
