//! Error types.
//!
//! Two layers:
//!
//! - [`AnalyticsError`]: what the library stages (sources, curve, credit) return
//! - [`AppError`]: what the `cdsr` binary reports, carrying a process exit code

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the analytics core.
#[derive(Debug, Clone, Error)]
pub enum AnalyticsError {
    /// A rate or CDS source returned no data at all (every fragment failed).
    #[error("source '{origin}' unavailable: {reason}")]
    SourceUnavailable { origin: String, reason: String },

    /// Too few maturity points on a date to fit a spline.
    #[error("insufficient data on {date}: need at least {required} maturities, got {actual}")]
    InsufficientData {
        date: NaiveDate,
        required: usize,
        actual: usize,
    },

    /// Two tables that must be combined share no dates.
    #[error("no overlapping dates between {left} and {right}")]
    MergeMismatch { left: String, right: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl AnalyticsError {
    pub fn source_unavailable(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Exit code used when this error terminates the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AnalyticsError::InvalidInput(_) => 2,
            AnalyticsError::InsufficientData { .. } | AnalyticsError::MergeMismatch { .. } => 3,
            AnalyticsError::SourceUnavailable { .. } | AnalyticsError::Numerical(_) => 4,
        }
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytics_errors_map_to_exit_codes() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let insufficient = AnalyticsError::InsufficientData {
            date,
            required: 2,
            actual: 1,
        };
        let app: AppError = insufficient.into();
        assert_eq!(app.exit_code(), 3);
        assert!(app.to_string().contains("2020-01-31"));

        let app: AppError = AnalyticsError::source_unavailable("fred", "timeout").into();
        assert_eq!(app.exit_code(), 4);
        assert_eq!(app.to_string(), "source 'fred' unavailable: timeout");
    }
}
