//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of errors that can occur,
//! from configuration and I/O issues to instrument-specific problems.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from the `config` crate, typically file
//!   parsing or format issues in the configuration files.
//! - **`Configuration`**: Semantic errors in the configuration, such as
//!   values that parse but are logically invalid (e.g., a non-positive
//!   sampling interval). These are caught during the validation step.
//! - **`Io`**: Wraps standard `std::io::Error` for all file I/O issues.
//! - **`Instrument`**: Errors originating from instrument drivers, anything
//!   from a communication failure to an unparseable response.
//! - **`SweepTimeout`**: The VNA never acknowledged sweep completion within
//!   the configured window.
//! - **`TraceLength`**: A fetched sweep trace does not match the configured
//!   point count; this rejects the whole run before any export is written.
//!
//! By using `#[from]`, `DaqError` can be seamlessly created from underlying
//! error types, simplifying error handling throughout the application with
//! the `?` operator.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// The application error type.
#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Instrument error: {0}")]
    Instrument(String),

    #[error("Sweep did not report completion within {0:?}")]
    SweepTimeout(Duration),

    #[error("Trace at {field_t} T has {actual} points, expected {expected}")]
    TraceLength {
        field_t: f64,
        expected: usize,
        actual: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("VISA support not enabled. Rebuild with --features instrument_visa")]
    VisaFeatureDisabled,
}
