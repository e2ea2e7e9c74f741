//! Error types for data parsing in dishtemp-types.

use thiserror::Error;

/// Errors that can occur when parsing probe or task-response data.
///
/// This error type is platform-agnostic and does not include
/// probe-hook errors (those belong in dishtemp-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The value is not a finite number.
    #[error("Invalid temperature: {0:?}")]
    InvalidTemperature(String),

    /// The value does not name a temperature unit.
    #[error("Unknown temperature unit: {0:?} (expected C or F)")]
    UnknownUnit(String),

    /// The value does not name a probe status.
    #[error("Unknown probe status: {0:?}")]
    UnknownStatus(String),
}

/// Result type alias using dishtemp-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
