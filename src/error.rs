//! Error types for the timer scheduler.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced synchronously by scheduler operations.
///
/// Operations on unknown or stale timer ids are not errors;
/// `cancel` and `restart` report those as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A caller-supplied value was out of range (negative delay, NaN, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The outstanding-timer limit has been reached.
    #[error("timer capacity exceeded: at most {limit} outstanding timers")]
    CapacityExceeded { limit: usize },

    /// Configuration could not be parsed or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error is the capacity rejection from an `add_*` call.
    #[must_use]
    pub const fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}
