//! Core error types for the Pocketbook engine.
//!
//! This module defines storage-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage
//! layer, and remote failures are carried as [`GatewayError`].

use thiserror::Error;

use crate::utils::money::format_cents;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the ledger engine.
///
/// Every write operation surfaces exactly one of these; the `Display` output
/// is the human-readable message shown to the user.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(
        "Insufficient funds: requested {}, available {}",
        format_cents(*requested),
        format_cents(*available)
    )]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The safe-to-spend invariant no longer holds. Mutations stay blocked
    /// until the ledger is reconciled.
    #[error("Ledger inconsistency: {0}")]
    Inconsistency(String),

    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Whether the caller may retry the same request later.
    ///
    /// Only read paths should act on this; mutations are never retried
    /// automatically because a retry could duplicate a money movement.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Gateway(e) => e.retry_class() == RetryClass::WithBackoff,
            _ => false,
        }
    }

    /// Whether a failed write may still have been applied remotely.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Error::Gateway(e) if e.outcome_unknown())
    }
}

/// Retry classification for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Terminal; retrying will not help.
    Never,
    /// Transient; retry with backoff.
    WithBackoff,
}

/// Failures talking to the bank gateway or a credit-data provider.
///
/// `Clone` so that a single in-flight fetch can hand the same error to every
/// coalesced caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Request to {service} timed out")]
    Timeout { service: String },

    #[error("Rate limited by {service}")]
    RateLimited { service: String },

    #[error("Network error talking to {service}: {message}")]
    Network { service: String, message: String },

    #[error("{service} rejected the request: {message}")]
    Remote { service: String, message: String },

    #[error("Malformed response from {service}: {message}")]
    Decode { service: String, message: String },

    #[error("Missing credentials for {service}")]
    MissingCredentials { service: String },
}

impl GatewayError {
    pub fn timeout(service: impl Into<String>) -> Self {
        Self::Timeout {
            service: service.into(),
        }
    }

    pub fn remote(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn decode(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn network(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Returns the retry classification for this error.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            GatewayError::Timeout { .. }
            | GatewayError::RateLimited { .. }
            | GatewayError::Network { .. } => RetryClass::WithBackoff,
            GatewayError::Remote { .. }
            | GatewayError::Decode { .. }
            | GatewayError::MissingCredentials { .. } => RetryClass::Never,
        }
    }

    /// A timed-out, dropped or garbled reply says nothing about whether the
    /// request was executed. Everything else is a definite answer.
    pub fn outcome_unknown(&self) -> bool {
        match self {
            GatewayError::Decode { .. } => true,
            GatewayError::Remote { .. } | GatewayError::MissingCredentials { .. } => false,
            _ => self.retry_class() == RetryClass::WithBackoff,
        }
    }
}

/// Storage-agnostic error type for local persistence.
///
/// The storage layer converts Diesel/r2d2 failures into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Validation errors for user input.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Cannot move money between the same account")]
    SameAccount,

    #[error("Amount must be greater than zero (got {})", format_cents(*.0))]
    NonPositiveAmount(i64),

    #[error("Day of month must be between 1 and 31 (got {0})")]
    InvalidDayOfMonth(u32),

    #[error("Invalid frequency '{0}'")]
    InvalidFrequency(String),

    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Failed to parse amount: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Unexpected(err.to_string())
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message_is_human_readable() {
        let err = Error::InsufficientFunds {
            requested: 10001,
            available: 10000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: requested $100.01, available $100.00"
        );
    }

    #[test]
    fn test_timeouts_are_retryable_but_rejections_are_not() {
        assert!(Error::from(GatewayError::timeout("bank")).is_retryable());
        assert!(!Error::from(GatewayError::remote("bank", "nope")).is_retryable());
        assert!(!Error::NotFound("pocket".into()).is_retryable());
    }

    #[test]
    fn test_only_definite_rejections_have_a_known_outcome() {
        assert!(Error::from(GatewayError::timeout("bank")).outcome_unknown());
        assert!(Error::from(GatewayError::network("bank", "reset")).outcome_unknown());
        assert!(Error::from(GatewayError::decode("bank", "bad json")).outcome_unknown());
        assert!(!Error::from(GatewayError::remote("bank", "declined")).outcome_unknown());
        assert!(!Error::Validation(ValidationError::SameAccount).outcome_unknown());
    }
}
