//! Error taxonomy shared by every pin request entry point.

use thiserror::Error;

use crate::types::UserId;

/// Result type alias for pin request operations.
pub type PinResult<T> = Result<T, PinError>;

/// Errors raised across the request/accept/commit protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    /// Malformed or untransportable input, or missing mandatory item fields.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the current state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A required user session is locked.
    #[error("user {0} is locked or not running")]
    SessionLocked(UserId),

    /// Internal state failed a consistency check.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
}

impl PinError {
    /// Builds the error for an item missing fields mandatory for creation.
    #[must_use]
    pub fn missing_fields(item_id: &str, fields: &[&str]) -> Self {
        Self::InvalidArgument(format!(
            "item {item_id:?} is missing mandatory fields: {}",
            fields.join(", ")
        ))
    }
}
