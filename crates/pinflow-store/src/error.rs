//! Error types for the storage layer.

use pinflow_core::{ItemId, PackageName, PinError, UserId};
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store lock was poisoned by a panicking holder.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// Item not found.
    #[error("item not found: {package}/{id} (user {user})")]
    ItemNotFound {
        package: PackageName,
        user: UserId,
        id: ItemId,
    },

    /// A consistency check failed.
    #[error("inconsistent store state: {0}")]
    Inconsistent(String),
}

impl From<StoreError> for PinError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ItemNotFound { .. } => PinError::IllegalState(err.to_string()),
            StoreError::Inconsistent(msg) => PinError::Inconsistent(msg),
            StoreError::LockPoisoned => PinError::IllegalState(err.to_string()),
        }
    }
}
