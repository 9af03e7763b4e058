/*!
 * Error Types
 * Centralized error handling with thiserror and serde support
 */

use crate::core::types::LockMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Locking errors with serialization support
///
/// Acquisition errors are returned to the caller only after the traversal
/// has fully unwound; listener faults are absorbed inside the dispatcher
/// and never surface here.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LockError {
    #[error("Invalid collection path: {0}")]
    InvalidPath(String),

    #[error("Timed out acquiring {mode} lock on {path}")]
    Timeout { path: String, mode: LockMode },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl LockError {
    /// Timeout errors may be retried by the caller; the others never succeed
    /// on retry.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Timeout { .. })
    }
}

/// Result type for locking operations
pub type Result<T> = std::result::Result<T, LockError>;
