//! Error types for solace-dispatch

use crate::request::TaskType;
use thiserror::Error;

/// Dispatch engine error type
#[derive(Debug, Error)]
pub enum Error {
    /// No available backend supports the requested task type
    #[error("no available backend supports task type {0}")]
    NoCandidates(TaskType),

    /// A single backend call failed (recoverable once via fallback)
    #[error("backend {backend_id} call failed: {reason}")]
    Backend {
        /// Backend that failed
        backend_id: String,
        /// Provider-reported failure reason
        reason: String,
    },

    /// Backend call exceeded the bounded wait
    #[error("backend {0} timed out after {1}ms")]
    Timeout(String, u64),

    /// In-flight dispatch was cancelled by the caller
    #[error("dispatch cancelled by caller")]
    Cancelled,

    /// Usage store error
    #[error("usage store error: {0}")]
    Store(String),

    /// Configuration rejected at load
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
