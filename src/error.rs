//! Error types for the authoring core
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::transport::TransportError;

/// All error types that can surface past the fetch boundary
#[derive(Debug, Error)]
pub enum AuthoringError {
    /// Resource key was empty or blank
    #[error("Invalid resource key: {0:?}")]
    InvalidKey(String),

    /// Course still being provisioned after every retry was spent
    #[error("Course not ready: {key} (gave up after {attempts} attempts)")]
    CourseNotReady { key: String, attempts: u32 },

    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for authoring operations
pub type Result<T> = std::result::Result<T, AuthoringError>;
