//! Error types for LoopHub operations.

use thiserror::Error;

/// Result type alias for LoopHub operations.
pub type Result<T> = std::result::Result<T, LoopHubError>;

/// Main error type for LoopHub operations.
#[derive(Error, Debug)]
pub enum LoopHubError {
    /// Database errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller is authenticated but not allowed to do this
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Missing, unknown or expired credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The request conflicts with existing state (duplicate username, slug, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Too many requests
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The offline queue has no room for another action
    #[error("Offline queue full: {0}")]
    QueueFull(String),

    /// Transport-level failures talking to the server
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoopHubError {
    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new not-found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new permission error.
    pub fn permission_denied<T: ToString>(msg: T) -> Self {
        Self::PermissionDenied(msg.to_string())
    }

    /// Creates a new unauthorized error.
    pub fn unauthorized<T: ToString>(msg: T) -> Self {
        Self::Unauthorized(msg.to_string())
    }

    /// Creates a new conflict error.
    pub fn conflict<T: ToString>(msg: T) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Creates a new rate limit error.
    pub fn rate_limited<T: ToString>(msg: T) -> Self {
        Self::RateLimited(msg.to_string())
    }

    /// Creates a new queue-full error.
    pub fn queue_full<T: ToString>(msg: T) -> Self {
        Self::QueueFull(msg.to_string())
    }

    /// Creates a new network error.
    pub fn network<T: ToString>(msg: T) -> Self {
        Self::Network(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }
}
