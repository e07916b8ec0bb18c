//! Object Store Error Types
//!
//! Structured error handling for remote object store operations.
//! Maps HTTP status codes to specific error variants so the cache layer can
//! distinguish a missing object from an unreachable store.

/// Object store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),
}

impl StoreError {
    /// Whether this error means the object does not exist remotely.
    ///
    /// Everything else counts as "store unavailable" for the cache layer:
    /// auth and permission failures included, since none of them say anything
    /// about whether the cached copy is current.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Create a StoreError from an HTTP status code and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => StoreError::Forbidden(body.to_string()),
            404 => StoreError::NotFound(body.to_string()),
            408 => StoreError::Timeout,
            500..=599 => StoreError::Server(status, body.to_string()),
            _ => StoreError::Request(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Create a StoreError from a reqwest transport failure
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_connect() {
            StoreError::Network(err.to_string())
        } else {
            StoreError::Request(err.to_string())
        }
    }
}
