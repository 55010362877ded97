//! Error types for Studylink.

use thiserror::Error;

/// Result type alias using the Studylink error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Studylink.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error with structured details
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures at the evaluation-service boundary.
///
/// A transport failure ends the session it belongs to; it is never retried
/// automatically.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The service answered with a non-success status.
    #[error("Evaluation service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The service could not be reached.
    #[error("Network error reaching evaluation service: {message}")]
    Network { message: String },

    /// The response body stream broke mid-read.
    #[error("Evaluation stream body error: {message}")]
    Body { message: String },
}

impl TransportError {
    /// Create an API error from status code and response body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        TransportError::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        TransportError::Network {
            message: message.into(),
        }
    }

    /// Create a body-read error.
    pub fn body(message: impl Into<String>) -> Self {
        TransportError::Body {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = TransportError::api(502, "bad gateway");
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_transport_error_wraps() {
        let err: Error = TransportError::network("connection refused").into();
        assert!(err.to_string().contains("connection refused"));
    }
}
