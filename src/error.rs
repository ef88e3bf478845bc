//! Error types for the report pipeline.
//!
//! Malformed input never reaches this type: bad rows and bad timestamps are
//! counted and skipped where they occur. What remains are the conditions
//! that stop a step outright, such as an unreadable file or a failed call
//! to the narrative service.

use std::io;
use std::path::{Path, PathBuf};

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file or directory could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The narrative service did not answer within the call timeout
    #[error("Narrative service timed out after {} seconds", seconds)]
    Timeout { seconds: u64 },

    /// The narrative service answered with a non-success status
    #[error("Narrative service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The narrative service answered with an unusable payload
    #[error("Malformed narrative response: {0}")]
    MalformedResponse(String),

    /// Nothing usable could be extracted from the given input
    #[error("No data available in {}", path.display())]
    NoData { path: PathBuf },
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether a narrative call that failed this way is worth repeating.
    ///
    /// Timeouts, transport failures, throttling and server-side errors are
    /// transient. Anything else (bad credentials, malformed payloads) will
    /// fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Http(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Timeout { seconds: 60 }.is_retryable());
        assert!(Error::Status { status: 503, body: String::new() }.is_retryable());
        assert!(Error::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!Error::Status { status: 401, body: String::new() }.is_retryable());
        assert!(!Error::MalformedResponse("no choices".into()).is_retryable());
    }

    #[test]
    fn test_io_error_names_path() {
        let err = Error::io("/tmp/missing.jtl", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.to_string().contains("/tmp/missing.jtl"));
    }
}
