use std::time::Duration;

use thiserror::Error;
use welldoc_core::ResultError;

/// Failures at the extraction-service boundary.
///
/// Only [`Transient`](Self::Transient) (and connection-level HTTP failures)
/// are worth retrying; everything else is surfaced to the caller as is.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transient service error: {0}")]
    Transient(String),

    #[error("document rejected as malformed: {0}")]
    MalformedDocument(String),

    #[error("job for {job} did not finish within {waited:?}")]
    Timeout { job: String, waited: Duration },

    #[error("service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid object location `{0}`")]
    InvalidLocation(String),

    #[error("could not read extraction result: {0}")]
    Result(#[from] ResultError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            #[cfg(feature = "http")]
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Classify a non-success HTTP status: throttling and server faults are
    /// transient, other client errors are not.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            408 | 429 | 500..=599 => Self::Transient(format!("{status}: {body}")),
            _ => Self::Rejected { status, body },
        }
    }
}
