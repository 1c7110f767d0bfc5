//! Error types for the Sveriges Radio source

use crate::stream::Termination;
use std::fmt;
use std::time::Duration;

/// Result type alias for Sveriges Radio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The caller passed a value of the wrong shape (never retried)
    TypeError,
    /// The uri belongs to us but its target does not exist
    Efault,
    /// Details were requested for a uri that never resolved
    Eseq,
    /// Network, markup or probe failure
    Upstream,
    /// The transcoder could not be started
    Process,
}

impl ErrorCode {
    /// Short code string, as used in host-facing logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TypeError => "TypeError",
            ErrorCode::Efault => "EFAULT",
            ErrorCode::Eseq => "ESEQ",
            ErrorCode::Upstream => "EUPSTREAM",
            ErrorCode::Process => "EPROCESS",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when using the Sveriges Radio source
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value of the wrong type was supplied
    #[error("Expected {expected}, got {got}")]
    TypeError { expected: &'static str, got: String },

    /// A `sverigesradio:` uri that does not resolve to anything
    #[error("{uri}: {source}")]
    NotFound {
        uri: String,
        #[source]
        source: Box<Error>,
    },

    /// Details lookup failed for a uri that was not validated first
    #[error("{uri}: {source} (call can_play_uri() before get_uri_details())")]
    Sequence {
        uri: String,
        #[source]
        source: Box<Error>,
    },

    /// The CDN lookup for a clip id failed
    #[error("SR CDN does not have id {id}: {source}")]
    Cdn {
        id: u64,
        #[source]
        source: Box<Error>,
    },

    /// The transcoder failed to start; `termination` tells how teardown went
    #[error("Failed to play Sveriges Radio ({uri}): {source}")]
    StreamStart {
        uri: String,
        #[source]
        source: Box<Error>,
        termination: Termination,
    },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Upstream answered with an error status
    #[error("API error: {0}")]
    ApiError(String),

    /// Scraping failed (HTML parsing error)
    #[error("Scraping failed: {0}")]
    ScrapingError(String),

    /// ffprobe failed or produced unusable output
    #[error("Probe failed for {url}: {message}")]
    Probe { url: String, message: String },

    /// A subprocess misbehaved
    #[error("Process error: {0}")]
    Process(String),

    /// A bounded wait expired
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a type error naming what was expected
    pub fn type_error(expected: &'static str, got: impl fmt::Display) -> Self {
        Self::TypeError {
            expected,
            got: got.to_string(),
        }
    }

    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a scraping error
    pub fn scraping_error(msg: impl Into<String>) -> Self {
        Self::ScrapingError(msg.into())
    }

    /// Whether this error signals a caller bug rather than an upstream problem
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError { .. })
    }

    /// Host-facing classification
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TypeError { .. } => ErrorCode::TypeError,
            Self::NotFound { .. } => ErrorCode::Efault,
            Self::Sequence { .. } => ErrorCode::Eseq,
            Self::StreamStart { .. } | Self::Process(_) => ErrorCode::Process,
            _ => ErrorCode::Upstream,
        }
    }
}
