//! Unified error types for the odds scanner.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the scanner.
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Provider fetch error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Sink delivery error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the racing-odds provider, classified for the retry policy.
///
/// The variants split into three behavioral groups: transient (retried with
/// backoff), terminal for the page (cycle abandoned, loop continues), and
/// fatal for the process (authentication, since credentials will not
/// self-repair).
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Network/transport failure (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider asked us to slow down.
    #[error("rate limited by provider (HTTP 429)")]
    RateLimited,

    /// Client-side HTTP error other than 429. Retrying will not help.
    #[error("client error: HTTP {status}")]
    Client {
        /// The 4xx status code.
        status: u16,
    },

    /// Server-side HTTP error, assumed transient.
    #[error("server error: HTTP {status}")]
    Server {
        /// The 5xx status code.
        status: u16,
    },

    /// Credentials rejected, either by HTTP status or in the query payload.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Provider-reported query errors embedded in an otherwise-OK response.
    #[error("provider query errors: {}", .0.join("; "))]
    Query(Vec<String>),

    /// Response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Retry budget exhausted; carries the last underlying failure.
    #[error("gave up after {attempts} attempts over {elapsed:?}: {source}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Wall time spent across all attempts.
        elapsed: Duration,
        /// The final failure that ended the run.
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Whether the retry policy should try this request again.
    ///
    /// 429 counts as transient; other 4xx responses and authentication
    /// failures do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_)
            | ProviderError::RateLimited
            | ProviderError::Server { .. }
            | ProviderError::Query(_)
            | ProviderError::Malformed(_) => true,
            ProviderError::Client { .. }
            | ProviderError::Authentication(_)
            | ProviderError::RetriesExhausted { .. } => false,
        }
    }

    /// Whether this failure means the credentials are bad.
    ///
    /// Authentication failures are fatal to the whole process: the poll loop
    /// stops instead of burning cycles against a closed door.
    pub fn is_authentication(&self) -> bool {
        match self {
            ProviderError::Authentication(_) => true,
            ProviderError::RetriesExhausted { source, .. } => source.is_authentication(),
            _ => false,
        }
    }
}

/// Opportunity delivery errors from the downstream sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink could not deliver the notification.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ScannerError>;
