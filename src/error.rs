//! Crate-wide error type.

/// Error returned by the engage client library.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("missing session id; cannot open a live channel")]
    MissingSessionId,
    #[error("missing username; cannot open a live channel")]
    MissingUsername,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status} for {context}")]
    Status { status: u16, context: &'static str },
    #[error("payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("live connection lost after {attempts} attempts; rejoin the session to continue")]
    RetriesExhausted { attempts: u32 },
}
