//! Failure taxonomy shared by every provider adapter.

use thiserror::Error;

/// The single error surface of a provider adapter's request/parse cycle.
///
/// Adapters never panic on provider misbehavior; whatever goes wrong is
/// folded into one of these kinds and handled by the fallback chain.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The endpoint answered outside the HTTP success range.
    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Parse(String),

    /// Connection, timeout or other transport failure.
    #[error("request failed: {0}")]
    Io(String),

    /// Well-formed response without a usable (positive, present) value.
    #[error("no usable data: {0}")]
    NoData(String),
}

impl AdapterError {
    pub(crate) fn http_status(status: reqwest::StatusCode) -> Self {
        AdapterError::Http {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string(),
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Io(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}
