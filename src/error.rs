//! Error types for the document service seam.

/// Errors raised by a resolver or a document gateway.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed reply: {0}")]
    Decode(String),
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend task ended before settling: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}
