use thiserror::Error;

/// Errors returned by the enrichment API client.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Transport-level failure (connection refused, timeout, TLS, ...).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status code.
    #[error("enrichment api error {status}: {message}")]
    Api { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, EnrichError>;
