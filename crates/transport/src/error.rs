//! Error types for transport operations

/// Errors from low-level HTTP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header value: {0}")]
    Header(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("cookie jar error: {0}")]
    Jar(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
