//! Error types for pool operations

/// Errors from connection pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no credentials provided")]
    NoCredentials,

    #[error("no valid connection found ({tried} credentials tried)")]
    Exhausted { tried: usize },

    #[error("failed to build pool client: {0}")]
    Client(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
