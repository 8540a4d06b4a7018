//! Error types for bearer-token auth operations

/// Errors from the bearer-token auth client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No username/password configured and no token to refresh.
    #[error("login credentials not set")]
    CredentialsNotSet,

    /// An authenticated call was attempted without a live token.
    #[error("auth token not set")]
    AuthRequired,

    /// The token endpoint rejected the credentials (401).
    #[error("login failed: {0}")]
    Login(String),

    /// The token endpoint returned an unexpected status or malformed body.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid header value: {0}")]
    Header(String),

    #[error("failed to serialize request body: {0}")]
    BodySerialize(String),

    #[error(transparent)]
    Transport(#[from] transport::Error),
}

/// Result alias for bearer-token auth operations.
pub type Result<T> = std::result::Result<T, Error>;
