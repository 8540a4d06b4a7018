//! Error types for the cookie-login auth client

/// Errors from the cookie-login auth client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A login hop answered with a status outside the expected protocol.
    #[error("expected {expected} got {got}")]
    UnexpectedStatus { expected: &'static str, got: u16 },

    /// A 302 hop came back without a `Location` header.
    #[error("expected location header")]
    MissingLocation,

    /// The login page HTML carried no `<form action>` to submit to.
    #[error("expected login submit URL")]
    MissingLoginForm,

    /// The session died mid-flight and one re-authentication didn't revive it.
    #[error("session expired and re-authentication failed")]
    SessionExpired,

    #[error("invalid header value: {0}")]
    Header(String),

    #[error(transparent)]
    Transport(#[from] transport::Error),
}

/// Result alias for cookie-login auth operations.
pub type Result<T> = std::result::Result<T, Error>;
