//! Bearer-token authenticated client for the Zwift REST API
//!
//! Authentication flow:
//! 1. `ZwiftApi::authenticate(None)` exchanges username/password for a token
//! 2. Domain calls attach the bearer header and fold HTTP errors into
//!    `ApiResponse` wrappers
//! 3. A held refresh token is exchanged when the access token lapses,
//!    optionally on a schedule shortly before expiry (`auto_refresh`)
//! 4. Tokens are plain serializable structs; hand one to another instance's
//!    `authenticate(Some(token))` to share a session without a network call

pub mod client;
pub mod constants;
mod endpoints;
pub mod error;
pub mod token;

pub use client::{FetchOptions, OnPage, PagedOptions, ZwiftApi, ZwiftApiOptions};
pub use error::{Error, Result};
pub use token::AuthToken;
