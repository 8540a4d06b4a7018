//! Low-level HTTP transport shared by both authenticated clients
//!
//! One request at a time, explicit cookie jar semantics, no redirect
//! following, no retries. The auth clients compose a `Transport` value each;
//! there is no shared mutable base between them.

mod client;
mod error;

pub use client::{RawResponse, RequestOptions, Transport};
pub use error::{Error, Result};
