//! Cookie-login authenticated client for the ZwiftPower portal
//!
//! The portal piggybacks on Zwift's SSO: a 3-hop redirect chain (with an
//! HTML login-form submit on the first visit) establishes a phpBB session
//! carried entirely by cookies. The serialized cookie jar is the session
//! interchange format: hand it to another instance's
//! `authenticate(Some(blob))` to skip the flow.

pub mod client;
pub mod constants;
mod endpoints;
pub mod error;
mod login;

pub use client::{PortalRequestOptions, ZwiftPowerApi, ZwiftPowerOptions};
pub use error::{Error, Result};
