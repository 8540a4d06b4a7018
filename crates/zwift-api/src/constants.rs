//! Zwift API constants
//!
//! Public client configuration matching the Zwift game client. These values
//! are not secrets; they identify the client application. The actual secrets
//! (passwords, tokens) live in the client's credential and token state.

use std::time::Duration;

/// OAuth host for password and refresh-token exchange
pub const AUTH_HOST: &str = "secure.zwift.com";

/// Production REST API host
pub const API_HOST: &str = "us-or-rly101.zwift.com";

/// Token endpoint path on the auth host (Keycloak realm)
pub const TOKEN_PATH: &str = "/auth/realms/zwift/protocol/openid-connect/token";

/// Public OAuth client ID (same as the game client)
pub const GAME_CLIENT_ID: &str = "Zwift Game Client";

/// Client-identification headers sent on every API call
pub const PLATFORM: &str = "OSX";
pub const SOURCE: &str = "Game Client";
pub const USER_AGENT: &str =
    "CNL/3.30.8 (macOS 13 Ventura; Darwin Kernel 22.4.0) zwift/1.0.110983 curl/7.78.0";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pagination page size
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default pagination page cap (0 means unlimited)
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Scheduled silent refresh fires this long before token expiry
pub const REFRESH_LEAD_MS: u64 = 10_000;
