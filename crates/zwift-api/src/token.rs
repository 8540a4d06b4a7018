//! Token exchange against the Zwift auth host
//!
//! Handles the two token endpoint interactions:
//! 1. Password exchange (initial login, `grant_type=password`)
//! 2. Token refresh (`grant_type=refresh_token`)
//!
//! Both POST form-encoded bodies to `TOKEN_PATH` on the auth host with no
//! bearer header. `expires_in` is a delta in seconds from the response time;
//! it is converted to an absolute unix millisecond timestamp at storage time.

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use transport::{RequestOptions, Transport};

use crate::client::{base_url, default_headers};
use crate::constants::{GAME_CLIENT_ID, TOKEN_PATH};
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

/// Error body returned by the token endpoint on 401.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error_description: Option<String>,
}

/// A bearer token with its absolute expiry.
///
/// Only ever stored fully populated; a malformed token response is an error,
/// never a partial token. Serializable so it can be handed to another client
/// instance's `authenticate()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiration as unix timestamp in milliseconds (absolute, not a delta)
    pub expires_at: u64,
}

impl AuthToken {
    /// Whether the token can authenticate a call right now.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && self.expires_at > now_ms()
    }

    fn from_response(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now_ms() + response.expires_in * 1000,
        }
    }
}

/// Current unix time in milliseconds.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Exchange username/password for a token (`grant_type=password`).
pub(crate) async fn exchange_password(
    transport: &Transport,
    auth_host: &str,
    username: &str,
    password: &str,
) -> Result<AuthToken> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", GAME_CLIENT_ID)
        .append_pair("grant_type", "password")
        .append_pair("username", username)
        .append_pair("password", password)
        .finish();
    post_token_request(transport, auth_host, body).await
}

/// Obtain a fresh token from a refresh token (`grant_type=refresh_token`).
pub(crate) async fn exchange_refresh(
    transport: &Transport,
    auth_host: &str,
    refresh_token: &str,
) -> Result<AuthToken> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", GAME_CLIENT_ID)
        .append_pair("grant_type", "refresh_token")
        .append_pair("refresh_token", refresh_token)
        .finish();
    post_token_request(transport, auth_host, body).await
}

async fn post_token_request(
    transport: &Transport,
    auth_host: &str,
    body: String,
) -> Result<AuthToken> {
    let url = format!("{}{}", base_url(auth_host), TOKEN_PATH);
    let mut headers = default_headers();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );

    let response = transport
        .request(
            &url,
            Some(body),
            RequestOptions {
                method: Some(Method::POST),
                headers,
                timeout: Some(crate::constants::DEFAULT_REQUEST_TIMEOUT),
            },
        )
        .await?;

    match response.status {
        200 => {
            let token: TokenResponse = serde_json::from_str(&response.body)
                .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;
            Ok(AuthToken::from_response(token))
        }
        401 => {
            let description = serde_json::from_str::<TokenErrorResponse>(&response.body)
                .ok()
                .and_then(|e| e.error_description)
                .unwrap_or_else(|| String::from("Login failed"));
            Err(Error::Login(description))
        }
        status => Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {}",
            response.body
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"access_token":"at_abc","refresh_token":"rt_def","expires_in":3600}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "at_abc");
        assert_eq!(token.refresh_token, "rt_def");
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn auth_token_roundtrips_through_serde() {
        let token = AuthToken {
            access_token: "at_test".into(),
            refresh_token: "rt_test".into(),
            expires_at: 4_102_444_800_000,
        };
        let json = serde_json::to_string(&token).unwrap();
        let back: AuthToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_token, "at_test");
        assert_eq!(back.refresh_token, "rt_test");
        assert_eq!(back.expires_at, 4_102_444_800_000);
    }

    #[test]
    fn expires_at_is_absolute_milliseconds() {
        let before = now_ms();
        let token = AuthToken::from_response(TokenResponse {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_in: 3600,
        });
        assert!(token.expires_at >= before + 3_600_000);
        assert!(token.expires_at <= now_ms() + 3_600_000);
    }

    #[test]
    fn expired_token_is_not_valid() {
        let token = AuthToken {
            access_token: "at_still_here".into(),
            refresh_token: "rt".into(),
            expires_at: 1_000_000_000,
        };
        assert!(!token.is_valid());
    }

    #[test]
    fn empty_access_token_is_not_valid() {
        let token = AuthToken {
            access_token: String::new(),
            refresh_token: "rt".into(),
            expires_at: u64::MAX,
        };
        assert!(!token.is_valid());
    }

    #[test]
    fn future_token_is_valid() {
        let token = AuthToken {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at: now_ms() + 60_000,
        };
        assert!(token.is_valid());
    }
}
