//! Cookie-login auth client for the ZwiftPower portal
//!
//! The portal has no token endpoint; a session is established by walking the
//! phpBB SSO redirect chain (three hops, one optional form submit) and is
//! carried entirely by cookies. Requests through `get_authenticated` self-heal
//! once when the session dies mid-flight.

use std::sync::Arc;
use std::time::Duration;

use common::{ApiResponse, Secret};
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HOST, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::constants::{
    ANONYMOUS_USER_ID, LOGIN_ACCEPT, LOGIN_HOST, LOGIN_START_PATH, PORTAL_BASE_URL, SESSION_COOKIE,
    USER_COOKIE,
};
use crate::error::{Error, Result};
use crate::login::{extract_form_action, looks_like_html, resolve_location};
use transport::{RawResponse, RequestOptions, Transport};

/// Options for a single portal request.
#[derive(Debug, Default)]
pub struct PortalRequestOptions {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
    /// Treat a 200 response with an HTML body as an expired session.
    pub expect_json: bool,
}

/// Construction options for [`ZwiftPowerApi`].
#[derive(Debug, Clone, Default)]
pub struct ZwiftPowerOptions {
    /// Override the portal origin (full `http(s)://` URL).
    pub base_url: Option<String>,
    /// Override the host the login form submit is pinned to.
    pub login_host: Option<String>,
}

struct Inner {
    transport: Transport,
    username: String,
    password: Secret<String>,
    base_url: String,
    login_host: String,
}

/// Cookie-login auth client. Cheap to clone; clones share the cookie jar.
#[derive(Clone)]
pub struct ZwiftPowerApi {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ZwiftPowerApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZwiftPowerApi")
            .field("username", &self.inner.username)
            .finish_non_exhaustive()
    }
}

impl ZwiftPowerApi {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::with_options(username, password, ZwiftPowerOptions::default())
    }

    pub fn with_options(
        username: impl Into<String>,
        password: impl Into<String>,
        options: ZwiftPowerOptions,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                transport: Transport::new()?,
                username: username.into(),
                password: Secret::new(password.into()),
                base_url: options
                    .base_url
                    .map(|b| b.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| PORTAL_BASE_URL.to_string()),
                login_host: options.login_host.unwrap_or_else(|| LOGIN_HOST.to_string()),
            }),
        })
    }

    pub fn username(&self) -> &str {
        &self.inner.username
    }

    /// Establish a portal session, returning the serialized cookie jar.
    ///
    /// A saved jar blob short-circuits the whole flow when it already holds
    /// the session cookie. Otherwise the 3-hop SSO chain runs:
    ///
    /// 1. GET the SSO-initiation URL; must 302, follow `Location`
    /// 2. GET that location; 200 means a login page: scrape the form action
    ///    and POST credentials (must 302), while 302 means already authenticated
    /// 3. GET the final location; must 302, confirming the session
    ///
    /// Any unexpected status fails the whole call; there is no partial retry.
    pub async fn authenticate(&self, saved: Option<&str>) -> Result<String> {
        if let Some(blob) = saved {
            self.inner.transport.import_cookies(blob).await?;
            if self.has_session_cookie().await {
                debug!(username = %self.inner.username, "reusing saved session cookies");
                return Ok(blob.to_string());
            }
        }

        let start_url = format!("{}{}", self.inner.base_url, LOGIN_START_PATH);
        let leg1 = self
            .inner
            .transport
            .request(&start_url, None, RequestOptions::default())
            .await?;
        if leg1.status != 302 {
            return Err(Error::UnexpectedStatus {
                expected: "302",
                got: leg1.status,
            });
        }
        let leg1_location = leg1.location().ok_or(Error::MissingLocation)?.to_string();

        let leg2 = self
            .inner
            .transport
            .request(
                &resolve_location(&self.inner.base_url, &leg1_location),
                None,
                RequestOptions::default(),
            )
            .await?;
        let leg3_location = match leg2.status {
            200 => {
                let action = extract_form_action(&leg2.body).ok_or(Error::MissingLoginForm)?;
                let submit = self.submit_login_form(&action).await?;
                if submit.status != 302 {
                    return Err(Error::UnexpectedStatus {
                        expected: "302",
                        got: submit.status,
                    });
                }
                submit.location().ok_or(Error::MissingLocation)?.to_string()
            }
            302 => leg2.location().ok_or(Error::MissingLocation)?.to_string(),
            other => {
                return Err(Error::UnexpectedStatus {
                    expected: "200 or 302",
                    got: other,
                });
            }
        };

        let leg3 = self
            .inner
            .transport
            .request(
                &resolve_location(&self.inner.base_url, &leg3_location),
                None,
                RequestOptions::default(),
            )
            .await?;
        if leg3.status != 302 {
            return Err(Error::UnexpectedStatus {
                expected: "302",
                got: leg3.status,
            });
        }

        info!(username = %self.inner.username, "portal login complete");
        Ok(self.inner.transport.export_cookies().await?)
    }

    /// POST form-encoded credentials to the scraped form action URL.
    async fn submit_login_form(&self, action_url: &str) -> Result<RawResponse> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &self.inner.username)
            .append_pair("password", self.inner.password.expose())
            .finish();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(LOGIN_ACCEPT));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(
            HOST,
            HeaderValue::from_str(&self.inner.login_host)
                .map_err(|e| Error::Header(e.to_string()))?,
        );

        Ok(self
            .inner
            .transport
            .request(
                action_url,
                Some(body),
                RequestOptions {
                    method: Some(Method::POST),
                    headers,
                    timeout: None,
                },
            )
            .await?)
    }

    /// Whether the jar holds a live-looking session: the session-id cookie
    /// plus a user-id cookie that isn't the anonymous placeholder. Pure jar
    /// inspection, no network call.
    pub async fn is_authenticated(&self) -> bool {
        let base = &self.inner.base_url;
        let session = self.inner.transport.cookie_value(base, SESSION_COOKIE).await;
        let user = self.inner.transport.cookie_value(base, USER_COOKIE).await;
        session.is_some() && user.is_some_and(|u| !u.is_empty() && u != ANONYMOUS_USER_ID)
    }

    async fn has_session_cookie(&self) -> bool {
        self.inner
            .transport
            .cookie_value(&self.inner.base_url, SESSION_COOKIE)
            .await
            .is_some()
    }

    /// Issue a request, logging in first if needed, with one self-heal retry.
    ///
    /// A 401/403 response, or a nominally-200 HTML body when the caller
    /// expected JSON, means the session silently expired: all cookies are
    /// cleared and the authenticate-and-request sequence runs exactly once
    /// more. A second failure of the same kind is terminal.
    pub async fn get_authenticated(
        &self,
        url: &str,
        body: Option<String>,
        options: PortalRequestOptions,
    ) -> Result<ApiResponse<String>> {
        if !self.is_authenticated().await {
            self.authenticate(None).await?;
        }

        let first = self.request_once(url, body.clone(), &options).await?;
        if !session_rejected(&first, options.expect_json) {
            return Ok(wrap(first));
        }

        debug!(status = first.status, url, "session rejected mid-flight, re-authenticating");
        self.inner.transport.clear_cookies().await;
        self.authenticate(None).await?;

        let second = self.request_once(url, body, &options).await?;
        if session_rejected(&second, options.expect_json) {
            return Err(Error::SessionExpired);
        }
        Ok(wrap(second))
    }

    async fn request_once(
        &self,
        url: &str,
        body: Option<String>,
        options: &PortalRequestOptions,
    ) -> Result<RawResponse> {
        Ok(self
            .inner
            .transport
            .request(
                url,
                body,
                RequestOptions {
                    method: options.method.clone(),
                    headers: options.headers.clone(),
                    timeout: options.timeout,
                },
            )
            .await?)
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &Transport {
        &self.inner.transport
    }
}

fn session_rejected(response: &RawResponse, expect_json: bool) -> bool {
    matches!(response.status, 401 | 403)
        || (expect_json && response.status == 200 && looks_like_html(&response.body))
}

fn wrap(response: RawResponse) -> ApiResponse<String> {
    if response.status == 0 || response.status >= 400 {
        ApiResponse::err(response.status, response.body.clone(), Some(response.body))
    } else {
        ApiResponse::ok(response.status, response.body)
    }
}

/// Decode a portal response body as JSON, folding parse failures into the
/// wrapper the same way `fetch_json` does on the REST side.
pub(crate) fn to_json<T: DeserializeOwned>(response: ApiResponse<String>) -> ApiResponse<T> {
    let status_code = response.status_code;
    let error = response.error;
    match response.body {
        None => ApiResponse {
            status_code,
            body: None,
            error,
        },
        Some(text) => match serde_json::from_str::<T>(&text) {
            Ok(parsed) => ApiResponse {
                status_code,
                body: Some(parsed),
                error,
            },
            Err(e) => ApiResponse {
                status_code,
                body: None,
                error: Some(format!("error parsing JSON: {e}")),
            },
        },
    }
}
