//! Single-request HTTP client with an attached cookie jar
//!
//! Issues one HTTPS request at a time: jar cookies are merged into the
//! outgoing `Cookie` header (after any caller-supplied value), and every
//! `Set-Cookie` response header is written back into the jar keyed by the
//! request URL. Redirects are never followed; the login flows inspect 302
//! responses and `Location` headers themselves.
//!
//! Each `Transport` owns its jar exclusively; cloning shares both the
//! underlying connection pool and the jar.

use std::sync::Arc;
use std::time::Duration;

use cookie_store::CookieStore;
use reqwest::Method;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, LOCATION, SET_COOKIE};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Options for a single request.
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Override the method. Defaults to POST when a body is present, GET otherwise.
    pub method: Option<Method>,
    /// Extra request headers. A `Cookie` header here is preserved; jar cookies
    /// are appended after it.
    pub headers: HeaderMap,
    /// Cancel the in-flight request after this long. No timeout when absent.
    pub timeout: Option<Duration>,
}

/// Raw response from a single request.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    /// The `Location` response header, if present and valid UTF-8.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

/// HTTP transport with cookie jar state.
#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    jar: Arc<Mutex<CookieStore>>,
}

impl Transport {
    /// Build a transport with redirect following disabled.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self {
            http,
            jar: Arc::new(Mutex::new(CookieStore::default())),
        })
    }

    /// Issue one request.
    ///
    /// Jar cookies matching the URL are appended after any caller-supplied
    /// `Cookie` header, semicolon-separated. All `Set-Cookie` response headers
    /// are applied to the jar independently; unparsable ones are skipped.
    /// Network-level failures surface as `Error::Http`; no retry here.
    pub async fn request(
        &self,
        url: &str,
        body: Option<String>,
        options: RequestOptions,
    ) -> Result<RawResponse> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        let method = options.method.unwrap_or(if body.is_some() {
            Method::POST
        } else {
            Method::GET
        });

        let mut headers = options.headers;
        let jar_cookies = {
            let jar = self.jar.lock().await;
            jar.get_request_values(&url)
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ")
        };
        if !jar_cookies.is_empty() {
            let merged = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
                Some(existing) if !existing.is_empty() => format!("{existing}; {jar_cookies}"),
                _ => jar_cookies,
            };
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&merged).map_err(|e| Error::Header(e.to_string()))?,
            );
        }

        let mut request = self.http.request(method, url.clone()).headers(headers);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("[{url}]: {e}")))?;

        let status = response.status().as_u16();
        let response_headers = response.headers().clone();

        {
            let mut jar = self.jar.lock().await;
            for value in response_headers.get_all(SET_COOKIE) {
                let Ok(cookie_str) = value.to_str() else {
                    continue;
                };
                if let Err(e) = jar.parse(cookie_str, &url) {
                    debug!(cookie = cookie_str, error = %e, "skipping unparsable set-cookie");
                }
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("[{url}]: {e}")))?;

        Ok(RawResponse {
            status,
            headers: response_headers,
            body,
        })
    }

    /// All cookies that would be sent to `url`, as (name, value) pairs.
    pub async fn cookies_for(&self, url: &str) -> Vec<(String, String)> {
        let Ok(url) = Url::parse(url) else {
            return Vec::new();
        };
        let jar = self.jar.lock().await;
        jar.get_request_values(&url)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    /// Value of the named cookie as it would be sent to `url`, if present.
    pub async fn cookie_value(&self, url: &str, name: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let jar = self.jar.lock().await;
        jar.get_request_values(&url)
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.to_string())
    }

    /// Serialize the jar (including session cookies) to an opaque JSON blob.
    pub async fn export_cookies(&self) -> Result<String> {
        let jar = self.jar.lock().await;
        let mut buf = Vec::new();
        jar.save_incl_expired_and_nonpersistent_json(&mut buf)
            .map_err(|e| Error::Jar(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| Error::Jar(e.to_string()))
    }

    /// Replace the jar with the contents of a previously exported blob.
    pub async fn import_cookies(&self, blob: &str) -> Result<()> {
        let store = CookieStore::load_json_all(blob.as_bytes())
            .map_err(|e| Error::Jar(e.to_string()))?;
        *self.jar.lock().await = store;
        Ok(())
    }

    /// Remove every cookie from the jar.
    pub async fn clear_cookies(&self) {
        self.jar.lock().await.clear();
    }
}
