//! Bearer-token auth client for the Zwift REST API
//!
//! Wraps the low-level transport with password/refresh-token exchange, token
//! expiry tracking, and an optional scheduled silent refresh. Domain calls go
//! through `fetch`/`fetch_json`/`fetch_paged`, which fold ordinary HTTP error
//! responses into a uniform wrapper instead of returning `Err`.
//!
//! Token state lives behind an `RwLock`; overlapping `authenticate` calls are
//! not serialized; the last writer wins. Callers wanting strict ordering must
//! not overlap authenticate calls on one instance.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use common::{ApiResponse, Secret};
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::constants::{
    API_HOST, AUTH_HOST, DEFAULT_PAGE_LIMIT, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT, PLATFORM,
    REFRESH_LEAD_MS, SOURCE, USER_AGENT,
};
use crate::error::{Error, Result};
use crate::token::{self, AuthToken};
use transport::{RequestOptions, Transport};

/// Options for a single `fetch` call.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Override the API host (or pass a full `http(s)://` origin).
    pub host: Option<String>,
    /// Override the method. Defaults follow the transport (POST with body).
    pub method: Option<Method>,
    /// Skip the bearer header and the liveness check.
    pub no_auth: bool,
    /// Serialize this value as the JSON request body.
    pub json: Option<serde_json::Value>,
    /// Sets the `Zwift-Api-Version` header.
    pub api_version: Option<String>,
    /// Query string parameters, appended to any already in the path.
    pub query: Vec<(String, String)>,
    /// Per-request timeout. Defaults to 30 seconds.
    pub timeout: Option<Duration>,
    /// Explicit allow-list of success statuses. Default: any status < 400.
    pub ok: Option<Vec<u16>>,
}

/// Options for a `fetch_paged` call.
#[derive(Debug, Clone)]
pub struct PagedOptions {
    pub fetch: FetchOptions,
    /// Initial offset.
    pub start: usize,
    /// Page size (0 falls back to the default of 100).
    pub limit: usize,
    /// Maximum number of pages to fetch; 0 means unlimited.
    pub page_limit: usize,
}

impl Default for PagedOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            start: 0,
            limit: DEFAULT_PAGE_SIZE,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Per-page callback for `fetch_paged`; return `false` to stop paginating.
pub type OnPage<'a, T> = &'a mut (dyn FnMut(&[T]) -> bool + Send);

/// Construction options for [`ZwiftApi`].
#[derive(Debug, Clone, Default)]
pub struct ZwiftApiOptions {
    /// Override the auth host (or pass a full `http(s)://` origin).
    pub auth_host: Option<String>,
    /// Override the API host (or pass a full `http(s)://` origin).
    pub api_host: Option<String>,
    /// Schedule a silent background refresh shortly before token expiry.
    pub auto_refresh: bool,
}

struct Inner {
    transport: Transport,
    auth_host: String,
    api_host: String,
    username: String,
    password: Secret<String>,
    auto_refresh: bool,
    token: RwLock<Option<AuthToken>>,
    refresh_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(slot) = self.refresh_task.get_mut() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Bearer-token auth client. Cheap to clone; clones share token and jar state.
#[derive(Clone)]
pub struct ZwiftApi {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ZwiftApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZwiftApi")
            .field("username", &self.inner.username)
            .finish_non_exhaustive()
    }
}

impl ZwiftApi {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::with_options(username, password, ZwiftApiOptions::default())
    }

    pub fn with_options(
        username: impl Into<String>,
        password: impl Into<String>,
        options: ZwiftApiOptions,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                transport: Transport::new()?,
                auth_host: options.auth_host.unwrap_or_else(|| AUTH_HOST.to_string()),
                api_host: options.api_host.unwrap_or_else(|| API_HOST.to_string()),
                username: username.into(),
                password: Secret::new(password.into()),
                auto_refresh: options.auto_refresh,
                token: RwLock::new(None),
                refresh_task: StdMutex::new(None),
            }),
        })
    }

    pub fn username(&self) -> &str {
        &self.inner.username
    }

    /// Authenticate this client.
    ///
    /// An externally supplied unexpired token is adopted without a network
    /// call. Otherwise a held token with a refresh token is refreshed, falling
    /// back to a password exchange if the refresh is rejected. With no token
    /// and no credentials this is a configuration error.
    pub async fn authenticate(&self, existing: Option<AuthToken>) -> Result<AuthToken> {
        if let Some(token) = existing {
            let valid = token.is_valid();
            *self.inner.token.write().await = Some(token.clone());
            if valid {
                debug!(username = %self.inner.username, "adopted externally supplied token");
                return Ok(token);
            }
        }

        let held = self.inner.token.read().await.clone();
        if let Some(held) = held.filter(|t| !t.refresh_token.is_empty()) {
            match self.refresh_exchange(&held.refresh_token).await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    warn!(username = %self.inner.username, error = %e,
                        "refresh exchange failed, falling back to password login");
                }
            }
        }

        if !self.inner.username.is_empty() && !self.inner.password.expose().is_empty() {
            let token = token::exchange_password(
                &self.inner.transport,
                &self.inner.auth_host,
                &self.inner.username,
                self.inner.password.expose(),
            )
            .await?;
            debug!(username = %self.inner.username, "password exchange succeeded");
            Ok(self.store_token(token).await)
        } else {
            Err(Error::CredentialsNotSet)
        }
    }

    /// Whether a live token is held. Pure inspection, no network probe.
    pub async fn is_authenticated(&self) -> bool {
        self.inner
            .token
            .read()
            .await
            .as_ref()
            .is_some_and(AuthToken::is_valid)
    }

    /// Snapshot of the held token, for hand-off to another instance.
    pub async fn current_token(&self) -> Option<AuthToken> {
        self.inner.token.read().await.clone()
    }

    /// Drop the held token and cancel any scheduled refresh.
    pub async fn clear_token(&self) {
        *self.inner.token.write().await = None;
        if let Ok(mut slot) = self.inner.refresh_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    async fn refresh_exchange(&self, refresh_token: &str) -> Result<AuthToken> {
        let token =
            token::exchange_refresh(&self.inner.transport, &self.inner.auth_host, refresh_token)
                .await?;
        debug!(username = %self.inner.username, "token refresh succeeded");
        Ok(self.store_token(token).await)
    }

    /// Replace the held token wholesale and reschedule the silent refresh.
    async fn store_token(&self, token: AuthToken) -> AuthToken {
        *self.inner.token.write().await = Some(token.clone());
        self.schedule_refresh(token.expires_at);
        token
    }

    /// (Re)schedule the silent refresh at `expires_at - REFRESH_LEAD_MS`.
    ///
    /// The task holds only a `Weak` reference, so a dropped client is never
    /// kept alive by its timer; the previous task is always aborted first.
    fn schedule_refresh(&self, expires_at: u64) {
        if !self.inner.auto_refresh {
            return;
        }
        let refresh_at = expires_at.saturating_sub(REFRESH_LEAD_MS);
        let delay = Duration::from_millis(refresh_at.saturating_sub(token::now_ms()));
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let api = ZwiftApi { inner };
            let held = api.inner.token.read().await.clone();
            let Some(held) = held.filter(|t| !t.refresh_token.is_empty()) else {
                return;
            };
            if let Err(e) = api.refresh_exchange(&held.refresh_token).await {
                // Keep the previous token; the next authenticate() recovers.
                warn!(username = %api.inner.username, error = %e, "scheduled token refresh failed");
            }
        });
        if let Ok(mut slot) = self.inner.refresh_task.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Issue one API call and fold HTTP error statuses into the wrapper.
    ///
    /// Transport-level failures (network, timeout) propagate as `Err`; use
    /// `fetch_json` to have those folded as well.
    pub async fn fetch(
        &self,
        path: &str,
        mut options: FetchOptions,
        headers: HeaderMap,
        mut body: Option<String>,
    ) -> Result<ApiResponse<String>> {
        let mut merged = default_headers();
        for (name, value) in headers.iter() {
            merged.insert(name.clone(), value.clone());
        }

        if !options.no_auth {
            let token = self.inner.token.read().await.clone();
            let token = token.filter(AuthToken::is_valid).ok_or(Error::AuthRequired)?;
            let bearer = format!("Bearer {}", token.access_token);
            merged.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&bearer).map_err(|e| Error::Header(e.to_string()))?,
            );
        }

        if let Some(json) = options.json.take() {
            body = Some(serde_json::to_string(&json).map_err(|e| Error::BodySerialize(e.to_string()))?);
            merged.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        } else if body.is_some() && !merged.contains_key(CONTENT_TYPE) {
            merged.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        }

        if let Some(version) = &options.api_version {
            merged.insert(
                HeaderName::from_static("zwift-api-version"),
                HeaderValue::from_str(version).map_err(|e| Error::Header(e.to_string()))?,
            );
        }

        let host = options.host.as_deref().unwrap_or(&self.inner.api_host);
        let mut url = Url::parse(&format!(
            "{}/{}",
            base_url(host),
            path.trim_start_matches('/')
        ))
        .map_err(|e| transport::Error::InvalidUrl(format!("{path}: {e}")))?;
        if !options.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(options.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let raw = self
            .inner
            .transport
            .request(
                url.as_str(),
                body,
                RequestOptions {
                    method: options.method,
                    headers: merged,
                    timeout: Some(options.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT)),
                },
            )
            .await?;

        let success = match &options.ok {
            Some(allowed) => allowed.contains(&raw.status),
            None => raw.status < 400,
        };
        if success {
            Ok(ApiResponse::ok(raw.status, raw.body))
        } else {
            Ok(ApiResponse::err(raw.status, raw.body.clone(), Some(raw.body)))
        }
    }

    /// `fetch` plus JSON decoding. Never returns `Err`: transport failures and
    /// parse failures are folded into the wrapper. 204 and 404 responses are
    /// treated as having no body.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: FetchOptions,
        mut headers: HeaderMap,
    ) -> ApiResponse<T> {
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let response = match self.fetch(path, options, headers, None).await {
            Ok(response) => response,
            Err(e) => {
                return ApiResponse {
                    status_code: 0,
                    body: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let status_code = response.status_code;
        if status_code == 204 || status_code == 404 {
            return response.with_body(None);
        }
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

    /// Fetch a paginated collection, concatenating pages in order.
    ///
    /// Advances `start` by the number of items accumulated, stopping on a
    /// short page, the page cap, or an `on_page` callback returning `false`.
    /// The first page-level error is returned as-is without continuing.
    pub async fn fetch_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        options: PagedOptions,
        headers: HeaderMap,
        mut on_page: Option<OnPage<'_, T>>,
    ) -> ApiResponse<Vec<T>> {
        let PagedOptions {
            fetch,
            start,
            limit,
            page_limit,
        } = options;
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };

        let mut results: Vec<T> = Vec::new();
        let mut start = start;
        let mut pages = 0usize;
        loop {
            let mut page_options = fetch.clone();
            page_options
                .query
                .retain(|(k, _)| k != "limit" && k != "start");
            page_options
                .query
                .push(("limit".to_string(), limit.to_string()));
            page_options
                .query
                .push(("start".to_string(), start.to_string()));

            let response = self
                .fetch_json::<Vec<T>>(path, page_options, headers.clone())
                .await;
            if response.status_code >= 400 || response.is_err() {
                return response;
            }
            let Some(page) = response.body else {
                return ApiResponse {
                    status_code: response.status_code,
                    body: None,
                    error: response.error,
                };
            };

            let page_len = page.len();
            let accumulated = results.len();
            results.extend(page);
            if page_len > 0 {
                if let Some(callback) = on_page.as_deref_mut() {
                    if !callback(&results[accumulated..]) {
                        break;
                    }
                }
            }
            pages += 1;
            if page_len < limit || (page_limit != 0 && pages >= page_limit) {
                break;
            }
            start = results.len();
        }

        ApiResponse::ok(200, results)
    }
}

/// Origin for a host that may or may not carry an explicit scheme.
pub(crate) fn base_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{host}")
    }
}

/// Client-identification headers attached to every call.
pub(crate) fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("platform"), HeaderValue::from_static(PLATFORM));
    headers.insert(HeaderName::from_static("source"), HeaderValue::from_static(SOURCE));
    headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::now_ms;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/auth/realms/zwift/protocol/openid-connect/token";

    fn token_body(access: &str, refresh: &str, expires_in: u64) -> String {
        format!(
            r#"{{"access_token":"{access}","refresh_token":"{refresh}","expires_in":{expires_in}}}"#
        )
    }

    fn valid_token() -> AuthToken {
        AuthToken {
            access_token: "at_live".into(),
            refresh_token: "rt_live".into(),
            expires_at: now_ms() + 3_600_000,
        }
    }

    fn expired_token() -> AuthToken {
        AuthToken {
            access_token: "at_stale".into(),
            refresh_token: "rt_stale".into(),
            expires_at: 1_000,
        }
    }

    /// Client pointed at a mock server for both hosts.
    fn client(server: &MockServer) -> ZwiftApi {
        ZwiftApi::with_options(
            "rider@example.com",
            "pw",
            ZwiftApiOptions {
                auth_host: Some(server.uri()),
                api_host: Some(server.uri()),
                auto_refresh: false,
            },
        )
        .unwrap()
    }

    /// Client whose hosts point at a port nothing listens on, to prove that
    /// a code path makes no network call.
    fn offline_client() -> ZwiftApi {
        ZwiftApi::with_options(
            "rider@example.com",
            "pw",
            ZwiftApiOptions {
                auth_host: Some("http://127.0.0.1:1".into()),
                api_host: Some("http://127.0.0.1:1".into()),
                auto_refresh: false,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn password_exchange_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=rider%40example.com"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(token_body("at_new", "rt_new", 3600)),
            )
            .mount(&server)
            .await;

        let api = client(&server);
        let token = api.authenticate(None).await.unwrap();
        assert_eq!(token.access_token, "at_new");
        assert!(token.expires_at > now_ms());
        assert!(api.is_authenticated().await);
    }

    #[tokio::test]
    async fn rejected_login_surfaces_error_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"error_description":"Invalid username or password"}"#),
            )
            .mount(&server)
            .await;

        let api = client(&server);
        let err = api.authenticate(None).await.unwrap_err();
        assert!(
            err.to_string().contains("Invalid username or password"),
            "got: {err}"
        );
        assert!(!api.is_authenticated().await);
    }

    #[tokio::test]
    async fn rejected_login_without_description_uses_default_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("{}"))
            .mount(&server)
            .await;

        let api = client(&server);
        let err = api.authenticate(None).await.unwrap_err();
        assert!(err.to_string().contains("Login failed"), "got: {err}");
    }

    #[tokio::test]
    async fn no_credentials_is_a_configuration_error() {
        let api = ZwiftApi::new("", "").unwrap();
        let err = api.authenticate(None).await.unwrap_err();
        assert!(matches!(err, Error::CredentialsNotSet), "got: {err}");
    }

    #[tokio::test]
    async fn valid_external_token_is_adopted_without_network() {
        let api = offline_client();
        let token = api.authenticate(Some(valid_token())).await.unwrap();
        assert_eq!(token.access_token, "at_live");
        assert!(api.is_authenticated().await);
    }

    #[tokio::test]
    async fn expired_external_token_triggers_refresh_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt_stale"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(token_body("at_refreshed", "rt_next", 3600)),
            )
            .mount(&server)
            .await;

        let api = client(&server);
        let token = api.authenticate(Some(expired_token())).await.unwrap();
        assert_eq!(token.access_token, "at_refreshed");
        assert_eq!(token.refresh_token, "rt_next");
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_password_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{}"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=password"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(token_body("at_pw", "rt_pw", 3600)),
            )
            .mount(&server)
            .await;

        let api = client(&server);
        let token = api.authenticate(Some(expired_token())).await.unwrap();
        assert_eq!(token.access_token, "at_pw");
    }

    #[tokio::test]
    async fn expired_token_reports_unauthenticated() {
        let api = offline_client();
        // Adoption stores the token even though it is expired; the refresh
        // and password fallbacks both fail offline.
        let _ = api.authenticate(Some(expired_token())).await;
        assert!(!api.is_authenticated().await);
        assert!(api.current_token().await.is_some());
    }

    #[tokio::test]
    async fn token_hands_off_to_a_fresh_instance() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(token_body("at_a", "rt_a", 3600)),
            )
            .mount(&server)
            .await;

        let first = client(&server);
        let token = first.authenticate(None).await.unwrap();

        let fresh = offline_client();
        fresh.authenticate(Some(token)).await.unwrap();
        assert!(fresh.is_authenticated().await);
    }

    #[tokio::test]
    async fn auto_refresh_replaces_token_before_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=password"))
            .respond_with(
                // expires_in of 1s puts the refresh point in the past, so the
                // scheduled refresh fires immediately.
                ResponseTemplate::new(200).set_body_string(token_body("at_first", "rt_first", 1)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt_first"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(token_body("at_auto", "rt_auto", 3600)),
            )
            .mount(&server)
            .await;

        let api = ZwiftApi::with_options(
            "rider@example.com",
            "pw",
            ZwiftApiOptions {
                auth_host: Some(server.uri()),
                api_host: Some(server.uri()),
                auto_refresh: true,
            },
        )
        .unwrap();
        api.authenticate(None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        let current = api.current_token().await.unwrap();
        assert_eq!(current.access_token, "at_auto");
        assert!(api.is_authenticated().await);
    }

    #[tokio::test]
    async fn clear_token_discards_state() {
        let api = offline_client();
        api.authenticate(Some(valid_token())).await.unwrap();
        assert!(api.is_authenticated().await);
        api.clear_token().await;
        assert!(!api.is_authenticated().await);
        assert!(api.current_token().await.is_none());
    }

    #[tokio::test]
    async fn fetch_without_token_requires_auth() {
        let api = offline_client();
        let err = api
            .fetch("/api/profiles/1", FetchOptions::default(), HeaderMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthRequired), "got: {err}");
    }

    #[tokio::test]
    async fn fetch_attaches_bearer_and_client_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profiles/42"))
            .and(header("authorization", "Bearer at_live"))
            .and(header("platform", "OSX"))
            .and(header("source", "Game Client"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let response = api
            .fetch("/api/profiles/42", FetchOptions::default(), HeaderMap::new(), None)
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);
        assert!(!response.is_err());
    }

    #[tokio::test]
    async fn fetch_http_error_folds_into_wrapper() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let response = api
            .fetch("/api/broken", FetchOptions::default(), HeaderMap::new(), None)
            .await
            .unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert_eq!(response.body.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn fetch_ok_allowlist_overrides_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/maybe"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let options = FetchOptions {
            ok: Some(vec![200, 401]),
            ..Default::default()
        };
        let response = api
            .fetch("/api/maybe", options, HeaderMap::new(), None)
            .await
            .unwrap();
        assert_eq!(response.status_code, 401);
        assert!(!response.is_err());
    }

    #[tokio::test]
    async fn fetch_json_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/thing"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":7}"#))
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let response = api
            .fetch_json::<serde_json::Value>("/api/thing", FetchOptions::default(), HeaderMap::new())
            .await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body.unwrap()["id"], 7);
    }

    #[tokio::test]
    async fn fetch_json_treats_204_and_404_as_no_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/empty"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not json"))
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();

        let empty = api
            .fetch_json::<serde_json::Value>("/api/empty", FetchOptions::default(), HeaderMap::new())
            .await;
        assert_eq!(empty.status_code, 204);
        assert!(empty.body.is_none());
        assert!(!empty.is_err());

        let missing = api
            .fetch_json::<serde_json::Value>("/api/missing", FetchOptions::default(), HeaderMap::new())
            .await;
        assert_eq!(missing.status_code, 404);
        assert!(missing.body.is_none());
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn fetch_json_folds_parse_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let response = api
            .fetch_json::<serde_json::Value>("/api/garbage", FetchOptions::default(), HeaderMap::new())
            .await;
        assert!(response.is_err());
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn fetch_json_folds_transport_failures() {
        let api = offline_client();
        api.authenticate(Some(valid_token())).await.unwrap();
        let response = api
            .fetch_json::<serde_json::Value>("/api/thing", FetchOptions::default(), HeaderMap::new())
            .await;
        assert_eq!(response.status_code, 0);
        assert!(response.is_err());
    }

    fn page_json(range: std::ops::Range<usize>) -> String {
        let items: Vec<String> = range.map(|i| i.to_string()).collect();
        format!("[{}]", items.join(","))
    }

    #[tokio::test]
    async fn fetch_paged_stops_on_short_page_and_concatenates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .and(query_param("start", "0"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_json(0..100)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .and(query_param("start", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_json(100..137)))
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let response = api
            .fetch_paged::<u64>("/api/list", PagedOptions::default(), HeaderMap::new(), None)
            .await;
        let items = response.body.unwrap();
        assert_eq!(items.len(), 137);
        assert_eq!(items[0], 0);
        assert_eq!(items[136], 136);
    }

    #[tokio::test]
    async fn fetch_paged_callback_false_stops_even_on_full_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .and(query_param("start", "0"))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_json(0..3)))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let options = PagedOptions {
            limit: 3,
            ..Default::default()
        };
        let mut seen_pages = 0usize;
        let mut stop = |page: &[u64]| {
            seen_pages += 1;
            assert_eq!(page.len(), 3);
            false
        };
        let response = api
            .fetch_paged::<u64>("/api/list", options, HeaderMap::new(), Some(&mut stop))
            .await;
        assert_eq!(seen_pages, 1);
        assert_eq!(response.body.unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn fetch_paged_respects_page_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_json(0..3)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .and(query_param("start", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_json(3..6)))
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let options = PagedOptions {
            limit: 3,
            page_limit: 2,
            ..Default::default()
        };
        let response = api
            .fetch_paged::<u64>("/api/list", options, HeaderMap::new(), None)
            .await;
        assert_eq!(response.body.unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn fetch_paged_propagates_first_page_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        api.authenticate(Some(valid_token())).await.unwrap();
        let response = api
            .fetch_paged::<u64>("/api/list", PagedOptions::default(), HeaderMap::new(), None)
            .await;
        assert_eq!(response.status_code, 500);
        assert!(response.is_err());
        assert!(response.body.is_none());
    }
}
