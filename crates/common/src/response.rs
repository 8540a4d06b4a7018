//! Uniform HTTP response wrapper
//!
//! Every client call resolves to an `ApiResponse` so callers can branch on
//! `status_code` without exception handling for ordinary HTTP errors. The body
//! is a passthrough of whatever the service returned; when the call failed the
//! raw body is echoed into `error` as well.

/// Wrapper around an HTTP response from either service.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    /// HTTP status code, or 0 when the request never produced a response
    /// (transport failure, timeout).
    pub status_code: u16,
    pub body: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying a body.
    pub fn ok(status_code: u16, body: T) -> Self {
        Self {
            status_code,
            body: Some(body),
            error: None,
        }
    }

    /// Failed response; the raw body (if any) rides in both fields.
    pub fn err(status_code: u16, error: String, body: Option<T>) -> Self {
        Self {
            status_code,
            body,
            error: Some(error),
        }
    }

    /// Whether this response carries an error.
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Map the body type, carrying status and error over unchanged.
    pub fn map_body<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            status_code: self.status_code,
            body: self.body.map(f),
            error: self.error,
        }
    }

    /// Replace the body, carrying status and error over unchanged.
    pub fn with_body<U>(self, body: Option<U>) -> ApiResponse<U> {
        ApiResponse {
            status_code: self.status_code,
            body,
            error: self.error,
        }
    }
}
