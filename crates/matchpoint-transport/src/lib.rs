//! HTTP transport abstraction for Matchpoint.
//!
//! Provides the [`HttpTransport`] trait that the session layer sends its
//! requests through, the [`ApiRequest`]/[`ApiResponse`] pair that crosses
//! it, and the [`Route`]/[`Endpoints`] table requests are addressed with.
//!
//! # Feature Flags
//!
//! - `reqwest` (default): [`ReqwestTransport`], a real HTTP transport

mod error;
#[cfg(feature = "reqwest")]
mod http;
mod route;

pub use error::TransportError;
#[cfg(feature = "reqwest")]
pub use http::ReqwestTransport;
pub use route::{Endpoints, Method, Route};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A file attached to a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name the server reads the file from.
    pub field: String,
    pub file_name: String,
    /// MIME type, e.g. `image/jpeg`.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    /// Text fields plus an optional file.
    Multipart {
        fields: Vec<(String, String)>,
        file: Option<FilePart>,
    },
}

/// One request to the API, addressed by [`Route`].
///
/// `Clone` so the authorized client can re-issue it after a token refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub route: Route,
    pub body: Body,
    /// Bearer token to send in `Authorization`, if any.
    pub bearer: Option<String>,
    /// Per-request timeout; `None` uses the client default.
    pub timeout: Option<Duration>,
    /// Set on the single re-issue after a refresh, so it is never
    /// refreshed again.
    pub is_retry: bool,
}

impl ApiRequest {
    pub fn new(method: Method, route: Route) -> Self {
        Self {
            method,
            route,
            body: Body::Empty,
            bearer: None,
            timeout: None,
            is_retry: false,
        }
    }

    pub fn get(route: Route) -> Self {
        Self::new(Method::Get, route)
    }

    pub fn post(route: Route) -> Self {
        Self::new(Method::Post, route)
    }

    pub fn put(route: Route) -> Self {
        Self::new(Method::Put, route)
    }

    pub fn delete(route: Route) -> Self {
        Self::new(Method::Delete, route)
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    #[must_use]
    pub fn multipart(mut self, fields: Vec<(String, String)>, file: Option<FilePart>) -> Self {
        self.body = Body::Multipart { fields, file };
        self
    }

    #[must_use]
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether this request targets a public route.
    pub fn is_public(&self) -> bool {
        self.route.is_public(self.method)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Status code plus body.
///
/// The body is the parsed JSON when the server sent JSON, a string value
/// when it sent something else, and `Value::Null` when it sent nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// Sends one request and returns the server's response.
///
/// Implementations resolve the route to a URL, attach the bearer token if
/// the request carries one, and never retry or refresh on their own; that
/// is the session layer's job.
///
/// A trait so the session layer can run against the real network in
/// production and against a scripted transport in tests.
pub trait HttpTransport: Send + Sync + 'static {
    /// Sends the request.
    ///
    /// # Returns
    /// - `Ok(ApiResponse)`: the server answered, whatever the status
    /// - `Err(TransportError)`: no response (network failure, timeout)
    fn send(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

impl<T: HttpTransport> HttpTransport for Arc<T> {
    fn send(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send {
        (**self).send(request)
    }
}
