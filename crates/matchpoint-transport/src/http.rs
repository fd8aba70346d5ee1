//! [`HttpTransport`] over `reqwest`.

use serde_json::Value;
use url::Url;

use crate::{
    ApiRequest, ApiResponse, Body, Endpoints, HttpTransport, Method, TransportError,
};

/// A [`HttpTransport`] that talks to the real backend.
///
/// The `reqwest::Client` has no timeout of its own; requests that need one
/// (registration, OTP) carry it on the [`ApiRequest`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    endpoints: Endpoints,
}

impl ReqwestTransport {
    /// Creates a transport for the API rooted at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            endpoints: Endpoints::default(),
        }
    }

    /// Overrides the route → path table.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Joins the base URL and the route path.
    ///
    /// Plain concatenation rather than `Url::join`, so a base URL with a
    /// path prefix (`https://host/api`) keeps its prefix.
    fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let path = self.endpoints.path_for(&request.route);
        let base = self.base_url.as_str().trim_end_matches('/');
        let full = format!("{base}/{}", path.trim_start_matches('/'));
        Ok(Url::parse(&full)?)
    }

    fn build(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = self.url_for(request)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart { fields, file } => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                if let Some(file) = file {
                    let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.content_type)
                        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                    form = form.part(file.field.clone(), part);
                }
                builder.multipart(form)
            }
        };

        Ok(builder)
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let builder = self.build(request)?;

        tracing::debug!(
            method = %request.method,
            route = %request.route,
            retry = request.is_retry,
            "sending request"
        );

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(map_reqwest_error)?;

        tracing::debug!(route = %request.route, status, "response received");

        Ok(ApiResponse::new(status, parse_body(&text)))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
