/// Errors that can occur in the transport layer.
///
/// Only "no usable response" is an error here. A `401` or a `500` is a
/// response like any other and is handed back as an `ApiResponse`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never got a response (DNS, refused, reset, TLS, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out before the server answered.
    #[error("request timed out")]
    Timeout,

    /// The base URL and route path don't form a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request could not be built (e.g. a bad multipart content type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
