//! Error types for the Space-Track client.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::fmt;

/// Errors that can occur when using the Space-Track client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Error raised inside the middleware stack
    #[error("HTTP request error: {0}")]
    HttpMiddleware(reqwest_middleware::Error),

    /// The login endpoint answered with `{"Login": "Failed"}`
    #[error("Authentication failed: Space-Track rejected the supplied credentials")]
    Authentication,

    /// Unknown request class, conflicting stream flags, or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query field that is neither a class predicate nor a rest predicate
    #[error("'{class}' got an unexpected argument '{key}'")]
    UnexpectedArgument {
        /// Request class being queried
        class: String,
        /// Offending field name
        key: String,
    },

    /// Non-2xx response mapped to a structured kind
    #[error(transparent)]
    Http(Box<HttpError>),

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Response bytes could not be decoded with the declared charset
    #[error("Decode error: {0}")]
    Decode(String),

    /// Response body is not the JSON shape expected
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns the HTTP status for status-mapped errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http(err) => Some(err.status),
            ClientError::Transport(err) => err.status(),
            _ => None,
        }
    }

    /// Returns true if this is a status-mapped error of the given kind.
    pub fn is_http_kind(&self, kind: HttpErrorKind) -> bool {
        matches!(self, ClientError::Http(err) if err.kind == kind)
    }

    /// Returns the Space-Track supplied error message, if any.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            ClientError::Http(err) => err.message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest_middleware::Error> for ClientError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => ClientError::Transport(e),
            other => ClientError::HttpMiddleware(other),
        }
    }
}

impl From<HttpError> for ClientError {
    fn from(err: HttpError) -> Self {
        ClientError::Http(Box::new(err))
    }
}

/// Structured error for a response with status in `[400, 600)`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("HTTP {} {reason}", .status.as_u16())]
pub struct HttpError {
    /// Mapped error kind
    pub kind: HttpErrorKind,
    /// Original status code
    pub status: StatusCode,
    /// Reason phrase, followed by the service message when one was returned
    pub reason: String,
    /// Service message on its own (`error` field or raw body text)
    pub message: Option<String>,
    /// Original response headers
    pub headers: HeaderMap,
}

/// Classification of HTTP error statuses.
///
/// Statuses without a dedicated kind map to [`HttpErrorKind::Other`] so that
/// no error response is ever swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    RequestTimeout,
    Conflict,
    Gone,
    PayloadTooLarge,
    TooManyRequests,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    /// Any other 4xx/5xx status
    Other,
}

impl HttpErrorKind {
    /// Map a status code to its error kind.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => HttpErrorKind::BadRequest,
            StatusCode::UNAUTHORIZED => HttpErrorKind::Unauthorized,
            StatusCode::FORBIDDEN => HttpErrorKind::Forbidden,
            StatusCode::NOT_FOUND => HttpErrorKind::NotFound,
            StatusCode::METHOD_NOT_ALLOWED => HttpErrorKind::MethodNotAllowed,
            StatusCode::REQUEST_TIMEOUT => HttpErrorKind::RequestTimeout,
            StatusCode::CONFLICT => HttpErrorKind::Conflict,
            StatusCode::GONE => HttpErrorKind::Gone,
            StatusCode::PAYLOAD_TOO_LARGE => HttpErrorKind::PayloadTooLarge,
            StatusCode::TOO_MANY_REQUESTS => HttpErrorKind::TooManyRequests,
            StatusCode::INTERNAL_SERVER_ERROR => HttpErrorKind::InternalServerError,
            StatusCode::NOT_IMPLEMENTED => HttpErrorKind::NotImplemented,
            StatusCode::BAD_GATEWAY => HttpErrorKind::BadGateway,
            StatusCode::SERVICE_UNAVAILABLE => HttpErrorKind::ServiceUnavailable,
            StatusCode::GATEWAY_TIMEOUT => HttpErrorKind::GatewayTimeout,
            _ => HttpErrorKind::Other,
        }
    }
}

impl fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
