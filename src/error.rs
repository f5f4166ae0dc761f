#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Input errors, resource-not-found, policy rejections, selection failure,
/// upstream failures, and internal errors. Each boundary crossing wraps the
/// underlying cause with a short operation tag so a log line can be
/// correlated back to the call site.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Malformed or missing client input: bad JSON body, bad path param, missing header.
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Admin POST without `Content-Type: application/json`.
    #[error("Unsupported Media Type: {0}")]
    UnsupportedMediaType(String),
    /// A verb not supported on an admin path.
    #[error("Method Not Allowed: {0}")]
    MethodNotAllowed(String),
    /// A client id referenced by the limiter or admin API does not exist.
    #[error("Client Not Found: {0}")]
    ClientNotFound(u64),
    /// The backend store holds no backend with `is_alive = true`.
    #[error("No Active Backends")]
    NoActiveBackends,
    /// A selection strategy was handed a snapshot with no alive backends.
    #[error("No Alive Backends")]
    NoAliveBackends,
    /// The limiter declined to admit a request for an otherwise-known client.
    #[error("Rate Limit Exceeded")]
    RateLimitExceeded,
    /// The chosen backend could not be reached, or returned a transport error.
    #[error("Upstream Error: {0}")]
    Upstream(String),
    /// Anything else: storage, URL parsing, JSON encoding.
    #[error("Internal Error: {0}")]
    Internal(String),
    #[error("Serialization Error: {0}")]
    Serialization(String),
}

#[cfg(feature = "server")]
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ProxyError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ProxyError::UnsupportedMediaType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            ProxyError::MethodNotAllowed(msg) => (StatusCode::METHOD_NOT_ALLOWED, msg),
            ProxyError::ClientNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("client {} not found", id))
            }
            // NoActiveBackends and NoAliveBackends both standardize on 503:
            // both mean "no healthy backend right now", not an internal fault.
            ProxyError::NoActiveBackends => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no active backends".to_string(),
            ),
            ProxyError::NoAliveBackends => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no alive backends".to_string(),
            ),
            ProxyError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
            ),
            ProxyError::Upstream(msg) => {
                (StatusCode::BAD_GATEWAY, format!("Upstream error: {}", msg))
            }
            ProxyError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Internal error: {}", msg))
            }
            ProxyError::Serialization(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Serialization error: {}", msg),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": "proxy_error",
                "code": null
            }
        }));

        (status, body).into_response()
    }
}

/// From conversions for common error types, so `?` works across the store,
/// limiter, and handler boundaries without manual wrapping at every call site.
impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Upstream("Request timeout - backend service did not respond in time".to_string())
        } else if err.is_connect() {
            ProxyError::Upstream("Connection failed - unable to reach backend service".to_string())
        } else if err.is_request() {
            ProxyError::BadRequest(format!("Invalid request: {}", err))
        } else if let Some(status) = err.status() {
            ProxyError::Upstream(format!("HTTP {}: {}", status.as_u16(), err))
        } else {
            ProxyError::Upstream(format!("HTTP client error: {}", err))
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::Serialization(format!("JSON error: {}", err))
    }
}

#[cfg(feature = "server")]
impl From<axum::http::Error> for ProxyError {
    fn from(err: axum::http::Error) -> Self {
        ProxyError::Internal(format!("HTTP protocol error: {}", err))
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => {
                ProxyError::BadRequest("Resource not found".to_string())
            }
            std::io::ErrorKind::PermissionDenied => {
                ProxyError::BadRequest("Permission denied".to_string())
            }
            std::io::ErrorKind::TimedOut => {
                ProxyError::Upstream("I/O operation timed out".to_string())
            }
            _ => ProxyError::Internal(format!("I/O error: {}", err)),
        }
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(err: url::ParseError) -> Self {
        ProxyError::BadRequest(format!("Invalid URL: {}", err))
    }
}
