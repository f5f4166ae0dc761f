//! # Request Dispatcher & Admin Handlers
//!
//! The dispatcher (`proxy`) is the entry point for every non-admin request:
//! identify the client, run the limiter, pick a backend, forward. The admin
//! handlers implement the `/clients` CRUD surface using the same
//! header-forwarding reverse-proxy shape.

use super::AppState;
use crate::error::ProxyError;
use crate::store::BackendStore;
use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json as JsonResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

const CLIENT_ID_HEADER: &str = "x-client-id";

/// Holds the `active_conns` increment for one chosen backend and releases it
/// on drop, so a cancelled request (client disconnect, timeout) can't leak
/// the counter the way a plain increment-then-decrement pair around
/// `forward` would. `Drop` can't `.await`, so the release is a spawned
/// fire-and-forget task, matching the increment it undoes.
struct ConnGuard {
    store: Arc<dyn BackendStore>,
    backend_id: u64,
}

impl ConnGuard {
    async fn acquire(store: Arc<dyn BackendStore>, backend_id: u64) -> Self {
        store.increment_conns(backend_id).await;
        Self { store, backend_id }
    }
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        let store = self.store.clone();
        let backend_id = self.backend_id;
        tokio::spawn(async move {
            store.decrement_conns(backend_id).await;
        });
    }
}

/// GET /_nnlb/health, a liveness probe for the balancer process itself.
/// Kept off the proxied namespace so a backend's own `/health` path still
/// reaches the proxy like any other request.
pub async fn health_check() -> impl IntoResponse {
    let body = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "nnlb",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, JsonResponse(body))
}

/// Every non-admin request: identify, rate-limit, select, forward.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Body,
) -> Result<Response, ProxyError> {
    state.metrics.record_request();

    if method == Method::POST {
        let client_id = client_id_from_headers(&headers)?.ok_or_else(|| {
            ProxyError::BadRequest(format!("{CLIENT_ID_HEADER} header is required on POST"))
        })?;
        if let Err(err) = state.limiter.allow(client_id).await {
            if matches!(err, ProxyError::RateLimitExceeded) {
                state.metrics.record_rate_limited();
            }
            return Err(err);
        }
    }

    let active = match state.backend_store.get_active().await {
        Ok(active) => active,
        Err(err) => {
            state.metrics.record_no_backend();
            return Err(err);
        }
    };
    let backend = state.strategy.next(&active)?;

    let _conn_guard = ConnGuard::acquire(state.backend_store.clone(), backend.id).await;
    let started = std::time::Instant::now();
    let result = forward(&state, &backend.origin(), &uri, method, headers, connect_info, body).await;

    match &result {
        Ok(_) => state.metrics.record_success(started.elapsed().as_millis() as u64),
        Err(_) => state.metrics.record_upstream_failure(),
    }

    result
}

/// Read client identity from a header instead of sniffing the POST body, so
/// the body remains intact for forwarding. Mirrors spec.md's "absent body,
/// decode failure, or missing id" case for POST: the caller turns a `None`
/// here into `400 Bad Request`. Non-POST methods never call this at all.
fn client_id_from_headers(headers: &HeaderMap) -> Result<Option<u64>, ProxyError> {
    match headers.get(CLIENT_ID_HEADER) {
        None => Ok(None),
        Some(value) => {
            let text = value
                .to_str()
                .map_err(|_| ProxyError::BadRequest(format!("{CLIENT_ID_HEADER} is not valid UTF-8")))?;
            text.parse::<u64>()
                .map(Some)
                .map_err(|_| ProxyError::BadRequest(format!("{CLIENT_ID_HEADER} is not a valid u64")))
        }
    }
}

async fn forward(
    state: &AppState,
    origin: &str,
    uri: &Uri,
    method: Method,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Body,
) -> Result<Response, ProxyError> {
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let target_url = format!("{origin}{path_and_query}");
    let mut request_builder = state.http_client.request(method, &target_url);

    for (name, value) in headers.iter() {
        if name != "host" {
            request_builder = request_builder.header(name, value);
        }
    }

    if let Some(host) = headers.get("host") {
        request_builder = request_builder.header("x-forwarded-host", host);
    }
    if let Some(ConnectInfo(addr)) = connect_info {
        request_builder = request_builder.header("x-forwarded-for", addr.ip().to_string());
    }

    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::BadRequest(format!("failed to read request body: {e}")))?;
    if !body_bytes.is_empty() {
        request_builder = request_builder.body(body_bytes);
    }

    let upstream_response = request_builder
        .send()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    let status = upstream_response.status();
    let mut response_builder = axum::http::Response::builder().status(status);
    for (name, value) in upstream_response.headers().iter() {
        response_builder = response_builder.header(name, value);
    }

    let response_body = upstream_response
        .bytes()
        .await
        .map_err(|e| ProxyError::Upstream(format!("failed to read upstream response body: {e}")))?;

    response_builder
        .body(Body::from(response_body))
        .map_err(|e| ProxyError::Internal(format!("failed to build response: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub capacity: Option<i64>,
    pub rate_per_sec: Option<i64>,
}

/// POST /clients
pub async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ProxyError> {
    require_json_content_type(&headers)?;

    let req: CreateClientRequest = if body.is_empty() {
        CreateClientRequest { capacity: None, rate_per_sec: None }
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ProxyError::BadRequest(format!("invalid JSON body: {e}")))?
    };

    let capacity = req.capacity.unwrap_or_else(|| state.limiter.default_capacity());
    let rate_per_sec = req
        .rate_per_sec
        .unwrap_or_else(|| state.limiter.default_rate_per_sec());

    if capacity <= 0 {
        return Err(ProxyError::BadRequest("capacity must be greater than 0".to_string()));
    }
    if rate_per_sec <= 0 {
        return Err(ProxyError::BadRequest("rate_per_sec must be greater than 0".to_string()));
    }

    let client = state
        .client_store
        .create(crate::models::Client::new(capacity, rate_per_sec))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"status": "success", "client_id": client.id})),
    )
        .into_response())
}

/// DELETE /clients/{client_id}
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Response, ProxyError> {
    let client_id = parse_client_id(&client_id)?;
    state.client_store.delete(client_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "client_id": client_id,
            "message": "client deleted",
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub capacity: Option<i64>,
    pub rate_per_sec: Option<i64>,
    pub tokens: Option<i64>,
}

/// PATCH /clients/{client_id}
pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ProxyError> {
    require_json_content_type(&headers)?;
    let client_id = parse_client_id(&client_id)?;

    let req: UpdateClientRequest = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::BadRequest(format!("invalid JSON body: {e}")))?;

    for (name, value) in [
        ("capacity", req.capacity),
        ("rate_per_sec", req.rate_per_sec),
        ("tokens", req.tokens),
    ] {
        if let Some(value) = value {
            if value <= 0 {
                return Err(ProxyError::BadRequest(format!("{name} must be greater than 0")));
            }
        }
    }

    let updated = state
        .client_store
        .update_params(client_id, req.capacity, req.rate_per_sec, req.tokens)
        .await?;

    Ok((StatusCode::OK, Json(json!({"status": "success", "client": updated}))).into_response())
}

fn parse_client_id(raw: &str) -> Result<u64, ProxyError> {
    raw.parse::<u64>()
        .map_err(|_| ProxyError::BadRequest(format!("invalid client id: {raw}")))
}

fn require_json_content_type(headers: &HeaderMap) -> Result<(), ProxyError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        return Err(ProxyError::UnsupportedMediaType(
            "Content-Type must be application/json".to_string(),
        ));
    }
    Ok(())
}

/// Any unsupported verb landing on an admin path.
pub async fn method_not_allowed() -> Result<Response, ProxyError> {
    Err(ProxyError::MethodNotAllowed("method not allowed on this path".to_string()))
}
