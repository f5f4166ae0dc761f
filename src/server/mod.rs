//! # Server Module
//!
//! Wires the admin CRUD surface and the proxy dispatcher into one router,
//! with a middleware stack for CORS and request tracing.

pub mod handlers;
pub mod state;

pub use state::AppState;

use axum::{
    routing::{any, delete, get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{self, TraceLayer},
};
use tracing::Level;

/// Build the router: `/clients` admin CRUD, `/_nnlb/health` for the
/// balancer process itself, everything else (including a client's own
/// `/health` path) dispatched to the proxy.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/_nnlb/health", get(handlers::health_check))
        .route(
            "/clients",
            post(handlers::create_client).fallback(handlers::method_not_allowed),
        )
        .route(
            "/clients/{client_id}",
            delete(handlers::delete_client)
                .patch(handlers::update_client)
                .fallback(handlers::method_not_allowed),
        )
        .fallback(any(handlers::proxy))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
