//! End-to-end tests against the router via `tower::ServiceExt::oneshot`,
//! backed by `wiremock` stand-ins for upstream backends.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use nnlb::{create_router, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app_with_backend(mock: &MockServer) -> axum::Router {
    let mut config = Config::for_test();
    config.backends = vec![mock.uri().trim_start_matches("http://").to_string()];
    let state = AppState::new(config).await;
    create_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let mock = MockServer::start().await;
    let app = app_with_backend(&mock).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/_nnlb/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn a_backend_path_named_health_is_still_proxied() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("backend-health"))
        .mount(&mock)
        .await;
    let app = app_with_backend(&mock).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes, "backend-health".as_bytes());
}

#[tokio::test]
async fn proxies_get_request_to_the_only_backend() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock)
        .await;

    let app = app_with_backend(&mock).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/widgets")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn returns_503_when_no_backends_are_alive() {
    let mock = MockServer::start().await;
    let mut config = Config::for_test();
    config.backends = vec![mock.uri().trim_start_matches("http://").to_string()];
    let state = AppState::new(config).await;

    let backends = state.backend_store.get_all().await.unwrap();
    state.backend_store.set_alive(backends[0].id, false).await.unwrap();

    let app = create_router(state);
    let response = app
        .oneshot(Request::builder().uri("/anything").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_create_client_returns_id() {
    let mock = MockServer::start().await;
    let app = app_with_backend(&mock).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clients")
                .header("content-type", "application/json")
                .body(Body::from(json!({"capacity": 10, "rate_per_sec": 2}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert!(json["client_id"].as_u64().is_some());
}

#[tokio::test]
async fn admin_create_client_rejects_zero_capacity() {
    let mock = MockServer::start().await;
    let app = app_with_backend(&mock).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clients")
                .header("content-type", "application/json")
                .body(Body::from(json!({"capacity": 0, "rate_per_sec": 2}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_create_client_requires_json_content_type() {
    let mock = MockServer::start().await;
    let app = app_with_backend(&mock).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clients")
                .header("content-type", "text/plain")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn unsupported_method_on_admin_path_is_method_not_allowed() {
    let mock = MockServer::start().await;
    let app = app_with_backend(&mock).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/clients")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn admin_delete_unknown_client_is_not_found() {
    let mock = MockServer::start().await;
    let app = app_with_backend(&mock).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/clients/9999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_without_client_id_header_is_bad_request() {
    let mock = MockServer::start().await;
    let app = app_with_backend(&mock).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/work")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn second_request_within_the_same_second_is_rate_limited() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/work"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock)
        .await;

    let app = app_with_backend(&mock).await;

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clients")
                .header("content-type", "application/json")
                .body(Body::from(json!({"capacity": 1, "rate_per_sec": 1}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let client_id = body_json(create_response).await["client_id"].as_u64().unwrap();

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/work")
                .header("x-client-id", client_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/work")
                .header("x-client-id", client_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn rejected_client_is_admitted_again_after_the_bucket_refills() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/work"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock)
        .await;

    let app = app_with_backend(&mock).await;

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clients")
                .header("content-type", "application/json")
                .body(Body::from(json!({"capacity": 1, "rate_per_sec": 1}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let client_id = body_json(create_response).await["client_id"].as_u64().unwrap();

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/work")
            .header("x-client-id", client_id.to_string())
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let rejected = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let after_refill = app.oneshot(request()).await.unwrap();
    assert_eq!(after_refill.status(), StatusCode::OK);
}
