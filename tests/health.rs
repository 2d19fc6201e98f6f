//! Integration tests for the auxiliary HTTP surface.
//!
//! Verifies that:
//! - GET /health answers without touching the upstream
//! - a bare OPTIONS on the chat endpoint returns an empty 200
//! - CORS headers are attached to responses and preflights
//! - every response carries an `x-request-id`

use axum::body::Body;
use http::{Method, Request, StatusCode};
use tower::ServiceExt;

use coze_proxy::config::Config;
use coze_proxy::proxy::{create_router, AppState, REQUEST_ID_HEADER};

fn test_app() -> axum::Router {
    let mut config = Config::default();
    // Nothing listens here; none of these tests may reach the upstream
    config.upstream.url = "http://127.0.0.1:1/v3/chat".to_string();
    create_router(AppState::new(config).expect("build app state"))
}

#[tokio::test]
async fn test_health_ok() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "coze-proxy");
}

#[tokio::test]
async fn test_bare_options_returns_empty_200() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/chat/completions")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_cors_preflight() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/chat/completions")
        .header("origin", "https://chat.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");

    let methods = headers
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    for method in ["GET", "POST", "OPTIONS"] {
        assert!(methods.contains(method), "missing {} in {}", method, methods);
    }

    let allowed = headers
        .get("access-control-allow-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(allowed.contains("authorization"));
    assert!(allowed.contains("content-type"));
}

#[tokio::test]
async fn test_cors_header_on_error_response() {
    let request = Request::post("/v1/chat/completions")
        .header("origin", "https://chat.example.com")
        .body(Body::from("{}"))
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_request_id_header_is_uuid() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .expect("x-request-id present")
        .to_str()
        .unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok(), "not a UUID: {}", id);
}

#[tokio::test]
async fn test_request_id_header_on_preflight() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/chat/completions")
        .header("origin", "https://chat.example.com")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .expect("x-request-id present on preflight")
        .to_str()
        .unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok(), "not a UUID: {}", id);
}
