//! HTTP server setup and configuration.

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::handlers;
use crate::config::Config;

/// Response header carrying the per-request correlation ID (UUID v4).
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub http_client: Client,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build state with an HTTP client configured from `config`.
    pub fn new(config: Config) -> reqwest::Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.upstream.connect_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            config: Arc::new(config),
        })
    }
}

/// Correlation ID assigned to each inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Tag the request with a fresh [`RequestId`] and echo it on the response.
async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// CORS policy: any origin, JSON + bearer headers, the methods we serve.
///
/// Every OPTIONS request is answered here with an empty 200.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // OpenAI-compatible endpoint; OPTIONS is answered by the CORS layer
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/health", get(handlers::health))
        // State and middleware
        .with_state(state)
        .layer(cors_layer())
        // Outside CORS so preflight answers carry the id too
        .layer(middleware::from_fn(assign_request_id))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();
    let upstream_url = config.upstream.url.clone();

    let state = AppState::new(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, upstream = %upstream_url, "Starting coze-proxy server");

    axum::serve(listener, app).await?;

    Ok(())
}
