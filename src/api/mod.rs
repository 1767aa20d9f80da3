// HTTP surface of the gateway

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::proxy::{GatewayError, ProxyGateway};

#[derive(Clone)]
pub struct AppState {
    gateway: Arc<ProxyGateway>,
    hello_reply: Arc<str>,
}

impl AppState {
    pub fn new(gateway: Arc<ProxyGateway>, hello_reply: impl Into<Arc<str>>) -> Self {
        Self {
            gateway,
            hello_reply: hello_reply.into(),
        }
    }

    pub fn gateway(&self) -> &Arc<ProxyGateway> {
        &self.gateway
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/hello/revision", get(hello_revision))
        .route("/auth", get(auth_status))
        .route("/auth/logout", get(logout))
        // Everything below is forwarded with its full path.
        .route("/api/v1/search", post(proxy))
        .route("/api/v1/search/{search_id}", get(proxy))
        .route("/api/v1/search/{search_id}/logs", get(proxy))
        .route("/api/v1/search/{search_id}/timeseries", get(proxy))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn hello_revision(State(state): State<AppState>) -> String {
    state.hello_reply.to_string()
}

/// Report the current session, if any.
async fn auth_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.gateway.sessions().validate_headers(&headers) {
        Ok(claims) => Json(serde_json::json!({
            "msg": "Authenticated",
            "user": claims,
        }))
        .into_response(),
        Err(e) => {
            debug!("Session check failed: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "msg": "Not authenticated" })),
            )
                .into_response()
        }
    }
}

async fn logout(State(state): State<AppState>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, HeaderValue::from_static("/"));
    if let Some(cookie) = state.gateway.sessions().logout() {
        headers.insert(header::SET_COOKIE, cookie);
    }

    (StatusCode::FOUND, headers).into_response()
}

async fn proxy(State(state): State<AppState>, request: Request) -> Result<Response, GatewayError> {
    state.gateway.forward(request).await
}
