//! The Streamable HTTP transport (§4.5, MCP 2025-03-26): a single `/mcp`
//! endpoint handling POST/GET/DELETE, backed by `rmcp`'s own session
//! manager. No bearer-token auth layer is added here — the bridge's only
//! access control is the loopback-bind-by-default posture `Configuration`
//! already enforces (`http_bind.security_expert_ack`).

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handler::OdataMcpServer;

const SECURITY_HEADERS_NOSNIFF: &str = "nosniff";
const SECURITY_HEADERS_DENY: &str = "DENY";

/// Build the axum [`Router`] for the streamable-HTTP transport: `/mcp` for
/// the protocol itself, `/health` for liveness checks (§11 supplement), and
/// the `nosniff`/`DENY` headers every HTTP transport applies (§4.5).
pub fn router(server: OdataMcpServer) -> Router {
    let config = StreamableHttpServerConfig {
        sse_keep_alive: Some(Duration::from_secs(15)),
        stateful_mode: true,
    };
    let streamable_service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        config,
    );

    Router::new()
        .route(
            "/mcp",
            any(move |req| async move { streamable_service.clone().handle(req).await }),
        )
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static(SECURITY_HEADERS_NOSNIFF),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static(SECURITY_HEADERS_DENY),
        ))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
