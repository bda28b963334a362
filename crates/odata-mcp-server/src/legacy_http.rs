//! The legacy HTTP+SSE transport (§4.5, MCP 2024-11-05 dual-endpoint
//! dialect): `GET /sse` opens a server-initiated event stream, `POST /rpc`
//! carries one JSON-RPC request per call. `rmcp` only ships the newer
//! streamable-HTTP transport, so this dispatcher is hand-rolled — grounded
//! on the single raw `handle_request` pattern used for an equivalent
//! dynamic-tool bridge, reshaped around axum/tokio broadcast channels the
//! way the teacher wires its own SSE endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use futures::StreamExt as _;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handler::OdataMcpServer;
use crate::rpc;

/// Outbound events are dropped past this bound rather than blocking the
/// server on a slow client (§11 supplement: bounded queues everywhere).
const EVENT_QUEUE_CAPACITY: usize = 64;
const IDLE_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct LegacyState {
    server: OdataMcpServer,
}

pub fn router(server: OdataMcpServer) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/rpc", post(rpc_handler))
        .route("/health", get(health))
        .with_state(LegacyState { server })
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// Opens an SSE stream for server-initiated messages. This bridge never
/// pushes unsolicited notifications today, so the stream only carries
/// keep-alive comments until the client disconnects or the idle timeout
/// reaps it — present for clients that still expect the dual-endpoint
/// handshake before issuing `POST /rpc` calls.
async fn sse_handler(
    State(_state): State<LegacyState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Event>(EVENT_QUEUE_CAPACITY);
    tokio::spawn(async move {
        tokio::time::sleep(IDLE_STREAM_TIMEOUT).await;
        drop(tx);
    });
    let stream = ReceiverStream::new(rx).map(Ok);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn rpc_handler(State(state): State<LegacyState>, Json(request): Json<Value>) -> impl IntoResponse {
    let response = rpc::handle_raw(&state.server, request).await;
    Json(response)
}
