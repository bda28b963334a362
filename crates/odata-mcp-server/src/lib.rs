//! MCP JSON-RPC surface for the OData bridge: a single [`handler::OdataMcpServer`]
//! shared across three transports (§4.4-§4.5) — `rmcp`-driven stdio and
//! streamable-HTTP, and a hand-rolled legacy HTTP+SSE surface for clients
//! that still speak the dual-endpoint dialect.

pub mod errors;
pub mod handler;
pub mod legacy_http;
pub mod rpc;
pub mod stdio;
pub mod streamable_http;

pub use handler::{OdataMcpServer, ServerState};
