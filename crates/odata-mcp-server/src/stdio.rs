//! The stdio transport (§4.5): one peer per process, JSON-RPC frames on
//! stdout, everything else on stderr. `rmcp` owns the framing and the
//! `initialize`/`notifications/initialized` handshake; this module only
//! starts the service and waits for the peer to hang up.

use rmcp::transport::io::stdio;
use rmcp::ServiceExt;

use crate::handler::OdataMcpServer;

/// Run `server` over stdio until the peer closes its end (EOF on stdin).
///
/// # Errors
/// Any transport-level I/O failure `rmcp` surfaces while serving or while
/// waiting for the peer to disconnect.
pub async fn run_stdio(server: OdataMcpServer) -> anyhow::Result<()> {
    let running = server.serve(stdio()).await?;
    running.waiting().await?;
    Ok(())
}
