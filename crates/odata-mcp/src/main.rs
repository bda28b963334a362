//! Process entry point: resolve configuration, fetch and parse `$metadata`,
//! build the tool catalog, and run the configured MCP transport (§10.3).
//! Everything here is bin-crate plumbing the core explicitly excludes from
//! its own scope (§1 Non-goals) — it exists to hand the core a fully-resolved
//! [`Configuration`] and nothing else.

mod cli;
mod config_build;
mod trace;

use clap::Parser;
use odata_mcp_bridge::build_catalog;
use odata_mcp_odata::client::ODataClient;
use odata_mcp_server::handler::{OdataMcpServer, ServerState};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config_build::resolve(&cli)?;
    trace::init(&config.observability, cli.log_json)?;

    if let Err(err) = run(config).await {
        tracing::error!(error = %err, "fatal startup or transport error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(config: odata_mcp_domain::config::Configuration) -> anyhow::Result<()> {
    let mut client = ODataClient::new(&config)?;

    let mut hints = config_build::load_hints(config.hints_file.as_deref(), &config.inline_hints)?;
    if let Some(sap_override) = hints.sap_flavor_override(&config.service_url) {
        client.set_sap_flavor(sap_override);
    }
    // hints is only read from here on; keeping it mutable above avoids a
    // second binding for the one conditional mutation.
    let hints = hints;

    tracing::info!(service_url = %config.service_url, "fetching $metadata");
    let metadata_xml = client.fetch_metadata_xml().await?;
    let catalog = odata_mcp_odata::parse_metadata(metadata_xml.as_bytes(), &config.service_url)?;

    let tools = build_catalog(&catalog, &config);
    tracing::info!(tool_count = tools.tools.len(), lazy = tools.lazy, "tool catalog built");

    let server = OdataMcpServer::new(ServerState {
        catalog,
        client,
        config: config.clone(),
        hints,
        tools,
    });

    match config.transport {
        odata_mcp_domain::config::TransportKind::Stdio => {
            odata_mcp_server::stdio::run_stdio(server).await?;
        }
        odata_mcp_domain::config::TransportKind::Http => {
            serve_http(server, &config.http_bind.addr, odata_mcp_server::legacy_http::router).await?;
        }
        odata_mcp_domain::config::TransportKind::StreamableHttp => {
            serve_http(server, &config.http_bind.addr, odata_mcp_server::streamable_http::router).await?;
        }
    }

    Ok(())
}

async fn serve_http(
    server: OdataMcpServer,
    addr: &str,
    build_router: impl FnOnce(OdataMcpServer) -> axum::Router,
) -> anyhow::Result<()> {
    let app = build_router(server);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    tracing::info!(%addr, "MCP HTTP transport listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))?;
    Ok(())
}

/// Waits for Ctrl-C (or, on Unix, SIGTERM) so `axum::serve` can drain
/// in-flight requests instead of dropping connections mid-response (§11
/// graceful-shutdown supplement).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
