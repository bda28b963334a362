//! [`OdataMcpServer`]: the [`ServerHandler`] implementation shared by every
//! transport (§4.4). Tools are registered dynamically from a
//! [`ToolCatalog`](odata_mcp_bridge::ToolCatalog) built at startup, one
//! [`ToolRoute`] per [`ToolDescriptor`](odata_mcp_domain::tool::ToolDescriptor) —
//! there is no macro-generated static tool set, since the catalog's shape
//! depends on the remote service's `$metadata` (§4.3).

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::{ToolCallContext, ToolRoute};
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, PromptsCapability, ProtocolVersion, ResourcesCapability,
    ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ErrorData;
use serde_json::Value;

use odata_mcp_bridge::dispatch::{self, BridgeContext};
use odata_mcp_bridge::ToolCatalog;
use odata_mcp_domain::catalog::MetadataCatalog;
use odata_mcp_domain::config::Configuration;
use odata_mcp_domain::error::Error;
use odata_mcp_domain::hints::HintSet;
use odata_mcp_odata::client::ODataClient;

/// Everything a running MCP surface needs, shared across every transport and
/// every concurrent tool call (§5: no state lives outside of this).
pub struct ServerState {
    pub catalog: MetadataCatalog,
    pub client: ODataClient,
    pub config: Configuration,
    pub hints: HintSet,
    pub tools: ToolCatalog,
}

impl ServerState {
    fn context(&self) -> BridgeContext<'_> {
        BridgeContext {
            catalog: &self.catalog,
            client: &self.client,
            config: &self.config,
            hints: &self.hints,
            tools: &self.tools,
        }
    }
}

/// The MCP server surface: one instance per running process, shared across
/// transports via `Arc`/`Clone` the way the teacher's own `McpServer` types do.
#[derive(Clone)]
pub struct OdataMcpServer {
    state: Arc<ServerState>,
    tool_router: Arc<ToolRouter<Self>>,
}

impl OdataMcpServer {
    /// Build the server and its dynamic tool router from an already-resolved
    /// [`ServerState`] (catalog fetched and parsed, client constructed,
    /// catalog synthesized — all bin-crate concerns, §1 Non-goals).
    #[must_use]
    pub fn new(state: ServerState) -> Self {
        let state = Arc::new(state);
        let tool_router = Arc::new(build_tool_router(&state));
        Self { state, tool_router }
    }

    #[must_use]
    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Execute a tool call by name directly, bypassing `rmcp`'s own
    /// dispatch. Used by the hand-rolled legacy HTTP+SSE transport, which
    /// `rmcp` doesn't ship a transport implementation for (§4.5).
    ///
    /// # Errors
    /// Whatever [`dispatch::dispatch`] returns for an unresolved tool name or
    /// a failed operation.
    pub async fn call_tool_raw(&self, tool_name: &str, arguments: Value) -> Result<Value, Error> {
        let ctx = self.state.context();
        dispatch::dispatch(&ctx, tool_name, arguments).await
    }

    #[must_use]
    pub fn tool_descriptors(&self) -> &[odata_mcp_domain::tool::ToolDescriptor] {
        &self.state.tools.tools
    }
}

fn build_tool_router(state: &Arc<ServerState>) -> ToolRouter<OdataMcpServer> {
    let mut router = ToolRouter::new();
    for descriptor in &state.tools.tools {
        let tool_def = to_rmcp_tool(descriptor);
        let name = descriptor.name.clone();
        let state = Arc::clone(state);
        router.add_route(ToolRoute::new_dyn(
            tool_def,
            move |context: ToolCallContext<'_, OdataMcpServer>| {
                let state = Arc::clone(&state);
                let name = name.clone();
                Box::pin(async move {
                    let arguments = context
                        .arguments
                        .clone()
                        .map(Value::Object)
                        .unwrap_or_else(|| Value::Object(Default::default()));
                    execute_tool(&state, &name, arguments).await
                })
            },
        ));
    }
    router
}

/// Run one tool call against `state` and fold the result into a
/// [`CallToolResult`], or an [`ErrorData`] carrying the `{tool, detail}`
/// payload the JSON-RPC `error.data` field reports (§7): a failed operation
/// is a protocol-level error here, not in-band `isError` content, so its
/// JSON-RPC error code reflects what actually went wrong (client-caused vs.
/// internal) rather than always reading as a generic tool failure.
async fn execute_tool(state: &Arc<ServerState>, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData> {
    let ctx = state.context();
    match dispatch::dispatch(&ctx, name, arguments).await {
        Ok(value) => {
            let text = serde_json::to_string(&value).unwrap_or_else(|_| value.to_string());
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
        Err(err) => Err(crate::errors::to_error_data(name, &err)),
    }
}

fn to_rmcp_tool(descriptor: &odata_mcp_domain::tool::ToolDescriptor) -> Tool {
    let schema = descriptor.input_schema.as_object().cloned().unwrap_or_default();
    Tool {
        name: descriptor.name.clone().into(),
        description: Some(descriptor.description.clone().into()),
        input_schema: Arc::new(schema),
        annotations: None,
        title: None,
        icons: None,
        output_schema: None,
    }
}

/// Map the configured `--protocol-version` string onto the closest `rmcp`
/// constant. `rmcp::model::ProtocolVersion` only exposes a fixed set of
/// dated constants, not an arbitrary-string constructor, so an unrecognized
/// value falls back to the library default rather than failing startup —
/// the server still negotiates a valid MCP version, just not necessarily the
/// one requested (documented in DESIGN.md).
fn resolve_protocol_version(requested: &str) -> ProtocolVersion {
    match requested {
        "2024-11-05" => ProtocolVersion::V_2024_11_05,
        "2025-03-26" => ProtocolVersion::V_2025_03_26,
        "2025-06-18" => ProtocolVersion::V_2025_06_18,
        _ => ProtocolVersion::default(),
    }
}

impl ServerHandler for OdataMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: resolve_protocol_version(&self.state.config.protocol_version),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: Some(true) }),
                resources: Some(ResourcesCapability { subscribe: Some(false), list_changed: Some(false) }),
                prompts: Some(PromptsCapability { list_changed: Some(false) }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "odata-mcp".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                website_url: None,
                icons: None,
            },
            instructions: Some(
                "Bridges an OData v2/v4 service to MCP tools: one tool per entity-set \
                 operation in eager mode, or ten fixed generic tools in lazy mode."
                    .to_owned(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let ctx = ToolCallContext::new(self, request, context);
        self.tool_router.call(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_version_falls_back_for_unknown_strings() {
        assert_eq!(resolve_protocol_version("2024-11-05"), ProtocolVersion::V_2024_11_05);
        assert_eq!(resolve_protocol_version("not-a-version"), ProtocolVersion::default());
    }
}
