//! Hand-rolled JSON-RPC 2.0 envelope for the legacy HTTP+SSE transport
//! (§4.5), which `rmcp` does not ship a transport implementation for. The
//! stdio and streamable-HTTP transports get their JSON-RPC framing from
//! `rmcp` itself and never touch this module — grounded on the single raw
//! `handle_request(&self, request: Value) -> Result<Value, _>` dispatcher
//! pattern used for an equivalent dynamic-tool Streamable HTTP bridge.

use rmcp::handler::server::ServerHandler;
use serde_json::{json, Value};

use crate::errors::json_rpc_code;
use crate::handler::OdataMcpServer;

fn success_response(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn error_response(id: Value, code: i64, message: String, tool: Option<&str>) -> Value {
    let mut data = serde_json::Map::new();
    if let Some(tool) = tool {
        data.insert("tool".to_owned(), Value::String(tool.to_owned()));
    }
    data.insert("detail".to_owned(), Value::String(message.clone()));
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message, "data": Value::Object(data)},
    })
}

/// Handle one raw JSON-RPC request against `server`. `id` is preserved
/// verbatim — including `Value::Null` for a notification sent with an
/// explicit `null` id — since the caller owns framing the response onto the
/// wire (§4.4: "the server never invents an id").
pub async fn handle_raw(server: &OdataMcpServer, request: Value) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return error_response(id, -32600, "missing required field 'method'".to_owned(), None);
    };

    tracing::debug!(method, "handling JSON-RPC request");

    match method {
        "initialize" => {
            let info = server.get_info();
            success_response(
                id,
                json!({
                    "protocolVersion": info.protocol_version,
                    "capabilities": info.capabilities,
                    "serverInfo": info.server_info,
                    "instructions": info.instructions,
                }),
            )
        }
        "notifications/initialized" => success_response(id, Value::Null),
        "tools/list" => {
            let tools: Vec<Value> = server
                .tool_descriptors()
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": t.input_schema,
                    })
                })
                .collect();
            success_response(id, json!({"tools": tools}))
        }
        "tools/call" => handle_tools_call(server, id, request.get("params")).await,
        "resources/list" => success_response(id, json!({"resources": []})),
        "prompts/list" => success_response(id, json!({"prompts": []})),
        other => error_response(id, -32601, format!("unknown method '{other}'"), None),
    }
}

async fn handle_tools_call(server: &OdataMcpServer, id: Value, params: Option<&Value>) -> Value {
    let Some(params) = params else {
        return error_response(id, -32602, "missing required field 'params'".to_owned(), None);
    };
    let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
        return error_response(id, -32602, "missing required field 'params.name'".to_owned(), None);
    };
    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    match server.call_tool_raw(tool_name, arguments).await {
        Ok(value) => success_response(
            id,
            json!({
                "content": [{"type": "text", "text": serde_json::to_string(&value).unwrap_or_default()}],
                "isError": false,
            }),
        ),
        Err(err) => {
            tracing::warn!(tool = tool_name, error = %err, "tools/call failed over legacy HTTP transport");
            error_response(id, json_rpc_code(&err), err.to_string(), Some(tool_name))
        }
    }
}
