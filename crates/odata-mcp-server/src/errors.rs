//! Maps the domain [`Error`] taxonomy onto JSON-RPC error shapes (§7), for
//! both `rmcp`'s own [`ErrorData`] (stdio/streamable-HTTP transports) and the
//! hand-rolled envelope the legacy HTTP+SSE transport builds directly.

use rmcp::ErrorData;
use serde_json::{json, Value};

use odata_mcp_domain::error::Error;

/// The plain JSON-RPC error code for `err`, independent of any particular
/// transport's representation: a malformed request shape
/// ([`Error::Protocol`]) maps to `-32600`; any other client-caused failure
/// ([`Error::is_client_fault`]) maps to `-32602`; everything else is
/// `-32603`. Unknown *tool names* never reach this function — a
/// [`rmcp::handler::server::tool::ToolRoute`] is registered per name, so
/// `rmcp`'s own transports never dispatch to one that doesn't exist; only
/// the legacy transport's raw top-level method routing produces `-32601`.
#[must_use]
pub fn json_rpc_code(err: &Error) -> i64 {
    match err {
        Error::Protocol { .. } => -32600,
        _ if err.is_client_fault() => -32602,
        _ => -32603,
    }
}

fn error_data_payload(tool: &str, err: &Error) -> Value {
    json!({"tool": tool, "detail": err.to_string()})
}

/// Build the [`ErrorData`] a tool-call failure should surface as through
/// `rmcp`'s own transports, carrying the same `{tool, detail}` payload the
/// legacy transport's hand-rolled envelope uses in its `error.data` field.
#[must_use]
pub fn to_error_data(tool: &str, err: &Error) -> ErrorData {
    let data = Some(error_data_payload(tool, err));
    if err.is_client_fault() {
        ErrorData::invalid_params(err.to_string(), data)
    } else {
        ErrorData::internal_error(err.to_string(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_map_to_invalid_request_code() {
        let err = Error::Protocol {
            message: "bad".to_owned(),
        };
        assert_eq!(json_rpc_code(&err), -32600);
    }

    #[test]
    fn client_fault_errors_map_to_invalid_params_code() {
        let err = Error::NotFound {
            kind: "entity set".to_owned(),
            name: "X".to_owned(),
        };
        assert_eq!(json_rpc_code(&err), -32602);
    }

    #[test]
    fn other_errors_map_to_internal_code() {
        let err = Error::internal("boom");
        assert_eq!(json_rpc_code(&err), -32603);
    }
}
