use rust_mcp_schema::schema_utils::ServerMessage;
use rust_mcp_schema::{
    ClientCapabilities, Implementation, InitializeRequestParams, InitializeResult,
    PaginatedRequestParams, RpcError, LATEST_PROTOCOL_VERSION,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::McpError;

/// JSON-RPC code servers use for methods they do not implement.
pub const MCP_METHOD_NOT_FOUND: i64 = -32601;

pub fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("HTB MCP Client".to_string()),
            description: Some("Terminal client for the HackTheBox CTF MCP server".to_string()),
            icons: Vec::new(),
            website_url: None,
        },
        meta: None,
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}

pub fn effective_protocol_version(negotiated: Option<&str>) -> String {
    match negotiated {
        Some(version) if !version.trim().is_empty() => version.to_string(),
        _ => LATEST_PROTOCOL_VERSION.to_string(),
    }
}

pub fn paginated_params(cursor: Option<String>) -> Option<PaginatedRequestParams> {
    cursor.map(|cursor| PaginatedRequestParams {
        cursor: Some(cursor),
        meta: None,
    })
}

pub fn is_method_not_found(message: &ServerMessage) -> bool {
    matches!(
        message,
        ServerMessage::Error(error) if error.error.code == MCP_METHOD_NOT_FOUND
    )
}

pub fn parse_initialize_result(message: ServerMessage) -> Result<InitializeResult, McpError> {
    let result: InitializeResult = parse_response(message)?;
    if result.protocol_version.trim().is_empty() {
        return Err(McpError::Protocol(
            "Unexpected initialize response.".to_string(),
        ));
    }
    Ok(result)
}

pub fn parse_response<T: DeserializeOwned>(message: ServerMessage) -> Result<T, McpError> {
    let value = parse_response_value(message)?;
    Ok(serde_json::from_value(value)?)
}

pub fn parse_response_value(message: ServerMessage) -> Result<Value, McpError> {
    match message {
        ServerMessage::Response(response) => Ok(serde_json::to_value(&response.result)?),
        ServerMessage::Error(error) => Err(rpc_error(&error.error)),
        other => Err(McpError::Protocol(format!(
            "Unexpected MCP server message: {other:?}"
        ))),
    }
}

/// Converts a JSON-RPC error, folding any `data.details` text into the
/// message.
pub fn rpc_error(error: &RpcError) -> McpError {
    let mut message = error.message.clone();
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| data.as_str().map(str::to_string))
            .or_else(|| serde_json::to_string_pretty(data).ok());

        if let Some(details) = details.filter(|details| !details.is_empty()) {
            message.push('\n');
            message.push_str(&details);
        }
    }
    McpError::Rpc {
        code: error.code,
        message,
    }
}
