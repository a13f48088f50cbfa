//! JSON-RPC envelope handling for the HTTP transport
//!
//! The HTTP endpoint receives one request envelope per POST and answers it
//! with the same server core the stdio session uses.

use crate::server::PostgresMcpServer;
use mcp_common::{internal_error, invalid_params, method_not_found, McpError};
use rmcp::model::{JsonObject, ListResourcesResult, ListToolsResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A request body that could not be turned into an envelope
#[derive(Error, Debug, PartialEq)]
pub enum ProtocolError {
    #[error("invalid JSON-RPC request: {0}")]
    Malformed(String),

    #[error("invalid JSON-RPC request: missing method")]
    MissingMethod,
}

/// Incoming JSON-RPC 2.0 request or notification
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        Self {
            code: err.code.0,
            message: err.message.to_string(),
            data: err.data,
        }
    }
}

/// Outgoing JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn from_outcome(id: Value, outcome: Result<Value, McpError>) -> Self {
        match outcome {
            Ok(result) => Self {
                jsonrpc: "2.0",
                id,
                result: Some(result),
                error: None,
            },
            Err(err) => Self {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(err.into()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<JsonObject>,
}

#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

/// Parse a POST body into a request envelope
pub fn decode_request(body: &[u8]) -> Result<JsonRpcRequest, ProtocolError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    match value.get("method") {
        Some(Value::String(_)) => {}
        Some(_) => return Err(ProtocolError::Malformed("method must be a string".to_string())),
        None => return Err(ProtocolError::MissingMethod),
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Handle one request; notifications produce no response
pub async fn dispatch(
    server: &PostgresMcpServer,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    let Some(id) = request.id else {
        tracing::debug!(method = %request.method, "Ignoring notification");
        return None;
    };

    tracing::debug!(method = %request.method, "Handling HTTP request");
    let outcome = handle(server, &request.method, request.params).await;
    Some(JsonRpcResponse::from_outcome(id, outcome))
}

async fn handle(
    server: &PostgresMcpServer,
    method: &str,
    params: Option<Value>,
) -> Result<Value, McpError> {
    match method {
        "initialize" => to_value(&server.info()),
        "ping" => Ok(Value::Object(JsonObject::new())),
        "tools/list" => to_value(&ListToolsResult::with_all_items(server.tools())),
        "tools/call" => {
            let params: ToolCallParams = parse_params(params)?;
            let result = server.call(&params.name, params.arguments.as_ref()).await?;
            to_value(&result)
        }
        "resources/list" => to_value(&ListResourcesResult::with_all_items(server.resources())),
        "resources/read" => {
            let params: ResourceReadParams = parse_params(params)?;
            to_value(&server.read(&params.uri).await?)
        }
        other => Err(method_not_found(other)),
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Option<Value>) -> Result<T, McpError> {
    let params = params.ok_or_else(|| invalid_params("Missing params"))?;
    serde_json::from_value(params).map_err(|e| invalid_params(format!("Invalid params: {}", e)))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| internal_error(e.to_string()))
}
