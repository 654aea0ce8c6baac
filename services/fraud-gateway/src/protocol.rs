//! JSON-RPC 2.0 messages and the per-session MCP server
//!
//! One [`McpServer`] is bound to each session and owned by that session's
//! actor, so it never sees two requests at once.

use crate::metrics::{TOOL_CALLS_TOTAL, TOOL_CALL_DURATION};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use signal_engine::{Error as EngineError, SignalEngine, ToolOutput};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Protocol revision this server speaks
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Revisions accepted from clients during initialize
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

pub const SERVER_NAME: &str = "fraud-detection-server";
pub const SERVER_VERSION: &str = "1.0.0";

pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const INVALID_SESSION: i64 = -32000;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_initialize(&self) -> bool {
        self.method == "initialize" && !self.is_notification()
    }

    /// Reject anything that is not a well-formed 2.0 request
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err(format!("unsupported jsonrpc version '{}'", self.jsonrpc));
        }
        if self.method.is_empty() {
            return Err("method must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Protocol-level server bound to a single session
pub struct McpServer {
    session_id: String,
    engine: SignalEngine,
    initialized: bool,
}

impl McpServer {
    pub fn new(session_id: impl Into<String>, engine: SignalEngine) -> Self {
        Self {
            session_id: session_id.into(),
            engine,
            initialized: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Handle one request; notifications produce no response
    pub async fn handle(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(session_id = %self.session_id, method = %request.method, "Handling request");

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(&request.params),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(request.params).await,
            other => Err((
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err((code, message)) => JsonRpcResponse::error(id, code, message),
        })
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                debug!(session_id = %self.session_id, "Client finished initialization")
            }
            other => debug!(session_id = %self.session_id, method = %other, "Ignoring notification"),
        }
    }

    fn initialize(&mut self, params: &Value) -> Result<Value, (i64, String)> {
        if self.initialized {
            return Err((
                error_codes::INVALID_REQUEST,
                "Server already initialized".to_string(),
            ));
        }
        self.initialized = true;

        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let version = match requested {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v,
            _ => PROTOCOL_VERSION,
        };

        info!(session_id = %self.session_id, protocol_version = %version, "Session initialized");

        Ok(json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION,
            }
        }))
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<Value> = self.engine.tools().map(|t| t.describe()).collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, (i64, String)> {
        let params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| (error_codes::INVALID_PARAMS, format!("Invalid tools/call params: {}", e)))?;

        let start = Instant::now();
        let result = self.engine.call_tool(&params.name, params.arguments).await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(output) => {
                let severity = severity_label(&output);
                TOOL_CALLS_TOTAL.with_label_values(&[params.name.as_str(), severity]).inc();
                TOOL_CALL_DURATION.with_label_values(&[params.name.as_str()]).observe(elapsed);
                info!(
                    session_id = %self.session_id,
                    tool = %params.name,
                    severity = %severity,
                    "Tool call completed"
                );
                Ok(content(&output))
            }
            Err(e) => {
                // unknown names stay out of the label set
                let tool = match e {
                    EngineError::UnknownTool(_) => "unknown",
                    _ => params.name.as_str(),
                };
                TOOL_CALLS_TOTAL.with_label_values(&[tool, "rejected"]).inc();
                warn!(session_id = %self.session_id, tool = %params.name, error = %e, "Tool call rejected");
                Err(match e {
                    EngineError::UnknownTool(_) | EngineError::InvalidInput { .. } => {
                        (error_codes::INVALID_PARAMS, e.to_string())
                    }
                    EngineError::Lookup(_) => (error_codes::INTERNAL_ERROR, e.to_string()),
                })
            }
        }
    }
}

fn severity_label(output: &ToolOutput) -> &'static str {
    match output
        .details
        .as_ref()
        .and_then(|d| d.get("severity"))
        .and_then(Value::as_str)
    {
        Some("high") => "high",
        Some("medium") => "medium",
        Some("low") => "low",
        _ => "none",
    }
}

fn content(output: &ToolOutput) -> Value {
    let segments: Vec<Value> = output
        .segments()
        .into_iter()
        .map(|text| json!({ "type": "text", "text": text }))
        .collect();
    json!({ "content": segments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_engine::{EngineConfig, EntityHistoryStore, StaticRecordLookup};
    use std::sync::Arc;

    fn server() -> McpServer {
        let engine = SignalEngine::new(
            EngineConfig::default(),
            EntityHistoryStore::new(),
            Arc::new(StaticRecordLookup::new()),
        );
        McpServer::new("test-session", engine)
    }

    fn request(id: Option<i64>, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: id.map(Value::from),
        }
    }

    #[tokio::test]
    async fn test_initialize_negotiates_version() {
        let mut server = server();
        let response = server
            .handle(request(Some(1), "initialize", json!({"protocolVersion": "2024-11-05"})))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
    }

    #[tokio::test]
    async fn test_second_initialize_rejected() {
        let mut server = server();
        server.handle(request(Some(1), "initialize", json!({}))).await;
        let response = server.handle(request(Some(2), "initialize", json!({}))).await.unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let mut server = server();
        assert!(server
            .handle(request(None, "notifications/initialized", Value::Null))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut server = server();
        let response = server.handle(request(Some(3), "resources/list", Value::Null)).await.unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_list_has_six_tools() {
        let mut server = server();
        let response = server.handle(request(Some(4), "tools/list", Value::Null)).await.unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 6);
    }

    #[tokio::test]
    async fn test_tool_call_segments() {
        let mut server = server();
        let response = server
            .handle(request(
                Some(5),
                "tools/call",
                json!({"name": "ipVelocity", "arguments": {"remote_address": "192.0.2.1"}}),
            ))
            .await
            .unwrap();

        let content = response.result.unwrap()["content"].clone();
        let segments = content.as_array().unwrap();
        assert_eq!(segments.len(), 3);
        assert!(segments[2]["text"].as_str().unwrap().starts_with("Details: "));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let mut server = server();
        let response = server
            .handle(request(Some(6), "tools/call", json!({"name": "teleport", "arguments": {}})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[test]
    fn test_validate_rejects_wrong_version() {
        let mut req = request(Some(1), "ping", Value::Null);
        req.jsonrpc = "1.0".to_string();
        assert!(req.validate().is_err());
    }
}
