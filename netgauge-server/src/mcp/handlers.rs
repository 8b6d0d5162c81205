// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! MCP Request Handlers
//!
//! Dispatches JSON-RPC 2.0 requests to the tool pipeline. Notifications
//! produce no response; everything else produces exactly one.

use crate::mcp::protocol::*;
use crate::pipeline::ToolPipeline;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MCP request handler.
pub struct McpHandler {
    pipeline: Arc<ToolPipeline>,
}

impl McpHandler {
    pub fn new(pipeline: Arc<ToolPipeline>) -> Self {
        Self { pipeline }
    }

    /// Parse one transport line and handle it. Malformed JSON yields a
    /// parse-error response with a null id.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC line");
                Some(JsonRpcResponse::error(
                    JsonRpcId::Null,
                    JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
                ))
            }
        }
    }

    /// Handle a JSON-RPC request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "MCP request received");

        // Notifications carry no id and get no response.
        if request.id.is_none() {
            match request.method.as_str() {
                "notifications/initialized" | "initialized" => {
                    info!("MCP client initialized");
                }
                other => debug!(method = other, "ignoring notification"),
            }
            return None;
        }
        let id = request.id.unwrap_or(JsonRpcId::Null);

        Some(match request.method.as_str() {
            "ping" => JsonRpcResponse::success(id, json!({})),
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => {
                warn!(method = other, "unknown MCP method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))
            }
        })
    }

    fn handle_initialize(&self, id: JsonRpcId) -> JsonRpcResponse {
        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                logging: None,
            },
            server_info: ServerInfo {
                name: "netgauge".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
        }
    }

    fn handle_tools_list(&self, id: JsonRpcId) -> JsonRpcResponse {
        let result = ListToolsResult {
            tools: self.pipeline.registry().definitions(),
            next_cursor: None,
        };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
        }
    }

    async fn handle_tools_call(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let call: CallToolParams = match params {
            Some(params) => match serde_json::from_value(params) {
                Ok(call) => call,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid tool call params: {}", e)),
                    )
                }
            },
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tool call params"),
                )
            }
        };

        let arguments = serde_json::Value::Object(call.arguments.into_iter().collect());
        match self.pipeline.execute(&call.name, arguments).await {
            Ok(envelope) => {
                let result = CallToolResult {
                    content: vec![ToolContent::Text {
                        text: envelope.to_json(),
                    }],
                    is_error: (!envelope.success).then_some(true),
                };
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => {
                        JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string()))
                    }
                }
            }
            Err(not_found) => JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(not_found.to_string()),
            ),
        }
    }
}
