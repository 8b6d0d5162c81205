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

use super::params::{parse_params, ConnectionInfoParams};
use super::{ToolContext, ToolHandler};
use crate::mcp::protocol::Tool;
use async_trait::async_trait;
use netgauge_core::{OperationClass, ToolError};
use serde_json::json;

/// `get_connection_info`: connection trace lookup.
pub struct ConnectionInfoTool;

#[async_trait]
impl ToolHandler for ConnectionInfoTool {
    fn name(&self) -> &'static str {
        "get_connection_info"
    }

    fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(
                "Look up the current connection: public IP, ISP, and the location the \
                 edge network resolves the client to."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timeout": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 300,
                        "description": "Overall lookup timeout in seconds"
                    },
                    "serverLocation": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Preferred edge server code (e.g. 'LAX')"
                    },
                    "includeLocation": {
                        "type": "boolean",
                        "default": true,
                        "description": "Include the resolved geographic location"
                    },
                    "includeISP": {
                        "type": "boolean",
                        "default": true,
                        "description": "Include ISP details; when false they read 'Hidden'"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    fn operation_class(&self) -> OperationClass {
        OperationClass::ConnectionInfo
    }

    fn default_timeout_ms(&self) -> u64 {
        30_000
    }

    fn validate(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        parse_params::<ConnectionInfoParams>(arguments)?.validate()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
        deadline_ms: u64,
    ) -> Result<serde_json::Value, ToolError> {
        let params: ConnectionInfoParams = parse_params(&arguments)?;
        let trace = ctx.probe.get_trace(deadline_ms).await?;

        let isp = if params.include_isp {
            trace.isp.clone()
        } else {
            "Hidden".to_string()
        };

        let mut data = json!({
            "ip": trace.ip,
            "isp": isp,
            "connection": {
                "type": "unknown",
                "asn": "unknown",
                "organization": if params.include_isp { trace.isp.clone() } else { "Hidden".to_string() },
            },
        });

        if params.include_location {
            data["location"] = json!({
                "country": trace.country,
                "region": trace.region,
                "city": trace.city,
                "timezone": trace.timezone,
            });
        }

        Ok(data)
    }
}
