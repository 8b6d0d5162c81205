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

use super::params::{parse_params, LatencyParams};
use super::{ToolContext, ToolHandler};
use crate::mcp::protocol::Tool;
use crate::probe::{ProbeOptions, ProbeShape};
use async_trait::async_trait;
use netgauge_core::{OperationClass, ToolError};
use serde_json::json;

/// `test_latency`: RTT and jitter against the nearest edge.
pub struct LatencyTool;

#[async_trait]
impl ToolHandler for LatencyTool {
    fn name(&self) -> &'static str {
        "test_latency"
    }

    fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(
                "Measure round-trip latency and jitter to the edge network. Sends a \
                 configurable number of probe packets and reports aggregate timings."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timeout": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 300,
                        "description": "Overall test timeout in seconds"
                    },
                    "serverLocation": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Preferred edge server code (e.g. 'LAX')"
                    },
                    "packetCount": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "default": 10,
                        "description": "Number of probe packets to send"
                    },
                    "measurementType": {
                        "type": "string",
                        "enum": ["unloaded", "loaded"],
                        "default": "unloaded",
                        "description": "Measure on an idle or a saturated connection"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    fn operation_class(&self) -> OperationClass {
        OperationClass::LatencyTest
    }

    fn default_timeout_ms(&self) -> u64 {
        30_000
    }

    fn validate(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        parse_params::<LatencyParams>(arguments)?.validate()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
        deadline_ms: u64,
    ) -> Result<serde_json::Value, ToolError> {
        let params: LatencyParams = parse_params(&arguments)?;
        let results = ctx
            .probe
            .run_probe(
                ProbeShape::Latency,
                ProbeOptions {
                    packet_count: Some(params.packet_count),
                    server_location: params.server_location.clone(),
                    ..Default::default()
                },
                deadline_ms,
            )
            .await?;

        Ok(json!({
            "latency": results.unloaded_latency_ms.unwrap_or(0.0),
            "jitter": results.summary.jitter_ms.unwrap_or(0.0),
            "packetsSent": results.packets_sent.unwrap_or(params.packet_count as u64),
            "packetsReceived": results.packets_received.unwrap_or(0),
            "packetLoss": 0,
            "measurementType": params.measurement_type,
        }))
    }
}
