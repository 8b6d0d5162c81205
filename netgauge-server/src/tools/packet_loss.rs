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

use super::params::{parse_params, PacketLossParams};
use super::{ToolContext, ToolHandler};
use crate::mcp::protocol::Tool;
use crate::probe::{ProbeOptions, ProbeShape};
use async_trait::async_trait;
use netgauge_core::{OperationClass, ToolError};
use serde_json::json;

/// `test_packet_loss`: batched probes, loss percentage per batch.
pub struct PacketLossTool;

#[async_trait]
impl ToolHandler for PacketLossTool {
    fn name(&self) -> &'static str {
        "test_packet_loss"
    }

    fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(
                "Measure packet loss by sending probe packets in batches and counting \
                 how many complete the round trip."
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
                        "minimum": 10,
                        "maximum": 1000,
                        "default": 100,
                        "description": "Total probe packets to send"
                    },
                    "batchSize": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 50,
                        "default": 10,
                        "description": "Packets per batch; must not exceed packetCount"
                    },
                    "batchWaitTime": {
                        "type": "integer",
                        "minimum": 100,
                        "maximum": 5000,
                        "default": 1000,
                        "description": "Pause between batches in milliseconds"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    fn operation_class(&self) -> OperationClass {
        OperationClass::PacketLossTest
    }

    fn default_timeout_ms(&self) -> u64 {
        60_000
    }

    fn validate(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        parse_params::<PacketLossParams>(arguments)?.validate()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
        deadline_ms: u64,
    ) -> Result<serde_json::Value, ToolError> {
        let params: PacketLossParams = parse_params(&arguments)?;
        let results = ctx
            .probe
            .run_probe(
                ProbeShape::PacketLoss,
                ProbeOptions {
                    packet_count: Some(params.packet_count),
                    batch_size: Some(params.batch_size),
                    batch_wait_ms: Some(params.batch_wait_time),
                    server_location: params.server_location.clone(),
                    ..Default::default()
                },
                deadline_ms,
            )
            .await?;

        let sent = results.packets_sent.unwrap_or(params.packet_count as u64);
        let received = results.packets_received.unwrap_or(sent);
        Ok(json!({
            "packetLoss": results.packet_loss_fraction.unwrap_or(0.0) * 100.0,
            "totalPackets": sent,
            "lostPackets": sent.saturating_sub(received),
            "batchResults": results.batches,
        }))
    }
}
