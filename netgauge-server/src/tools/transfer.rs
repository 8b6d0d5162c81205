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

//! Bandwidth tools
//!
//! `test_download_speed` and `test_upload_speed` share the transfer
//! parameter set and the result shape; only the probe direction differs.

use super::params::{parse_params, BandwidthParams};
use super::{ToolContext, ToolHandler};
use crate::mcp::protocol::Tool;
use crate::probe::{ProbeOptions, ProbeResults, ProbeShape};
use async_trait::async_trait;
use netgauge_core::{OperationClass, ToolError};
use serde_json::json;

fn transfer_schema(direction: &str) -> serde_json::Value {
    json!({
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
            "duration": {
                "type": "integer",
                "minimum": 5,
                "maximum": 60,
                "default": 15,
                "description": format!("Target {} measurement window in seconds", direction)
            },
            "measurementBytes": {
                "type": "integer",
                "minimum": 1024,
                "maximum": 1073741824,
                "default": 10485760,
                "description": "Transfer size for the measurement, in bytes"
            }
        },
        "additionalProperties": false
    })
}

fn shape_transfer(results: &ProbeResults, bandwidth_bps: f64, requested_bytes: u64) -> serde_json::Value {
    json!({
        "bandwidth": bandwidth_bps,
        "bytes": results.bytes_transferred.unwrap_or(requested_bytes),
        "duration": results.measurement_secs.unwrap_or(0.0),
        "throughput": bandwidth_bps / 8.0,
    })
}

/// `test_download_speed`: timed download against the edge.
pub struct DownloadSpeedTool;

#[async_trait]
impl ToolHandler for DownloadSpeedTool {
    fn name(&self) -> &'static str {
        "test_download_speed"
    }

    fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(
                "Measure download bandwidth with a timed transfer from the edge network."
                    .to_string(),
            ),
            input_schema: transfer_schema("download"),
        }
    }

    fn operation_class(&self) -> OperationClass {
        OperationClass::DownloadTest
    }

    fn default_timeout_ms(&self) -> u64 {
        30_000
    }

    fn validate(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        parse_params::<BandwidthParams>(arguments)?.validate()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
        deadline_ms: u64,
    ) -> Result<serde_json::Value, ToolError> {
        let params: BandwidthParams = parse_params(&arguments)?;
        let results = ctx
            .probe
            .run_probe(
                ProbeShape::Download,
                ProbeOptions {
                    duration_secs: Some(params.duration),
                    measurement_bytes: Some(params.measurement_bytes),
                    server_location: params.server_location.clone(),
                    ..Default::default()
                },
                deadline_ms,
            )
            .await?;

        let bandwidth = results.download_bandwidth_bps.unwrap_or(0.0);
        Ok(shape_transfer(&results, bandwidth, params.measurement_bytes))
    }
}

/// `test_upload_speed`: timed upload toward the edge.
pub struct UploadSpeedTool;

#[async_trait]
impl ToolHandler for UploadSpeedTool {
    fn name(&self) -> &'static str {
        "test_upload_speed"
    }

    fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(
                "Measure upload bandwidth with a timed transfer toward the edge network."
                    .to_string(),
            ),
            input_schema: transfer_schema("upload"),
        }
    }

    fn operation_class(&self) -> OperationClass {
        OperationClass::UploadTest
    }

    fn default_timeout_ms(&self) -> u64 {
        30_000
    }

    fn validate(&self, arguments: &serde_json::Value) -> Result<(), ToolError> {
        parse_params::<BandwidthParams>(arguments)?.validate()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
        deadline_ms: u64,
    ) -> Result<serde_json::Value, ToolError> {
        let params: BandwidthParams = parse_params(&arguments)?;
        let results = ctx
            .probe
            .run_probe(
                ProbeShape::Upload,
                ProbeOptions {
                    duration_secs: Some(params.duration),
                    measurement_bytes: Some(params.measurement_bytes),
                    server_location: params.server_location.clone(),
                    ..Default::default()
                },
                deadline_ms,
            )
            .await?;

        let bandwidth = results.upload_bandwidth_bps.unwrap_or(0.0);
        Ok(shape_transfer(&results, bandwidth, params.measurement_bytes))
    }
}
