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

//! Result envelopes
//!
//! Every invocation outcome, success or failure, is wrapped in a
//! [`ToolEnvelope`] and serialized as one canonical-JSON text block. Error
//! envelopes additionally name the tool so the controller can correlate
//! failures without tracking request state.

use crate::error::ToolError;
use serde::{Deserialize, Serialize};

/// Outer wrapper emitted for every tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    /// Wall time spent on the invocation, in milliseconds.
    pub execution_time: u64,
    /// RFC 3339 timestamp taken when the envelope is sealed.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ToolEnvelope {
    pub fn success(data: serde_json::Value, execution_time: u64, timestamp: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            execution_time,
            timestamp,
            tool_name: None,
        }
    }

    pub fn failure(
        tool_name: impl Into<String>,
        error: ToolError,
        execution_time: u64,
        timestamp: String,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            execution_time,
            timestamp,
            tool_name: Some(tool_name.into()),
        }
    }

    /// Canonical JSON for the transport's text content block.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"success\":false,\"error\":{{\"code\":\"EXECUTION_ERROR\",\"message\":\"envelope serialization failed: {}\"}}}}",
                e
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_round_trip() {
        let envelope = ToolEnvelope::success(
            json!({"latency": 12.5, "jitter": 1.2}),
            37,
            "2025-06-01T12:00:00Z".to_string(),
        );
        let text = envelope.to_json();
        let parsed: ToolEnvelope = serde_json::from_str(&text).unwrap();
        let reserialized = parsed.to_json();
        let a: serde_json::Value = serde_json::from_str(&text).unwrap();
        let b: serde_json::Value = serde_json::from_str(&reserialized).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_success_shape() {
        let envelope = ToolEnvelope::success(json!({"ok": true}), 5, "t".into());
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["executionTime"], 5);
        assert!(value.get("error").is_none());
        assert!(value.get("toolName").is_none());
    }

    #[test]
    fn test_failure_shape_names_tool() {
        let envelope = ToolEnvelope::failure(
            "test_latency",
            ToolError::timeout("probe timed out after 30000ms"),
            30_001,
            "t".into(),
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["toolName"], "test_latency");
        assert_eq!(value["error"]["code"], "TIMEOUT_ERROR");
        assert!(value.get("data").is_none());
    }
}
