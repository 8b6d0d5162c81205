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

//! Tool catalog
//!
//! The seven diagnostic tools, registered by stable name. Each handler
//! carries its schema, operation-class binding, default deadline, and the
//! result shaper; the pipeline applies the shared lifecycle around them.

pub mod connection_info;
pub mod latency;
pub mod packet_loss;
pub mod params;
pub mod server_info;
pub mod transfer;

use crate::catalog::ServerCatalog;
use crate::mcp::protocol::Tool;
use crate::probe::ProbeClient;
use async_trait::async_trait;
use netgauge_core::{OperationClass, ToolError};
use std::sync::Arc;

/// Shared collaborators handed to every tool run.
pub struct ToolContext {
    pub probe: Arc<dyn ProbeClient>,
    pub catalog: Arc<ServerCatalog>,
}

/// One registered tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Discovery record: name, description, input schema.
    fn definition(&self) -> Tool;

    fn operation_class(&self) -> OperationClass;

    /// Deadline when the caller does not pass `timeout`.
    fn default_timeout_ms(&self) -> u64;

    /// Schema/range validation; runs before admission.
    fn validate(&self, arguments: &serde_json::Value) -> Result<(), ToolError>;

    /// Execute against the probe surface and shape the result.
    async fn run(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
        deadline_ms: u64,
    ) -> Result<serde_json::Value, ToolError>;
}

/// Name -> handler registry for the seven tools.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: vec![
                Arc::new(latency::LatencyTool),
                Arc::new(transfer::DownloadSpeedTool),
                Arc::new(transfer::UploadSpeedTool),
                Arc::new(packet_loss::PacketLossTool),
                Arc::new(speed_test::SpeedTestTool),
                Arc::new(connection_info::ConnectionInfoTool),
                Arc::new(server_info::ServerInfoTool),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.iter().find(|tool| tool.name() == name).cloned()
    }

    /// Discovery records for `tools/list`.
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_holds_seven_tools() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.len(), 7);
        for name in [
            "test_latency",
            "test_download_speed",
            "test_upload_speed",
            "test_packet_loss",
            "run_speed_test",
            "get_connection_info",
            "get_server_info",
        ] {
            assert!(registry.get(name).is_some(), "missing tool {}", name);
        }
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_names_are_unique_and_stable() {
        let registry = ToolRegistry::new();
        let mut names: Vec<_> = registry
            .definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn test_schemas_close_additional_properties() {
        let registry = ToolRegistry::new();
        for tool in registry.definitions() {
            assert_eq!(
                tool.input_schema["additionalProperties"],
                serde_json::json!(false),
                "tool {} schema must close additionalProperties",
                tool.name
            );
            assert_eq!(tool.input_schema["type"], "object");
        }
    }

    #[test]
    fn test_class_bindings() {
        let registry = ToolRegistry::new();
        let class_of = |name: &str| registry.get(name).unwrap().operation_class();
        assert_eq!(class_of("test_latency"), OperationClass::LatencyTest);
        assert_eq!(class_of("test_download_speed"), OperationClass::DownloadTest);
        assert_eq!(class_of("test_upload_speed"), OperationClass::UploadTest);
        assert_eq!(class_of("test_packet_loss"), OperationClass::PacketLossTest);
        assert_eq!(class_of("run_speed_test"), OperationClass::SpeedTest);
        assert_eq!(class_of("get_connection_info"), OperationClass::ConnectionInfo);
        assert_eq!(class_of("get_server_info"), OperationClass::ConnectionInfo);
    }
}
