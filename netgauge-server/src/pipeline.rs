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

//! Tool pipeline
//!
//! One lifecycle for every invocation: validate, admit, run under a
//! deadline, release, emit. The admission guard is scoped to the run, so
//! the concurrency slot comes back on every exit path: early validation
//! returns, probe failures, deadline expiry, and task cancellation alike.
//! Every failure becomes an error envelope; nothing is swallowed.

use crate::rate_limiter::RateLimiter;
use crate::tools::params::CommonParams;
use crate::tools::{ToolContext, ToolHandler, ToolRegistry};
use netgauge_core::{ToolEnvelope, ToolError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The one failure the pipeline does not wrap in an envelope: the name
/// resolves to nothing, so there is no tool to attribute the envelope to.
#[derive(Debug, thiserror::Error)]
#[error("unknown tool: {0}")]
pub struct ToolNotFound(pub String);

pub struct ToolPipeline {
    registry: Arc<ToolRegistry>,
    limiter: Arc<RateLimiter>,
    context: ToolContext,
}

impl ToolPipeline {
    pub fn new(registry: Arc<ToolRegistry>, limiter: Arc<RateLimiter>, context: ToolContext) -> Self {
        Self {
            registry,
            limiter,
            context,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a tool by name and seal the outcome into an envelope.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolEnvelope, ToolNotFound> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolNotFound(name.to_string()))?;

        let started = Instant::now();
        let result = self.run_phases(tool.as_ref(), arguments).await;
        let execution_time = started.elapsed().as_millis() as u64;
        let timestamp = chrono::Utc::now().to_rfc3339();

        Ok(match result {
            Ok(data) => {
                tracing::info!(tool = name, execution_time, "tool invocation succeeded");
                ToolEnvelope::success(data, execution_time, timestamp)
            }
            Err(error) => {
                tracing::warn!(
                    tool = name,
                    code = %error.code,
                    execution_time,
                    "tool invocation failed: {}",
                    error.message
                );
                ToolEnvelope::failure(name, error, execution_time, timestamp)
            }
        })
    }

    async fn run_phases(
        &self,
        tool: &dyn ToolHandler,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        tool.validate(&arguments)?;

        let guard = self.limiter.acquire(tool.operation_class())?;

        let common: CommonParams = serde_json::from_value(arguments.clone()).unwrap_or_default();
        let deadline_ms = common
            .timeout
            .map(|secs| secs * 1_000)
            .unwrap_or_else(|| tool.default_timeout_ms());

        let outcome = tokio::time::timeout(
            Duration::from_millis(deadline_ms),
            tool.run(&self.context, arguments, deadline_ms),
        )
        .await;
        drop(guard);

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ToolError::timeout(format!(
                "tool {} timed out after {}ms",
                tool.name(),
                deadline_ms
            ))),
        }
    }
}
