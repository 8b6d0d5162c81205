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

//! Probe client
//!
//! Narrow interface over the edge network's measurement surface. This is
//! the only part of the server permitted to perform network I/O; everything
//! above it consumes the [`ProbeClient`] trait, so tests swap the whole
//! engine for a canned implementation.
//!
//! Deadlines are enforced here by racing the probe against a timer; expiry
//! is a [`ProbeError::Timeout`], distinct from execution failures. The
//! adapter carries no rate limiting of its own; admission belongs to the
//! pipeline.

pub mod http;

pub use http::HttpProbeClient;

use async_trait::async_trait;
use netgauge_core::{codes, ServerEntry, ToolError};
use serde::{Deserialize, Serialize};

/// Which measurement to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeShape {
    Latency,
    Download,
    Upload,
    PacketLoss,
    Full,
}

/// Validated knobs forwarded from tool arguments.
#[derive(Debug, Clone, Default)]
pub struct ProbeOptions {
    pub packet_count: Option<u32>,
    pub duration_secs: Option<u64>,
    pub measurement_bytes: Option<u64>,
    pub batch_size: Option<u32>,
    pub batch_wait_ms: Option<u64>,
    pub server_location: Option<String>,
}

/// One batch of packet-loss probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSample {
    pub batch: u32,
    pub sent: u32,
    pub received: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
}

/// What a probe run produced. Fields the shape did not measure stay `None`.
#[derive(Debug, Clone, Default)]
pub struct ProbeResults {
    pub download_bandwidth_bps: Option<f64>,
    pub upload_bandwidth_bps: Option<f64>,
    pub unloaded_latency_ms: Option<f64>,
    pub packet_loss_fraction: Option<f64>,
    pub packets_sent: Option<u64>,
    pub packets_received: Option<u64>,
    pub batches: Vec<BatchSample>,
    pub bytes_transferred: Option<u64>,
    pub measurement_secs: Option<f64>,
    pub summary: ProbeSummary,
}

/// Connection trace from the edge's plaintext `key=value` endpoint.
/// Absent fields default to the literal string `unknown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTrace {
    pub ip: String,
    pub isp: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub timezone: String,
    /// Edge colo the trace was served from, when reported.
    pub colo: String,
}

impl Default for ConnectionTrace {
    fn default() -> Self {
        let unknown = || "unknown".to_string();
        Self {
            ip: unknown(),
            isp: unknown(),
            country: unknown(),
            region: unknown(),
            city: unknown(),
            timezone: unknown(),
            colo: unknown(),
        }
    }
}

impl ConnectionTrace {
    /// Parse the plaintext body, one `key=value` pair per line.
    pub fn parse(body: &str) -> Self {
        let mut trace = Self::default();
        for line in body.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "ip" => trace.ip = value.to_string(),
                "isp" => trace.isp = value.to_string(),
                "loc" => trace.country = value.to_string(),
                "region" => trace.region = value.to_string(),
                "city" => trace.city = value.to_string(),
                "timezone" => trace.timezone = value.to_string(),
                "colo" => trace.colo = value.to_string(),
                _ => {}
            }
        }
        trace
    }
}

/// Message substrings treated as transient transport faults.
pub const RETRYABLE_MARKERS: [&str; 6] = [
    "ECONNRESET",
    "ETIMEDOUT",
    "ENOTFOUND",
    "ECONNREFUSED",
    "NETWORK_ERROR",
    "TIMEOUT_ERROR",
];

pub fn message_is_retryable(message: &str) -> bool {
    RETRYABLE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Probe failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out after {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },
    #[error("{message}")]
    Execution { message: String, retryable: bool },
}

impl ProbeError {
    pub fn execution(message: impl Into<String>, retryable: bool) -> Self {
        Self::Execution {
            message: message.into(),
            retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ProbeError::Timeout { .. } => true,
            ProbeError::Execution { retryable, .. } => *retryable,
        }
    }
}

impl From<ProbeError> for ToolError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Timeout { deadline_ms } => {
                ToolError::timeout(format!("probe timed out after {}ms", deadline_ms))
            }
            ProbeError::Execution { message, retryable } => ToolError {
                code: codes::NETWORK_ERROR.to_string(),
                message,
                retryable,
                details: None,
            },
        }
    }
}

/// The seam between the pipeline and the measurement engine.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    /// Run one typed probe under a deadline.
    async fn run_probe(
        &self,
        shape: ProbeShape,
        options: ProbeOptions,
        deadline_ms: u64,
    ) -> Result<ProbeResults, ProbeError>;

    /// Fetch the connection trace.
    async fn get_trace(&self, deadline_ms: u64) -> Result<ConnectionTrace, ProbeError>;

    /// Fetch the raw (pre-enrichment) server list.
    async fn list_servers(&self, deadline_ms: u64) -> Result<Vec<ServerEntry>, ProbeError>;

    /// Liveness probe; any failure is `false`, never an error.
    async fn health_check(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_parse_full_body() {
        let body = "ip=1.2.3.4\nisp=Test ISP\nloc=US\nregion=CA\ncity=San Francisco\ntimezone=America/Los_Angeles";
        let trace = ConnectionTrace::parse(body);
        assert_eq!(trace.ip, "1.2.3.4");
        assert_eq!(trace.isp, "Test ISP");
        assert_eq!(trace.country, "US");
        assert_eq!(trace.region, "CA");
        assert_eq!(trace.city, "San Francisco");
        assert_eq!(trace.timezone, "America/Los_Angeles");
    }

    #[test]
    fn test_trace_parse_missing_fields_default_unknown() {
        let trace = ConnectionTrace::parse("ip=9.9.9.9\ncolo=SJC");
        assert_eq!(trace.ip, "9.9.9.9");
        assert_eq!(trace.colo, "SJC");
        assert_eq!(trace.isp, "unknown");
        assert_eq!(trace.country, "unknown");
        assert_eq!(trace.timezone, "unknown");
    }

    #[test]
    fn test_trace_parse_ignores_junk_lines() {
        let trace = ConnectionTrace::parse("garbage\n=nokey\nip=8.8.8.8\nextra=field");
        assert_eq!(trace.ip, "8.8.8.8");
    }

    #[test]
    fn test_retryable_markers() {
        assert!(message_is_retryable("connect: ECONNREFUSED"));
        assert!(message_is_retryable("TIMEOUT_ERROR: deadline"));
        assert!(!message_is_retryable("404 not found"));
    }

    #[test]
    fn test_timeout_maps_to_timeout_code() {
        let err: ToolError = ProbeError::Timeout { deadline_ms: 1 }.into();
        assert_eq!(err.code, codes::TIMEOUT_ERROR);
        assert!(err.retryable);
    }

    #[test]
    fn test_execution_maps_to_network_code() {
        let err: ToolError = ProbeError::execution("ECONNRESET mid-transfer", true).into();
        assert_eq!(err.code, codes::NETWORK_ERROR);
        assert!(err.retryable);
    }
}
