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

//! Tool arguments
//!
//! Typed parameter structs for the seven tools. Every tool accepts the
//! common pair (`timeout` in seconds, `serverLocation`); the rest is
//! tool-specific. Unknown fields are rejected, matching the
//! `additionalProperties: false` schemas. Range violations are
//! `VALIDATION_ERROR`s with the offending value named.

use netgauge_core::{Continent, ToolError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_MEASUREMENT_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_MEASUREMENT_BYTES: u64 = 1 << 30;

/// Deserialize an argument object, mapping any serde failure to a
/// `VALIDATION_ERROR`.
pub fn parse_params<T: DeserializeOwned>(arguments: &serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| ToolError::validation(format!("invalid arguments: {}", e)))
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<(), ToolError> {
    if value < min || value > max {
        return Err(ToolError::validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

fn check_common(timeout: Option<u64>, server_location: &Option<String>) -> Result<(), ToolError> {
    if let Some(timeout) = timeout {
        check_range("timeout", timeout, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)?;
    }
    if let Some(location) = server_location {
        if location.trim().is_empty() {
            return Err(ToolError::validation("serverLocation must be a non-empty string"));
        }
    }
    Ok(())
}

/// Permissive view of the common arguments, used by the pipeline to pick
/// a deadline before tool-specific validation runs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonParams {
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub server_location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    #[default]
    Unloaded,
    Loaded,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LatencyParams {
    pub timeout: Option<u64>,
    pub server_location: Option<String>,
    pub packet_count: u32,
    pub measurement_type: MeasurementType,
}

impl Default for LatencyParams {
    fn default() -> Self {
        Self {
            timeout: None,
            server_location: None,
            packet_count: 10,
            measurement_type: MeasurementType::Unloaded,
        }
    }
}

impl LatencyParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_common(self.timeout, &self.server_location)?;
        check_range("packetCount", self.packet_count as u64, 1, 100)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BandwidthParams {
    pub timeout: Option<u64>,
    pub server_location: Option<String>,
    /// Measurement window in seconds.
    pub duration: u64,
    pub measurement_bytes: u64,
}

impl Default for BandwidthParams {
    fn default() -> Self {
        Self {
            timeout: None,
            server_location: None,
            duration: 15,
            measurement_bytes: DEFAULT_MEASUREMENT_BYTES,
        }
    }
}

impl BandwidthParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_common(self.timeout, &self.server_location)?;
        check_range("duration", self.duration, 5, 60)?;
        check_range(
            "measurementBytes",
            self.measurement_bytes,
            1024,
            MAX_MEASUREMENT_BYTES,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PacketLossParams {
    pub timeout: Option<u64>,
    pub server_location: Option<String>,
    pub packet_count: u32,
    pub batch_size: u32,
    /// Pause between batches, milliseconds.
    pub batch_wait_time: u64,
}

impl Default for PacketLossParams {
    fn default() -> Self {
        Self {
            timeout: None,
            server_location: None,
            packet_count: 100,
            batch_size: 10,
            batch_wait_time: 1_000,
        }
    }
}

impl PacketLossParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_common(self.timeout, &self.server_location)?;
        check_range("packetCount", self.packet_count as u64, 10, 1_000)?;
        check_range("batchSize", self.batch_size as u64, 1, 50)?;
        check_range("batchWaitTime", self.batch_wait_time, 100, 5_000)?;
        if self.batch_size > self.packet_count {
            return Err(ToolError::validation(format!(
                "batchSize ({}) must not exceed packetCount ({})",
                self.batch_size, self.packet_count
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeedTestType {
    Latency,
    Download,
    Upload,
    PacketLoss,
}

impl SpeedTestType {
    pub const ALL: [SpeedTestType; 4] = [
        SpeedTestType::Latency,
        SpeedTestType::Download,
        SpeedTestType::Upload,
        SpeedTestType::PacketLoss,
    ];
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct NestedLatencyOptions {
    pub packet_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct NestedTransferOptions {
    pub duration: Option<u64>,
    pub measurement_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct NestedPacketLossOptions {
    pub packet_count: Option<u32>,
    pub batch_size: Option<u32>,
    pub batch_wait_time: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SpeedTestParams {
    pub timeout: Option<u64>,
    pub server_location: Option<String>,
    pub test_types: Vec<SpeedTestType>,
    pub latency: Option<NestedLatencyOptions>,
    pub download: Option<NestedTransferOptions>,
    pub upload: Option<NestedTransferOptions>,
    pub packet_loss: Option<NestedPacketLossOptions>,
}

impl Default for SpeedTestParams {
    fn default() -> Self {
        Self {
            timeout: None,
            server_location: None,
            test_types: SpeedTestType::ALL.to_vec(),
            latency: None,
            download: None,
            upload: None,
            packet_loss: None,
        }
    }
}

impl SpeedTestParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_common(self.timeout, &self.server_location)?;
        if self.test_types.is_empty() {
            return Err(ToolError::validation("testTypes must not be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        for test_type in &self.test_types {
            if !seen.insert(*test_type) {
                return Err(ToolError::validation(format!(
                    "testTypes contains duplicate entry {:?}",
                    test_type
                )));
            }
        }
        if let Some(ref latency) = self.latency {
            if let Some(count) = latency.packet_count {
                check_range("latency.packetCount", count as u64, 1, 100)?;
            }
        }
        for (label, transfer) in [("download", &self.download), ("upload", &self.upload)] {
            if let Some(options) = transfer {
                if let Some(duration) = options.duration {
                    check_range(&format!("{}.duration", label), duration, 5, 60)?;
                }
                if let Some(bytes) = options.measurement_bytes {
                    check_range(
                        &format!("{}.measurementBytes", label),
                        bytes,
                        1024,
                        MAX_MEASUREMENT_BYTES,
                    )?;
                }
            }
        }
        if let Some(ref loss) = self.packet_loss {
            if let Some(count) = loss.packet_count {
                check_range("packetLoss.packetCount", count as u64, 10, 1_000)?;
            }
            if let Some(batch) = loss.batch_size {
                check_range("packetLoss.batchSize", batch as u64, 1, 50)?;
            }
            if let Some(wait) = loss.batch_wait_time {
                check_range("packetLoss.batchWaitTime", wait, 100, 5_000)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ConnectionInfoParams {
    pub timeout: Option<u64>,
    pub server_location: Option<String>,
    pub include_location: bool,
    pub include_isp: bool,
}

impl Default for ConnectionInfoParams {
    fn default() -> Self {
        Self {
            timeout: None,
            server_location: None,
            include_location: true,
            include_isp: true,
        }
    }
}

impl ConnectionInfoParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_common(self.timeout, &self.server_location)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ServerInfoParams {
    pub timeout: Option<u64>,
    pub server_location: Option<String>,
    pub continent: Option<Continent>,
    /// ISO 3166-1 alpha-2 code, uppercase.
    pub country: Option<String>,
    pub region: Option<String>,
    pub max_distance: Option<f64>,
    pub include_distance: bool,
    pub limit: u32,
}

impl Default for ServerInfoParams {
    fn default() -> Self {
        Self {
            timeout: None,
            server_location: None,
            continent: None,
            country: None,
            region: None,
            max_distance: None,
            include_distance: false,
            limit: 20,
        }
    }
}

impl ServerInfoParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_common(self.timeout, &self.server_location)?;
        if let Some(ref country) = self.country {
            let well_formed =
                country.len() == 2 && country.chars().all(|c| c.is_ascii_uppercase());
            if !well_formed {
                return Err(ToolError::validation(format!(
                    "country must match ^[A-Z]{{2}}$, got {:?}",
                    country
                )));
            }
        }
        if let Some(max_distance) = self.max_distance {
            if !max_distance.is_finite() || max_distance < 0.0 {
                return Err(ToolError::validation(format!(
                    "maxDistance must be a non-negative number, got {}",
                    max_distance
                )));
            }
        }
        check_range("limit", self.limit as u64, 1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latency_defaults() {
        let params: LatencyParams = parse_params(&json!({})).unwrap();
        assert_eq!(params.packet_count, 10);
        assert_eq!(params.measurement_type, MeasurementType::Unloaded);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<LatencyParams, _> = parse_params(&json!({"bogus": 1}));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_timeout_bounds() {
        let params: LatencyParams = parse_params(&json!({"timeout": 0})).unwrap();
        assert!(params.validate().is_err());
        let params: LatencyParams = parse_params(&json!({"timeout": 301})).unwrap();
        assert!(params.validate().is_err());
        let params: LatencyParams = parse_params(&json!({"timeout": 300})).unwrap();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_packet_count_range() {
        let params: LatencyParams = parse_params(&json!({"packetCount": 101})).unwrap();
        assert!(params.validate().is_err());
        let params: LatencyParams = parse_params(&json!({"packetCount": 0})).unwrap();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_bandwidth_ranges() {
        let params: BandwidthParams = parse_params(&json!({})).unwrap();
        assert_eq!(params.duration, 15);
        assert_eq!(params.measurement_bytes, DEFAULT_MEASUREMENT_BYTES);

        let params: BandwidthParams = parse_params(&json!({"duration": 4})).unwrap();
        assert!(params.validate().is_err());
        let params: BandwidthParams =
            parse_params(&json!({"measurementBytes": 1023})).unwrap();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_packet_loss_batch_constraint() {
        let params: PacketLossParams =
            parse_params(&json!({"packetCount": 10, "batchSize": 11})).unwrap();
        let err = params.validate().unwrap_err();
        assert!(err.message.contains("batchSize"));

        let params: PacketLossParams =
            parse_params(&json!({"packetCount": 10, "batchSize": 10})).unwrap();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_speed_test_defaults_to_all_types() {
        let params: SpeedTestParams = parse_params(&json!({})).unwrap();
        assert_eq!(params.test_types.len(), 4);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_speed_test_rejects_empty_and_duplicates() {
        let params: SpeedTestParams = parse_params(&json!({"testTypes": []})).unwrap();
        assert!(params.validate().is_err());

        let params: SpeedTestParams =
            parse_params(&json!({"testTypes": ["latency", "latency"]})).unwrap();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_speed_test_type_tags() {
        let params: SpeedTestParams =
            parse_params(&json!({"testTypes": ["packetLoss", "download"]})).unwrap();
        assert_eq!(
            params.test_types,
            vec![SpeedTestType::PacketLoss, SpeedTestType::Download]
        );
    }

    #[test]
    fn test_server_info_country_pattern() {
        let params: ServerInfoParams = parse_params(&json!({"country": "usa"})).unwrap();
        assert!(params.validate().is_err());
        let params: ServerInfoParams = parse_params(&json!({"country": "us"})).unwrap();
        assert!(params.validate().is_err());
        let params: ServerInfoParams = parse_params(&json!({"country": "US"})).unwrap();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_server_info_limit_and_distance() {
        let params: ServerInfoParams = parse_params(&json!({"limit": 0})).unwrap();
        assert!(params.validate().is_err());
        let params: ServerInfoParams = parse_params(&json!({"maxDistance": -1.0})).unwrap();
        assert!(params.validate().is_err());
        let params: ServerInfoParams =
            parse_params(&json!({"limit": 100, "maxDistance": 0.0})).unwrap();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_connection_info_defaults() {
        let params: ConnectionInfoParams = parse_params(&json!({})).unwrap();
        assert!(params.include_location);
        assert!(params.include_isp);
    }
}
