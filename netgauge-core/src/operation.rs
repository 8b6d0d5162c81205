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

//! Operation classes
//!
//! Every tool binds to exactly one operation class; the class identifies
//! the rate-limit bucket the invocation is admitted against. `Ping` and
//! `Traceroute` are reserved for future tools and carry conservative
//! defaults so limiter operations stay total over the enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rate-limit bucket identity. One per kind of diagnostic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    SpeedTest,
    LatencyTest,
    DownloadTest,
    UploadTest,
    PacketLossTest,
    ConnectionInfo,
    Ping,
    Traceroute,
}

impl OperationClass {
    /// All recognized classes, in declaration order.
    pub const ALL: [OperationClass; 8] = [
        OperationClass::SpeedTest,
        OperationClass::LatencyTest,
        OperationClass::DownloadTest,
        OperationClass::UploadTest,
        OperationClass::PacketLossTest,
        OperationClass::ConnectionInfo,
        OperationClass::Ping,
        OperationClass::Traceroute,
    ];

    /// Canonical lowercase-underscore tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::SpeedTest => "speed_test",
            OperationClass::LatencyTest => "latency_test",
            OperationClass::DownloadTest => "download_test",
            OperationClass::UploadTest => "upload_test",
            OperationClass::PacketLossTest => "packet_loss_test",
            OperationClass::ConnectionInfo => "connection_info",
            OperationClass::Ping => "ping",
            OperationClass::Traceroute => "traceroute",
        }
    }

    /// Environment-variable segment for this class.
    ///
    /// The rule is exactly one transformation: the canonical tag, uppercased.
    /// `speed_test` becomes `SPEED_TEST`, so the full variable reads
    /// `RATE_LIMIT_SPEED_TEST_MAX_BUCKET_SIZE`.
    pub fn env_segment(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationClass::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown operation class: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_tags() {
        for class in OperationClass::ALL {
            assert_eq!(class.as_str().parse::<OperationClass>().unwrap(), class);
        }
    }

    #[test]
    fn test_env_segment_derivation() {
        assert_eq!(OperationClass::SpeedTest.env_segment(), "SPEED_TEST");
        assert_eq!(
            OperationClass::PacketLossTest.env_segment(),
            "PACKET_LOSS_TEST"
        );
        assert_eq!(OperationClass::Ping.env_segment(), "PING");
    }

    #[test]
    fn test_serde_uses_canonical_tag() {
        let json = serde_json::to_string(&OperationClass::ConnectionInfo).unwrap();
        assert_eq!(json, "\"connection_info\"");
        let back: OperationClass = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OperationClass::ConnectionInfo);
    }
}
