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

//! Tool errors
//!
//! Every failure surfaced to the controller carries one of five stable
//! codes. Classification order: an error that already has a code keeps it;
//! otherwise the message is matched against a small substring map; anything
//! left is `EXECUTION_ERROR`.

use serde::{Deserialize, Serialize};

/// Stable error codes surfaced in envelopes.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const RATE_LIMIT_ERROR: &str = "RATE_LIMIT_ERROR";
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
}

/// Error payload carried inside a failure envelope.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: String,
    pub message: String,
    #[serde(skip)]
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: codes::VALIDATION_ERROR.to_string(),
            message: message.into(),
            retryable: false,
            details: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            code: codes::RATE_LIMIT_ERROR.to_string(),
            message: message.into(),
            retryable: true,
            details: Some(details),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            code: codes::TIMEOUT_ERROR.to_string(),
            message: message.into(),
            retryable: true,
            details: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            code: codes::NETWORK_ERROR.to_string(),
            message: message.into(),
            retryable: true,
            details: None,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            code: codes::EXECUTION_ERROR.to_string(),
            message: message.into(),
            retryable: false,
            details: None,
        }
    }

    /// Build an error from a bare message, deriving the code by substring.
    pub fn classified(message: impl Into<String>) -> Self {
        let message = message.into();
        let code = classify_message(&message);
        Self {
            retryable: matches!(code, codes::TIMEOUT_ERROR | codes::NETWORK_ERROR | codes::RATE_LIMIT_ERROR),
            code: code.to_string(),
            message,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Derive an error code from a message with no code of its own.
pub fn classify_message(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if lower.contains("timeout") {
        codes::TIMEOUT_ERROR
    } else if lower.contains("rate limit") {
        codes::RATE_LIMIT_ERROR
    } else if lower.contains("validation") || lower.contains("invalid") {
        codes::VALIDATION_ERROR
    } else if lower.contains("network") || lower.contains("connection") {
        codes::NETWORK_ERROR
    } else {
        codes::EXECUTION_ERROR
    }
}
