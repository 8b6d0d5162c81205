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

//! Admission-control configuration and results
//!
//! Per-class token-bucket settings with daily and concurrency caps, the
//! process-wide backoff curve, and the result/status types the rate limiter
//! reports. Configuration is immutable for the life of the process; the
//! env surface is `RATE_LIMIT_<CLASS>_*` plus `RATE_LIMIT_BACKOFF_*`.

use crate::config::{env_f64, env_u64};
use crate::operation::OperationClass;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Token-bucket settings for one operation class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Tokens added per refill interval.
    pub tokens_per_interval: u64,
    /// Refill interval in milliseconds.
    pub interval_ms: u64,
    /// Burst ceiling; must be >= `tokens_per_interval`.
    pub max_bucket_size: u64,
    /// Hard cap on admissions per local day.
    pub max_daily_requests: u64,
    /// Simultaneous in-flight cap.
    pub max_concurrent_requests: u64,
    /// Advisory retry hint when the concurrency gate denies.
    pub concurrent_limit_wait_ms: u64,
}

impl BucketConfig {
    /// Compiled-in defaults per class.
    pub fn defaults_for(class: OperationClass) -> Self {
        let (tokens_per_interval, interval_ms, max_bucket_size, max_daily_requests, max_concurrent_requests) =
            match class {
                OperationClass::SpeedTest => (1, 180_000, 2, 50, 1),
                OperationClass::LatencyTest => (10, 60_000, 15, 500, 3),
                OperationClass::DownloadTest => (2, 120_000, 3, 100, 2),
                OperationClass::UploadTest => (2, 120_000, 3, 100, 2),
                OperationClass::PacketLossTest => (5, 90_000, 8, 200, 2),
                OperationClass::ConnectionInfo => (20, 60_000, 30, 1000, 5),
                // Reserved classes until tools bind to them.
                OperationClass::Ping | OperationClass::Traceroute => (20, 60_000, 30, 1000, 5),
            };

        Self {
            tokens_per_interval,
            interval_ms,
            max_bucket_size,
            max_daily_requests,
            max_concurrent_requests,
            concurrent_limit_wait_ms: 1_000,
        }
    }

    /// Defaults overridden by `RATE_LIMIT_<CLASS>_*` environment variables.
    pub fn from_env(class: OperationClass) -> Self {
        let defaults = Self::defaults_for(class);
        let seg = class.env_segment();

        let mut config = Self {
            tokens_per_interval: env_u64(
                &format!("RATE_LIMIT_{}_TOKENS_PER_INTERVAL", seg),
                1..=1_000,
                defaults.tokens_per_interval,
            ),
            interval_ms: env_u64(
                &format!("RATE_LIMIT_{}_INTERVAL_MS", seg),
                1..=86_400_000,
                defaults.interval_ms,
            ),
            max_bucket_size: env_u64(
                &format!("RATE_LIMIT_{}_MAX_BUCKET_SIZE", seg),
                1..=10_000,
                defaults.max_bucket_size,
            ),
            max_daily_requests: env_u64(
                &format!("RATE_LIMIT_{}_MAX_DAILY_REQUESTS", seg),
                1..=100_000,
                defaults.max_daily_requests,
            ),
            max_concurrent_requests: env_u64(
                &format!("RATE_LIMIT_{}_MAX_CONCURRENT_REQUESTS", seg),
                1..=100,
                defaults.max_concurrent_requests,
            ),
            concurrent_limit_wait_ms: defaults.concurrent_limit_wait_ms,
        };

        // Burst ceiling below the refill quantum cannot hold the invariant
        // tokens <= max_bucket_size across a refill.
        if config.max_bucket_size < config.tokens_per_interval {
            tracing::warn!(
                class = %class,
                max_bucket_size = config.max_bucket_size,
                tokens_per_interval = config.tokens_per_interval,
                "max_bucket_size below tokens_per_interval, raising to match"
            );
            config.max_bucket_size = config.tokens_per_interval;
        }

        config
    }
}

/// Process-wide backoff curve for repeated admission denials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Jitter amplitude as a fraction of the computed delay, in [0, 1].
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl BackoffConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_delay_ms: env_u64(
                "RATE_LIMIT_BACKOFF_BASE_DELAY_MS",
                1..=60_000,
                defaults.base_delay_ms,
            ),
            max_delay_ms: env_u64(
                "RATE_LIMIT_BACKOFF_MAX_DELAY_MS",
                1..=600_000,
                defaults.max_delay_ms,
            ),
            multiplier: env_f64(
                "RATE_LIMIT_BACKOFF_MULTIPLIER",
                1.0..=10.0,
                defaults.multiplier,
            ),
            jitter_factor: env_f64(
                "RATE_LIMIT_BACKOFF_JITTER_FACTOR",
                0.0..=1.0,
                defaults.jitter_factor,
            ),
        }
    }
}

/// Full limiter configuration: one bucket per class plus the backoff curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub buckets: HashMap<OperationClass, BucketConfig>,
    pub backoff: BackoffConfig,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl RateLimitSettings {
    /// Compiled-in defaults for every class.
    pub fn defaults() -> Self {
        Self {
            buckets: OperationClass::ALL
                .iter()
                .map(|&class| (class, BucketConfig::defaults_for(class)))
                .collect(),
            backoff: BackoffConfig::default(),
        }
    }

    /// Defaults overridden from the environment.
    pub fn from_env() -> Self {
        Self {
            buckets: OperationClass::ALL
                .iter()
                .map(|&class| (class, BucketConfig::from_env(class)))
                .collect(),
            backoff: BackoffConfig::from_env(),
        }
    }

    /// Replace one class's bucket configuration (test and embedding hook).
    pub fn with_bucket(mut self, class: OperationClass, config: BucketConfig) -> Self {
        self.buckets.insert(class, config);
        self
    }
}

/// Why an admission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    TokenBucket,
    DailyLimit,
    ConcurrentLimit,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            DenialReason::TokenBucket => "token_bucket",
            DenialReason::DailyLimit => "daily_limit",
            DenialReason::ConcurrentLimit => "concurrent_limit",
        };
        f.write_str(tag)
    }
}

/// Outcome of a single `check_and_consume` evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_requests_remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl AdmissionResult {
    pub fn allowed(remaining_tokens: u64, daily_requests_remaining: u64) -> Self {
        Self {
            allowed: true,
            remaining_tokens: Some(remaining_tokens),
            wait_time_ms: None,
            daily_requests_remaining: Some(daily_requests_remaining),
            reason: None,
        }
    }

    pub fn denied(reason: DenialReason, wait_time_ms: u64) -> Self {
        Self {
            allowed: false,
            remaining_tokens: None,
            wait_time_ms: Some(wait_time_ms),
            daily_requests_remaining: None,
            reason: Some(reason),
        }
    }
}

/// Non-mutating snapshot of one bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketStatus {
    pub tokens_remaining: u64,
    pub daily_requests_remaining: u64,
    pub concurrent_requests: u64,
    /// Milliseconds until the next token lands; 0 when the bucket is full.
    pub next_token_refill_ms: u64,
    /// Next daily boundary as epoch milliseconds.
    pub daily_reset_time_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_table() {
        let c = BucketConfig::defaults_for(OperationClass::SpeedTest);
        assert_eq!(c.tokens_per_interval, 1);
        assert_eq!(c.interval_ms, 180_000);
        assert_eq!(c.max_bucket_size, 2);
        assert_eq!(c.max_daily_requests, 50);
        assert_eq!(c.max_concurrent_requests, 1);
        assert_eq!(c.concurrent_limit_wait_ms, 1_000);

        let c = BucketConfig::defaults_for(OperationClass::ConnectionInfo);
        assert_eq!(c.tokens_per_interval, 20);
        assert_eq!(c.max_daily_requests, 1_000);
    }

    #[test]
    fn test_burst_never_below_refill_quantum() {
        for class in OperationClass::ALL {
            let c = BucketConfig::defaults_for(class);
            assert!(c.max_bucket_size >= c.tokens_per_interval, "{}", class);
        }
    }

    #[test]
    fn test_env_override_single_class() {
        std::env::set_var("RATE_LIMIT_DOWNLOAD_TEST_MAX_DAILY_REQUESTS", "42");
        let c = BucketConfig::from_env(OperationClass::DownloadTest);
        assert_eq!(c.max_daily_requests, 42);
        // Untouched classes keep their defaults.
        let other = BucketConfig::from_env(OperationClass::UploadTest);
        assert_eq!(other.max_daily_requests, 100);
        std::env::remove_var("RATE_LIMIT_DOWNLOAD_TEST_MAX_DAILY_REQUESTS");
    }

    #[test]
    fn test_env_out_of_bounds_falls_back() {
        std::env::set_var("RATE_LIMIT_UPLOAD_TEST_MAX_CONCURRENT_REQUESTS", "5000");
        let c = BucketConfig::from_env(OperationClass::UploadTest);
        assert_eq!(c.max_concurrent_requests, 2);
        std::env::remove_var("RATE_LIMIT_UPLOAD_TEST_MAX_CONCURRENT_REQUESTS");
    }

    #[test]
    fn test_denial_reason_tags() {
        assert_eq!(DenialReason::TokenBucket.to_string(), "token_bucket");
        assert_eq!(DenialReason::DailyLimit.to_string(), "daily_limit");
        assert_eq!(DenialReason::ConcurrentLimit.to_string(), "concurrent_limit");
        let json = serde_json::to_string(&DenialReason::ConcurrentLimit).unwrap();
        assert_eq!(json, "\"concurrent_limit\"");
    }
}
