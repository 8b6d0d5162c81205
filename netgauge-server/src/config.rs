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

use anyhow::Result;
use netgauge_core::RateLimitSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Netgauge server configuration.
///
/// Layering: TOML file, then environment, then CLI flags. Rate-limit
/// tunables come exclusively from `RATE_LIMIT_*` environment variables
/// (see `netgauge_core::limits`); the file configures the probe surface
/// and lifecycle knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(skip)]
    pub rate_limit: RateLimitSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            shutdown: ShutdownConfig::default(),
            rate_limit: RateLimitSettings::defaults(),
        }
    }
}

/// Probe adapter endpoints and HTTP client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Edge network base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Plaintext `key=value` trace endpoint path.
    #[serde(default = "default_trace_path")]
    pub trace_path: String,

    /// JSON server-catalog endpoint path.
    #[serde(default = "default_locations_path")]
    pub locations_path: String,

    /// Timed-download endpoint path (takes `?bytes=N`).
    #[serde(default = "default_down_path")]
    pub down_path: String,

    /// Timed-upload endpoint path.
    #[serde(default = "default_up_path")]
    pub up_path: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            trace_path: default_trace_path(),
            locations_path: default_locations_path(),
            down_path: default_down_path(),
            up_path: default_up_path(),
            user_agent: default_user_agent(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Graceful-shutdown knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight invocations before giving up.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://speed.cloudflare.com".to_string()
}

fn default_trace_path() -> String {
    "/cdn-cgi/trace".to_string()
}

fn default_locations_path() -> String {
    "/locations".to_string()
}

fn default_down_path() -> String {
    "/__down".to_string()
}

fn default_up_path() -> String {
    "/__up".to_string()
}

fn default_user_agent() -> String {
    format!("netgauge/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.rate_limit = RateLimitSettings::from_env();
        Ok(config)
    }

    /// Defaults overridden by environment variables.
    ///
    /// Recognized variables:
    /// - `NETGAUGE_PROBE_BASE_URL`: edge network base URL
    /// - `NETGAUGE_DRAIN_TIMEOUT_MS`: shutdown drain window
    /// - `RATE_LIMIT_<CLASS>_*`, `RATE_LIMIT_BACKOFF_*`: limiter tunables
    /// - `LOG_LEVEL`: default log level when `RUST_LOG` is unset
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("NETGAUGE_PROBE_BASE_URL") {
            config.probe.base_url = base_url;
        }
        if let Ok(raw) = std::env::var("NETGAUGE_DRAIN_TIMEOUT_MS") {
            match raw.parse() {
                Ok(val) => config.shutdown.drain_timeout_ms = val,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid NETGAUGE_DRAIN_TIMEOUT_MS"),
            }
        }
        config.rate_limit = RateLimitSettings::from_env();
        config
    }

    /// Load with priority: file, then environment on top.
    pub fn load(config_file: Option<std::path::PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        if std::env::var("NETGAUGE_PROBE_BASE_URL").is_ok()
            || std::env::var("NETGAUGE_DRAIN_TIMEOUT_MS").is_ok()
        {
            let env_config = Self::from_env();
            if std::env::var("NETGAUGE_PROBE_BASE_URL").is_ok() {
                config.probe.base_url = env_config.probe.base_url;
            }
            if std::env::var("NETGAUGE_DRAIN_TIMEOUT_MS").is_ok() {
                config.shutdown.drain_timeout_ms = env_config.shutdown.drain_timeout_ms;
            }
        }
        config.rate_limit = RateLimitSettings::from_env();

        Ok(config)
    }

    /// Validate the configuration before startup.
    pub fn validate(&self) -> Result<()> {
        let url: reqwest::Url = self.probe.base_url.parse()?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("probe base_url must be http(s), got {}", url.scheme());
        }
        for (name, path) in [
            ("trace_path", &self.probe.trace_path),
            ("locations_path", &self.probe.locations_path),
            ("down_path", &self.probe.down_path),
            ("up_path", &self.probe.up_path),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!("probe {} must start with '/', got {}", name, path);
            }
        }
        Ok(())
    }
}

/// Default tracing directive from `LOG_LEVEL`, used when `RUST_LOG` is
/// unset. Invalid values fall back to `info` (diagnosed after the
/// subscriber is installed).
pub fn log_level_from_env() -> (String, Option<String>) {
    match std::env::var("LOG_LEVEL") {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            level @ ("debug" | "info" | "warn" | "error") => (level.to_string(), None),
            _ => ("info".to_string(), Some(raw)),
        },
        Err(_) => ("info".to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.probe.base_url, "https://speed.cloudflare.com");
        assert_eq!(config.shutdown.drain_timeout_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides() {
        let toml = r#"
            [probe]
            base_url = "https://edge.example.com"

            [shutdown]
            drain_timeout_ms = 1500
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.probe.base_url, "https://edge.example.com");
        assert_eq!(config.shutdown.drain_timeout_ms, 1_500);
        // Unset fields keep defaults.
        assert_eq!(config.probe.trace_path, "/cdn-cgi/trace");
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let mut config = ServerConfig::default();
        config.probe.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        std::env::set_var("LOG_LEVEL", "warn");
        assert_eq!(log_level_from_env().0, "warn");
        std::env::set_var("LOG_LEVEL", "verbose");
        let (level, rejected) = log_level_from_env();
        assert_eq!(level, "info");
        assert_eq!(rejected.as_deref(), Some("verbose"));
        std::env::remove_var("LOG_LEVEL");
    }
}
