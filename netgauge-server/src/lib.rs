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

//! Netgauge Server
//!
//! Network-diagnostic MCP tool server: seven probe tools behind a shared
//! admission-controlled pipeline, served over line-delimited JSON on
//! standard streams.

pub mod catalog;
pub mod config;
pub mod mcp;
pub mod pipeline;
pub mod probe;
pub mod rate_limiter;
pub mod shutdown;
pub mod tools;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog::ServerCatalog;
use config::ServerConfig;
use mcp::{McpHandler, McpServer};
use netgauge_core::{Clock, SystemClock};
use pipeline::ToolPipeline;
use probe::{HttpProbeClient, ProbeClient};
use rate_limiter::RateLimiter;
use shutdown::ShutdownHooks;
use tools::{ToolContext, ToolRegistry};

pub async fn run_server(config: ServerConfig) -> Result<()> {
    init_tracing();

    tracing::info!("Starting netgauge server v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), clock.clone()));
    let probe: Arc<dyn ProbeClient> = Arc::new(HttpProbeClient::new(config.probe.clone())?);
    let catalog = Arc::new(ServerCatalog::new(
        probe.clone(),
        limiter.clone(),
        clock.clone(),
    ));
    let registry = Arc::new(ToolRegistry::new());
    tracing::info!(tools = registry.len(), "tool registry initialized");

    let pipeline = Arc::new(ToolPipeline::new(
        registry,
        limiter.clone(),
        ToolContext {
            probe: probe.clone(),
            catalog: catalog.clone(),
        },
    ));
    let handler = Arc::new(McpHandler::new(pipeline));

    if probe.health_check().await {
        tracing::info!(base_url = %config.probe.base_url, "edge network reachable");
    } else {
        tracing::warn!(
            base_url = %config.probe.base_url,
            "edge network unreachable at startup, probes may fail"
        );
    }

    let hooks = ShutdownHooks::new();
    {
        let catalog = catalog.clone();
        hooks.register("catalog-cache", move || async move {
            catalog.clear().await;
            Ok(())
        });
    }
    {
        let limiter = limiter.clone();
        hooks.register("rate-limiter", move || async move {
            limiter.reset(None);
            Ok(())
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal caught");
        let _ = shutdown_tx.send(true);
    });

    let (source, sink) = mcp::transport::stdio();
    let server = McpServer::new(
        handler,
        Duration::from_millis(config.shutdown.drain_timeout_ms),
    );
    server.serve(source, sink, shutdown_rx).await?;

    hooks.run_all().await;
    tracing::info!("netgauge server stopped");
    Ok(())
}

/// Tracing to stderr; stdout belongs to the transport. `RUST_LOG` wins;
/// otherwise `LOG_LEVEL` picks the level for the netgauge crates.
fn init_tracing() {
    let (level, rejected) = config::log_level_from_env();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "netgauge_server={level},netgauge_core={level}"
        ))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    if let Some(raw) = rejected {
        tracing::warn!(value = %raw, "ignoring invalid LOG_LEVEL, using info");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            return;
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}
