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
use clap::Parser;
use netgauge_server::{config::ServerConfig, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Network-diagnostic MCP tool server", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Edge network base URL (overrides config file)
    #[arg(long, env = "NETGAUGE_PROBE_BASE_URL")]
    probe_base_url: Option<String>,

    /// Shutdown drain window in milliseconds (overrides config file)
    #[arg(long, env = "NETGAUGE_DRAIN_TIMEOUT_MS")]
    drain_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config)?;
    if let Some(base_url) = args.probe_base_url {
        config.probe.base_url = base_url;
    }
    if let Some(drain_timeout_ms) = args.drain_timeout_ms {
        config.shutdown.drain_timeout_ms = drain_timeout_ms;
    }

    run_server(config).await
}
