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

//! MCP serving loop
//!
//! Reads request lines, spawns one task per invocation so probes overlap,
//! and serializes responses through a single writer task. On shutdown or
//! input EOF the loop stops reading, waits out in-flight invocations up to
//! the drain window, then aborts stragglers. Their admission guards
//! release on drop, so no concurrency slot leaks.

use crate::mcp::handlers::McpHandler;
use crate::mcp::transport::{RequestSource, ResponseSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub struct McpServer {
    handler: Arc<McpHandler>,
    drain_timeout: Duration,
}

impl McpServer {
    pub fn new(handler: Arc<McpHandler>, drain_timeout: Duration) -> Self {
        Self {
            handler,
            drain_timeout,
        }
    }

    /// Serve until the input stream ends or the shutdown flag flips.
    pub async fn serve<S, K>(
        &self,
        mut source: S,
        mut sink: K,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()>
    where
        S: RequestSource,
        K: ResponseSink + 'static,
    {
        let (out_tx, mut out_rx) = mpsc::channel(64);
        let writer = tokio::spawn(async move {
            while let Some(response) = out_rx.recv().await {
                if let Err(e) = sink.send(&response).await {
                    error!(error = %e, "failed to write response, stopping writer");
                    break;
                }
            }
        });

        let mut inflight = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown signal received, no longer accepting invocations");
                    break;
                }
                line = source.next_line() => match line {
                    Ok(Some(line)) => {
                        let handler = self.handler.clone();
                        let out = out_tx.clone();
                        inflight.spawn(async move {
                            if let Some(response) = handler.handle_line(&line).await {
                                let _ = out.send(response).await;
                            }
                        });
                    }
                    Ok(None) => {
                        info!("input stream closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "transport read failed");
                        break;
                    }
                }
            }
        }

        let pending = inflight.len();
        if pending > 0 {
            info!(pending, "draining in-flight invocations");
        }
        let drained = tokio::time::timeout(self.drain_timeout, async {
            while inflight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                drain_timeout_ms = self.drain_timeout.as_millis() as u64,
                "drain window elapsed, aborting remaining invocations"
            );
            inflight.abort_all();
            while inflight.join_next().await.is_some() {}
        }

        drop(out_tx);
        let _ = writer.await;
        Ok(())
    }
}
