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

//! MCP transport
//!
//! Line-delimited JSON over standard streams: one request per input line,
//! one response per output line. The read and write halves are separate
//! traits so invocations run concurrently while responses serialize
//! through a single writer. A channel-backed pair serves tests.

use crate::mcp::protocol::JsonRpcResponse;
use async_trait::async_trait;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines, Stdin, Stdout};
use tokio::sync::mpsc;

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Channel closed")]
    ChannelClosed,
}

/// Read half: raw request lines.
#[async_trait]
pub trait RequestSource: Send {
    /// Next non-empty line; `None` once the stream ends.
    async fn next_line(&mut self) -> Result<Option<String>, TransportError>;
}

/// Write half: serialized responses.
#[async_trait]
pub trait ResponseSink: Send {
    async fn send(&mut self, response: &JsonRpcResponse) -> Result<(), TransportError>;
}

/// Stdin reader producing one request per line.
pub struct StdioSource {
    lines: Lines<BufReader<Stdin>>,
}

/// Stdout writer emitting one response per line.
pub struct StdioSink {
    writer: BufWriter<Stdout>,
}

/// The production transport pair over standard streams.
pub fn stdio() -> (StdioSource, StdioSink) {
    (
        StdioSource {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        },
        StdioSink {
            writer: BufWriter::new(tokio::io::stdout()),
        },
    )
}

#[async_trait]
impl RequestSource for StdioSource {
    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }
}

#[async_trait]
impl ResponseSink for StdioSink {
    async fn send(&mut self, response: &JsonRpcResponse) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(response)?;
        self.writer.write_all(&payload).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Channel-backed source for tests and in-process use.
pub struct BufferSource {
    rx: mpsc::Receiver<String>,
}

impl BufferSource {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl RequestSource for BufferSource {
    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

/// Channel-backed sink for tests and in-process use.
pub struct BufferSink {
    tx: mpsc::Sender<JsonRpcResponse>,
}

impl BufferSink {
    pub fn new(tx: mpsc::Sender<JsonRpcResponse>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ResponseSink for BufferSink {
    async fn send(&mut self, response: &JsonRpcResponse) -> Result<(), TransportError> {
        self.tx
            .send(response.clone())
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{JsonRpcId, JsonRpcResponse};

    #[tokio::test]
    async fn test_buffer_pair_round_trip() {
        let (line_tx, line_rx) = mpsc::channel(4);
        let (resp_tx, mut resp_rx) = mpsc::channel(4);
        let mut source = BufferSource::new(line_rx);
        let mut sink = BufferSink::new(resp_tx);

        line_tx.send("{\"x\":1}".to_string()).await.unwrap();
        assert_eq!(source.next_line().await.unwrap().unwrap(), "{\"x\":1}");

        sink.send(&JsonRpcResponse::success(
            JsonRpcId::Number(1),
            serde_json::json!({"ok": true}),
        ))
        .await
        .unwrap();
        let received = resp_rx.recv().await.unwrap();
        assert_eq!(received.result.unwrap()["ok"], true);

        drop(line_tx);
        assert!(source.next_line().await.unwrap().is_none());
    }
}
