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

//! HTTP measurement engine
//!
//! Drives the edge network's public measurement surface: timed transfers
//! against `__down`/`__up` for bandwidth, small-object RTT sampling for
//! latency and packet loss, the plaintext trace endpoint, and the JSON
//! locations catalog. Transport-level retries use exponential backoff
//! (1 s base, factor 2, 10 s cap, 3 attempts) for the retryable marker set
//! only; everything else surfaces immediately.

use super::{
    message_is_retryable, BatchSample, ConnectionTrace, ProbeClient, ProbeError, ProbeOptions,
    ProbeResults, ProbeShape, ProbeSummary,
};
use crate::config::ProbeConfig;
use async_trait::async_trait;
use netgauge_core::{continent_for_country, ServerEntry, ServerStatus};
use serde::Deserialize;
use std::time::{Duration, Instant};

const RETRY_BASE_MS: u64 = 1_000;
const RETRY_CAP_MS: u64 = 10_000;
const RETRY_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_LATENCY_SAMPLES: u32 = 10;
const DEFAULT_MEASUREMENT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_PACKET_COUNT: u32 = 100;
const DEFAULT_BATCH_SIZE: u32 = 10;
const DEFAULT_BATCH_WAIT_MS: u64 = 1_000;
const HEALTH_CHECK_DEADLINE_MS: u64 = 5_000;

/// Raw location record from the edge's catalog endpoint.
#[derive(Debug, Deserialize)]
struct RawLocation {
    iata: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    cca2: String,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn locations_to_entries(raw: Vec<RawLocation>, fetched_at: &str) -> Vec<ServerEntry> {
    raw.into_iter()
        .map(|loc| ServerEntry {
            location: format!("{}, {}", loc.city, loc.cca2),
            continent: continent_for_country(&loc.cca2),
            name: loc.iata,
            city: loc.city,
            region: loc.region,
            country: loc.cca2,
            latitude: loc.lat,
            longitude: loc.lon,
            distance_km: None,
            status: ServerStatus::Active,
            last_checked: fetched_at.to_string(),
        })
        .collect()
}

/// Probe client backed by `reqwest`.
pub struct HttpProbeClient {
    http: reqwest::Client,
    config: ProbeConfig,
}

impl HttpProbeClient {
    pub fn new(config: ProbeConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()?;
        Ok(Self { http, config })
    }

    fn down_url(&self, bytes: u64) -> String {
        format!("{}{}?bytes={}", self.config.base_url, self.config.down_path, bytes)
    }

    fn up_url(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.up_path)
    }

    fn trace_url(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.trace_path)
    }

    fn locations_url(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.locations_path)
    }

    /// Canonicalize a reqwest failure so the retryable-marker match works
    /// on our own tokens rather than platform-specific io text.
    fn classify(err: reqwest::Error) -> ProbeError {
        let detail = err.to_string();
        let message = if err.is_timeout() {
            format!("TIMEOUT_ERROR: {}", detail)
        } else if err.is_connect() {
            format!("NETWORK_ERROR: {}", detail)
        } else if err.status().map_or(false, |s| s.is_server_error()) {
            format!("NETWORK_ERROR: upstream {}", detail)
        } else {
            detail
        };
        let retryable = message_is_retryable(&message);
        ProbeError::execution(message, retryable)
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, ProbeError> {
        let mut attempt = 0u32;
        let mut delay_ms = RETRY_BASE_MS;
        loop {
            let outcome = self
                .http
                .get(url)
                .send()
                .await
                .and_then(|resp| resp.error_for_status());
            match outcome {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    let probe_err = Self::classify(err);
                    attempt += 1;
                    if !probe_err.is_retryable() || attempt >= RETRY_MAX_ATTEMPTS {
                        return Err(probe_err);
                    }
                    tracing::debug!(url, attempt, delay_ms, error = %probe_err, "retrying probe request");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(RETRY_CAP_MS);
                }
            }
        }
    }

    /// One RTT sample: fetch a zero-byte object and time it. `None` means
    /// the sample was lost, not that the probe failed.
    async fn rtt_sample_ms(&self) -> Option<f64> {
        let started = Instant::now();
        let outcome = self
            .http
            .get(self.down_url(0))
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        match outcome {
            Ok(resp) => {
                // Drain the (empty) body so the sample covers the full exchange.
                let _ = resp.bytes().await;
                Some(started.elapsed().as_secs_f64() * 1_000.0)
            }
            Err(_) => None,
        }
    }

    async fn measure_latency(&self, options: &ProbeOptions) -> Result<ProbeResults, ProbeError> {
        let count = options.packet_count.unwrap_or(DEFAULT_LATENCY_SAMPLES);
        let mut samples = Vec::with_capacity(count as usize);
        let mut lost = 0u64;

        for _ in 0..count {
            match self.rtt_sample_ms().await {
                Some(ms) => samples.push(ms),
                None => lost += 1,
            }
        }

        if samples.is_empty() {
            return Err(ProbeError::execution(
                "NETWORK_ERROR: all latency samples failed",
                true,
            ));
        }

        Ok(ProbeResults {
            unloaded_latency_ms: Some(median(&mut samples.clone())),
            packets_sent: Some(count as u64),
            packets_received: Some(count as u64 - lost),
            summary: ProbeSummary {
                jitter_ms: Some(mean_abs_delta(&samples)),
            },
            ..Default::default()
        })
    }

    async fn measure_download(&self, options: &ProbeOptions) -> Result<ProbeResults, ProbeError> {
        let bytes = options
            .measurement_bytes
            .unwrap_or(DEFAULT_MEASUREMENT_BYTES);
        let started = Instant::now();
        let resp = self.get_with_retry(&self.down_url(bytes)).await?;
        let body = resp.bytes().await.map_err(Self::classify)?;
        let secs = started.elapsed().as_secs_f64().max(1e-6);
        let transferred = body.len() as u64;

        Ok(ProbeResults {
            download_bandwidth_bps: Some(transferred as f64 * 8.0 / secs),
            bytes_transferred: Some(transferred),
            measurement_secs: Some(secs),
            ..Default::default()
        })
    }

    async fn measure_upload(&self, options: &ProbeOptions) -> Result<ProbeResults, ProbeError> {
        let bytes = options
            .measurement_bytes
            .unwrap_or(DEFAULT_MEASUREMENT_BYTES);
        let payload = vec![0u8; bytes as usize];
        let started = Instant::now();
        let resp = self
            .http
            .post(self.up_url())
            .body(payload)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(Self::classify)?;
        let _ = resp.bytes().await;
        let secs = started.elapsed().as_secs_f64().max(1e-6);

        Ok(ProbeResults {
            upload_bandwidth_bps: Some(bytes as f64 * 8.0 / secs),
            bytes_transferred: Some(bytes),
            measurement_secs: Some(secs),
            ..Default::default()
        })
    }

    async fn measure_packet_loss(&self, options: &ProbeOptions) -> Result<ProbeResults, ProbeError> {
        let total = options.packet_count.unwrap_or(DEFAULT_PACKET_COUNT);
        let batch_size = options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
        let batch_wait_ms = options.batch_wait_ms.unwrap_or(DEFAULT_BATCH_WAIT_MS);

        let mut batches = Vec::new();
        let mut sent = 0u64;
        let mut received = 0u64;
        let mut batch_index = 0u32;

        while sent < total as u64 {
            let in_batch = batch_size.min(total - sent as u32);
            let mut batch_received = 0u32;
            for _ in 0..in_batch {
                if self.rtt_sample_ms().await.is_some() {
                    batch_received += 1;
                }
            }
            sent += in_batch as u64;
            received += batch_received as u64;
            batches.push(BatchSample {
                batch: batch_index,
                sent: in_batch,
                received: batch_received,
            });
            batch_index += 1;
            if sent < total as u64 {
                tokio::time::sleep(Duration::from_millis(batch_wait_ms)).await;
            }
        }

        Ok(ProbeResults {
            packet_loss_fraction: Some((sent - received) as f64 / sent.max(1) as f64),
            packets_sent: Some(sent),
            packets_received: Some(received),
            batches,
            ..Default::default()
        })
    }

    async fn measure_full(&self, options: &ProbeOptions) -> Result<ProbeResults, ProbeError> {
        let latency = self.measure_latency(options).await?;
        let download = self.measure_download(options).await?;
        let upload = self.measure_upload(options).await?;
        // A trimmed loss pass keeps the composite run inside its deadline.
        let loss_options = ProbeOptions {
            packet_count: Some(options.packet_count.unwrap_or(20).min(20)),
            batch_wait_ms: Some(options.batch_wait_ms.unwrap_or(200).min(200)),
            ..options.clone()
        };
        let loss = self.measure_packet_loss(&loss_options).await?;

        Ok(ProbeResults {
            download_bandwidth_bps: download.download_bandwidth_bps,
            upload_bandwidth_bps: upload.upload_bandwidth_bps,
            unloaded_latency_ms: latency.unloaded_latency_ms,
            packet_loss_fraction: loss.packet_loss_fraction,
            packets_sent: loss.packets_sent,
            packets_received: loss.packets_received,
            batches: loss.batches,
            bytes_transferred: download.bytes_transferred,
            measurement_secs: download.measurement_secs,
            summary: latency.summary,
        })
    }

    async fn with_deadline<T>(
        &self,
        deadline_ms: u64,
        work: impl std::future::Future<Output = Result<T, ProbeError>>,
    ) -> Result<T, ProbeError> {
        match tokio::time::timeout(Duration::from_millis(deadline_ms), work).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout { deadline_ms }),
        }
    }
}

#[async_trait]
impl ProbeClient for HttpProbeClient {
    async fn run_probe(
        &self,
        shape: ProbeShape,
        options: ProbeOptions,
        deadline_ms: u64,
    ) -> Result<ProbeResults, ProbeError> {
        self.with_deadline(deadline_ms, async {
            match shape {
                ProbeShape::Latency => self.measure_latency(&options).await,
                ProbeShape::Download => self.measure_download(&options).await,
                ProbeShape::Upload => self.measure_upload(&options).await,
                ProbeShape::PacketLoss => self.measure_packet_loss(&options).await,
                ProbeShape::Full => self.measure_full(&options).await,
            }
        })
        .await
    }

    async fn get_trace(&self, deadline_ms: u64) -> Result<ConnectionTrace, ProbeError> {
        self.with_deadline(deadline_ms, async {
            let resp = self.get_with_retry(&self.trace_url()).await?;
            let body = resp.text().await.map_err(Self::classify)?;
            Ok(ConnectionTrace::parse(&body))
        })
        .await
    }

    async fn list_servers(&self, deadline_ms: u64) -> Result<Vec<ServerEntry>, ProbeError> {
        self.with_deadline(deadline_ms, async {
            let resp = self.get_with_retry(&self.locations_url()).await?;
            let raw: Vec<RawLocation> = resp.json().await.map_err(Self::classify)?;
            let fetched_at = chrono::Utc::now().to_rfc3339();
            Ok(locations_to_entries(raw, &fetched_at))
        })
        .await
    }

    async fn health_check(&self) -> bool {
        self.get_trace(HEALTH_CHECK_DEADLINE_MS).await.is_ok()
    }
}

/// Median of the samples; the slice is sorted in place.
fn median(samples: &mut [f64]) -> f64 {
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        (samples[mid - 1] + samples[mid]) / 2.0
    } else {
        samples[mid]
    }
}

/// Mean absolute delta between successive samples; the usual jitter figure.
fn mean_abs_delta(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let sum: f64 = samples.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    sum / (samples.len() - 1) as f64
}
