//! Transport counters and their periodic export.
//!
//! Counters are plain atomics bumped on the publish/subscribe paths. A
//! separate exporter thread reads them on a fixed interval and pushes a
//! snapshot to a [`MetricsSink`]; export failures are logged and ignored.
//! [`PushGatewaySink`] sends them to a Prometheus push gateway.

use crate::error::{ConnectorError, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use crossbeam_channel::{bounded, select, tick, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Job name snapshots are pushed under.
pub const METRICS_JOB: &str = "connector_transport_metrics_job";

const PUSH_TIMEOUT: Duration = Duration::from_secs(10);
const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Counters maintained by a transport client.
#[derive(Debug, Default)]
pub struct TransportMetrics {
    connect_errors: AtomicU64,
    publish_errors: AtomicU64,
    decode_errors: AtomicU64,
    messages_published: AtomicU64,
    messages_delivered: AtomicU64,
}

impl TransportMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect_error(&self) {
        self.connect_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count `n` logical messages sent.
    pub fn record_published(&self, n: usize) {
        self.messages_published.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_errors: self.connect_errors.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`TransportMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connect_errors: u64,
    pub publish_errors: u64,
    pub decode_errors: u64,
    pub messages_published: u64,
    pub messages_delivered: u64,
}

impl MetricsSnapshot {
    /// Render as Prometheus text exposition format, one counter per field.
    pub fn to_prometheus_text(&self) -> String {
        let counters = [
            (
                "transport_connect_errors",
                "Number of broker connect errors encountered",
                self.connect_errors,
            ),
            (
                "transport_publish_errors",
                "Number of messages that encountered errors on publish",
                self.publish_errors,
            ),
            (
                "transport_decode_errors",
                "Number of inbound envelopes that could not be decoded",
                self.decode_errors,
            ),
            (
                "transport_messages_published",
                "Number of messages published",
                self.messages_published,
            ),
            (
                "transport_messages_delivered",
                "Number of messages handed to subscribers",
                self.messages_delivered,
            ),
        ];

        counters
            .iter()
            .map(|(name, help, value)| {
                format!("# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n")
            })
            .collect()
    }
}

/// Destination for exported snapshots, e.g. a metrics push gateway.
pub trait MetricsSink: Send + Sync {
    fn push(&self, job: &str, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Sink that writes snapshots to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn push(&self, job: &str, snapshot: &MetricsSnapshot) -> Result<()> {
        info!(
            job,
            connect_errors = snapshot.connect_errors,
            publish_errors = snapshot.publish_errors,
            decode_errors = snapshot.decode_errors,
            messages_published = snapshot.messages_published,
            messages_delivered = snapshot.messages_delivered,
            "transport metrics"
        );
        Ok(())
    }
}

/// Sink that replaces the job's metric group on a Prometheus push gateway.
#[derive(Debug)]
pub struct PushGatewaySink {
    client: Client,
    endpoint: String,
}

impl PushGatewaySink {
    /// Sink for the gateway at `endpoint`, e.g. `pushgateway:9091`. An
    /// endpoint without a scheme is reached over plain HTTP.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };
        let client = Client::builder()
            .timeout(PUSH_TIMEOUT)
            .build()
            .map_err(|e| ConnectorError::Connection(format!("metrics push client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// URL the snapshots of `job` are pushed to.
    pub fn job_url(&self, job: &str) -> String {
        format!("{}/metrics/job/{}", self.endpoint, job)
    }
}

impl MetricsSink for PushGatewaySink {
    fn push(&self, job: &str, snapshot: &MetricsSnapshot) -> Result<()> {
        let url = self.job_url(job);
        self.client
            .put(&url)
            .header(CONTENT_TYPE, TEXT_FORMAT)
            .body(snapshot.to_prometheus_text())
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| ConnectorError::Send(format!("metrics push to {}: {}", url, e)))?;
        Ok(())
    }
}

/// Background thread pushing snapshots every interval. Stops on
/// [`MetricsExporter::stop`] or drop.
pub struct MetricsExporter {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MetricsExporter {
    pub fn spawn(
        metrics: Arc<TransportMetrics>,
        sink: Arc<dyn MetricsSink>,
        interval: Duration,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name("transport-metrics".to_string())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Err(e) = sink.push(METRICS_JOB, &metrics.snapshot()) {
                            debug!(error = %e, "metrics push failed");
                        }
                    }
                }
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the exporter and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the stop channel, which also wakes
        // the select.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MetricsExporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
