//! Publish/subscribe transport between connector streams and pipelines.
//!
//! - [`TransportProvider`] owns the process's single client and connects it
//!   on first use, retrying after a failed connect.
//! - [`TransportClient`] publishes [`Message`]s and opens [`Subscription`]s.
//! - Messages travel inside an [`Envelope`] that may batch several payloads;
//!   subscribers receive each payload separately.
//!
//! # Example
//!
//! ```ignore
//! let provider = TransportProvider::new(NatsBroker::new(), TransportConfig::from_env());
//! let _metrics = provider.start_metrics_push()?;
//! let client = provider.client()?;
//!
//! let sub = client.subscribe("pipeline.in", |msg| {
//!     println!("got {} bytes", msg.payload.len());
//! })?;
//! client.publish("pipeline.in", Message::new("example"))?;
//!
//! assert_eq!(sub.channel(), "pipeline.in");
//! sub.unsubscribe()?;
//! ```

mod broker;
mod client;
mod config;
mod envelope;
mod memory;
mod metrics;
mod nats_broker;

pub use broker::{
    Broker, BrokerConnection, BrokerSubscription, ConnectOptions, ConnectionCallback,
    ConnectionEvent, RawHandler,
};
pub use client::{ClientState, Subscription, TransportClient, TransportProvider};
pub use config::{TransportConfig, BROKER_URL_VAR, CLIENT_NAME_VAR, METRICS_ENDPOINT_VAR};
pub use envelope::{Envelope, Message};
pub use memory::InMemoryBroker;
pub use metrics::{
    LogSink, MetricsExporter, MetricsSink, MetricsSnapshot, PushGatewaySink, TransportMetrics,
    METRICS_JOB,
};
pub use nats_broker::NatsBroker;
