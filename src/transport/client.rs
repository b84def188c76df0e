//! Publish/subscribe client over a broker connection.

use super::broker::{
    Broker, BrokerConnection, BrokerSubscription, ConnectOptions, ConnectionEvent, RawHandler,
};
use super::config::TransportConfig;
use super::envelope::{Envelope, Message};
use super::metrics::{MetricsExporter, MetricsSink, PushGatewaySink, TransportMetrics};
use crate::error::{ConnectorError, Result};
use crate::once::RetryOnce;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

/// Lifecycle of the client owned by a [`TransportProvider`].
///
/// Reconnection is not a state here: it is only observed through the
/// connection callbacks and logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Connecting,
    Connected,
    Closed,
}

/// Publishes and subscribes byte payloads on named channels.
///
/// Obtained from [`TransportProvider::client`]; safe to share across threads.
pub struct TransportClient {
    conn: Arc<dyn BrokerConnection>,
    url: String,
    name: String,
    metrics: Arc<TransportMetrics>,
    closed: Arc<AtomicBool>,
}

impl TransportClient {
    /// Open a broker connection with lifecycle logging installed.
    pub fn connect(
        broker: &dyn Broker,
        config: &TransportConfig,
        metrics: Arc<TransportMetrics>,
    ) -> Result<Self> {
        let closed = Arc::new(AtomicBool::new(false));
        let callback = {
            let metrics = Arc::clone(&metrics);
            let closed = Arc::clone(&closed);
            let name = config.client_name.clone();
            Arc::new(move |event: &ConnectionEvent| match event {
                ConnectionEvent::Disconnected { reason } => {
                    warn!(client = %name, reason = ?reason, "Got disconnected from transport broker");
                    if reason.is_some() {
                        metrics.record_connect_error();
                    }
                }
                ConnectionEvent::Reconnected { addr } => {
                    info!(client = %name, addr = %addr, "Got reconnected to transport broker");
                }
                ConnectionEvent::Closed { reason } => {
                    closed.store(true, Ordering::SeqCst);
                    info!(client = %name, reason = ?reason, "Transport connection closed");
                }
            })
        };

        let options = ConnectOptions::new(&config.broker_url, &config.client_name)
            .with_callback(callback);
        let conn = broker.connect(&options)?;
        let url = conn.connected_addr().unwrap_or_default();
        info!(client = %config.client_name, url = %url, "Connected to transport broker");

        Ok(Self {
            conn,
            url,
            name: config.client_name.clone(),
            metrics,
            closed,
        })
    }

    /// Address the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn metrics(&self) -> &Arc<TransportMetrics> {
        &self.metrics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send one message on `channel`, wrapped in its own envelope.
    pub fn publish(&self, channel: &str, msg: Message) -> Result<()> {
        self.send(channel, Envelope::single(msg.payload))
    }

    /// Send several messages on `channel` in a single envelope. Subscribers
    /// see them one by one, in order. An empty batch sends nothing.
    pub fn publish_batch(&self, channel: &str, msgs: Vec<Message>) -> Result<()> {
        if msgs.is_empty() {
            return Ok(());
        }
        self.send(channel, Envelope::new(msgs.into_iter().map(|m| m.payload).collect()))
    }

    fn send(&self, channel: &str, envelope: Envelope) -> Result<()> {
        let count = envelope.payloads.len();
        let data = envelope.encode().map_err(|e| {
            self.metrics.record_publish_error();
            e
        })?;

        self.conn.publish(channel, &data).map_err(|e| {
            self.metrics.record_publish_error();
            match e {
                ConnectorError::Send(_) => e,
                other => ConnectorError::Send(other.to_string()),
            }
        })?;

        self.metrics.record_published(count);
        debug!(channel, payloads = count, bytes = data.len(), "Published envelope");
        Ok(())
    }

    /// Deliver every future message on `channel` to `handler`.
    ///
    /// Each inbound envelope invokes the handler once per payload, in order.
    /// An envelope that cannot be decoded is logged and dropped; the
    /// subscription stays active.
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> Result<Subscription>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let metrics = Arc::clone(&self.metrics);
        let adapter: RawHandler = Box::new(move |subject, data| match Envelope::decode(data) {
            Ok(envelope) => {
                if envelope.payloads.is_empty() {
                    debug!(channel = %subject, "Received envelope without payloads");
                }
                for msg in envelope.into_messages() {
                    metrics.record_delivered();
                    handler(msg);
                }
            }
            Err(e) => {
                metrics.record_decode_error();
                warn!(channel = %subject, error = %e, "unable to decode envelope, dropping delivery");
            }
        });

        let inner = self.conn.subscribe(channel, adapter)?;
        debug!(client = %self.name, channel, "Subscribed");
        Ok(Subscription {
            channel: channel.to_string(),
            inner,
        })
    }

    /// Close the broker connection. Later publishes fail with `Send`.
    pub fn close(&self) {
        self.conn.close();
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportClient")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A live subscription on one channel.
pub struct Subscription {
    channel: String,
    inner: Box<dyn BrokerSubscription>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Stop deliveries to this subscription's handler.
    pub fn unsubscribe(self) -> Result<()> {
        self.inner.unsubscribe()?;
        debug!(channel = %self.channel, "Unsubscribed");
        Ok(())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("subject", &self.inner.subject())
            .finish()
    }
}

/// Owns the one transport client of a process.
///
/// Constructed at startup and passed to whoever needs the transport. The
/// first successful [`TransportProvider::client`] call connects; every later
/// call returns the same client. A failed connect is returned to the caller
/// and retried on the next call.
pub struct TransportProvider {
    broker: Arc<dyn Broker>,
    config: TransportConfig,
    metrics: Arc<TransportMetrics>,
    once: RetryOnce,
    connecting: AtomicBool,
    client: OnceLock<Arc<TransportClient>>,
}

impl TransportProvider {
    pub fn new(broker: impl Broker + 'static, config: TransportConfig) -> Self {
        Self::with_broker(Arc::new(broker), config)
    }

    pub fn with_broker(broker: Arc<dyn Broker>, config: TransportConfig) -> Self {
        Self {
            broker,
            config,
            metrics: Arc::new(TransportMetrics::new()),
            once: RetryOnce::new(),
            connecting: AtomicBool::new(false),
            client: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<TransportMetrics> {
        &self.metrics
    }

    /// The shared client, connecting on first use.
    pub fn client(&self) -> Result<Arc<TransportClient>> {
        self.once.try_run(|| {
            self.connecting.store(true, Ordering::SeqCst);
            let result =
                TransportClient::connect(self.broker.as_ref(), &self.config, Arc::clone(&self.metrics));
            self.connecting.store(false, Ordering::SeqCst);

            match result {
                Ok(client) => {
                    let _ = self.client.set(Arc::new(client));
                    Ok(())
                }
                Err(e) => {
                    self.metrics.record_connect_error();
                    error!(url = %self.config.broker_url, error = %e, "Failed to connect to transport broker");
                    Err(e)
                }
            }
        })?;

        self.client.get().cloned().ok_or_else(|| {
            ConnectorError::Connection("transport client missing after connect".to_string())
        })
    }

    pub fn state(&self) -> ClientState {
        match self.client.get() {
            Some(client) if client.is_closed() => ClientState::Closed,
            Some(_) => ClientState::Connected,
            None if self.connecting.load(Ordering::SeqCst) => ClientState::Connecting,
            None => ClientState::Uninitialized,
        }
    }

    /// Start pushing this provider's metrics to `sink` at the configured
    /// interval.
    pub fn spawn_metrics_exporter(&self, sink: Arc<dyn MetricsSink>) -> Result<MetricsExporter> {
        MetricsExporter::spawn(Arc::clone(&self.metrics), sink, self.config.metrics_interval)
    }

    /// Start pushing metrics to the configured push gateway. Returns `None`
    /// when no metrics endpoint is configured.
    pub fn start_metrics_push(&self) -> Result<Option<MetricsExporter>> {
        if !self.config.metrics_enabled() {
            debug!("No metrics endpoint configured, transport metrics are not pushed");
            return Ok(None);
        }
        let sink = PushGatewaySink::new(&self.config.metrics_endpoint)?;
        info!(
            endpoint = %self.config.metrics_endpoint,
            interval = ?self.config.metrics_interval,
            "Pushing transport metrics"
        );
        self.spawn_metrics_exporter(Arc::new(sink)).map(Some)
    }
}

impl fmt::Debug for TransportProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportProvider")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
