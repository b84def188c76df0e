//! Broker seam: the low-level connection the transport client wraps.
//!
//! The client only needs subject-based publish/subscribe of raw bytes plus
//! lifecycle notifications. [`super::NatsBroker`] talks to a NATS server;
//! [`super::InMemoryBroker`] is provided for tests and single-process use.

use crate::error::Result;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Connection lifecycle notifications delivered to [`ConnectOptions::on_event`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection lost; the reason, if the broker reported one.
    Disconnected { reason: Option<String> },
    /// Connection re-established to the given address.
    Reconnected { addr: String },
    /// Connection permanently closed.
    Closed { reason: Option<String> },
}

/// Callback for lifecycle notifications.
pub type ConnectionCallback = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Callback invoked with the raw bytes of each delivery on a subject.
pub type RawHandler = Box<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Invoke `handler` for one delivery. A panicking handler is logged and the
/// delivery dropped, so the caller's delivery loop keeps running.
pub(crate) fn deliver(handler: &RawHandler, subject: &str, data: &[u8]) {
    if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| handler(subject, data))) {
        let message = cause
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| cause.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        warn!(subject, panic = %message, "subscription handler panicked, dropping delivery");
    }
}

/// Parameters for opening a broker connection.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Broker address, e.g. `nats://127.0.0.1:4222`.
    pub url: String,
    /// Client identity reported to the broker.
    pub name: String,
    pub on_event: Option<ConnectionCallback>,
}

impl ConnectOptions {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            on_event: None,
        }
    }

    pub fn with_callback(mut self, callback: ConnectionCallback) -> Self {
        self.on_event = Some(callback);
        self
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

/// Something that can open broker connections.
pub trait Broker: Send + Sync {
    fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn BrokerConnection>>;
}

/// An open broker connection. Must be safe for concurrent use.
pub trait BrokerConnection: Send + Sync {
    /// Send raw bytes on a subject.
    fn publish(&self, subject: &str, data: &[u8]) -> Result<()>;

    /// Start delivering messages on a subject to `handler`.
    fn subscribe(&self, subject: &str, handler: RawHandler) -> Result<Box<dyn BrokerSubscription>>;

    /// Address of the server currently connected to, if any.
    fn connected_addr(&self) -> Option<String>;

    /// Close the connection. Subsequent publishes fail.
    fn close(&self);
}

/// A broker-level subscription on one subject.
pub trait BrokerSubscription: Send + Sync {
    fn subject(&self) -> &str;

    /// Stop deliveries. Idempotent.
    fn unsubscribe(&self) -> Result<()>;
}
