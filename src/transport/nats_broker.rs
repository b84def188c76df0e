//! Broker backed by a NATS server.
//!
//! Wraps the synchronous `nats` client. Its disconnect, reconnect and close
//! handlers are forwarded as [`ConnectionEvent`]s. Each subscription runs its
//! handler on a thread owned by the client.

use super::broker::{
    deliver, Broker, BrokerConnection, BrokerSubscription, ConnectOptions, ConnectionCallback,
    ConnectionEvent, RawHandler,
};
use crate::error::{ConnectorError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Opens connections to the NATS server named by [`ConnectOptions::url`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NatsBroker;

impl NatsBroker {
    pub fn new() -> Self {
        Self
    }
}

/// Connection status shared with the `nats` client callbacks.
#[derive(Debug, Default)]
struct LinkState {
    disconnected: AtomicBool,
    closed: AtomicBool,
}

fn notify(callback: &Option<ConnectionCallback>, event: ConnectionEvent) {
    if let Some(callback) = callback {
        callback(&event);
    }
}

impl Broker for NatsBroker {
    fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn BrokerConnection>> {
        let link = Arc::new(LinkState::default());

        let on_disconnect = {
            let link = Arc::clone(&link);
            let callback = options.on_event.clone();
            move || {
                link.disconnected.store(true, Ordering::SeqCst);
                notify(&callback, ConnectionEvent::Disconnected { reason: None });
            }
        };
        let on_reconnect = {
            let link = Arc::clone(&link);
            let callback = options.on_event.clone();
            let addr = options.url.clone();
            move || {
                link.disconnected.store(false, Ordering::SeqCst);
                notify(&callback, ConnectionEvent::Reconnected { addr: addr.clone() });
            }
        };
        let on_close = {
            let link = Arc::clone(&link);
            let callback = options.on_event.clone();
            move || {
                link.closed.store(true, Ordering::SeqCst);
                notify(&callback, ConnectionEvent::Closed { reason: None });
            }
        };

        let conn = nats::Options::new()
            .with_name(&options.name)
            .disconnect_callback(on_disconnect)
            .reconnect_callback(on_reconnect)
            .close_callback(on_close)
            .connect(options.url.as_str())
            .map_err(|e| ConnectorError::Connection(format!("{}: {}", options.url, e)))?;

        debug!(name = %options.name, url = %options.url, "Connected to NATS server");
        Ok(Arc::new(NatsConnection {
            conn,
            url: options.url.clone(),
            link,
        }))
    }
}

struct NatsConnection {
    conn: nats::Connection,
    url: String,
    link: Arc<LinkState>,
}

impl BrokerConnection for NatsConnection {
    fn publish(&self, subject: &str, data: &[u8]) -> Result<()> {
        if self.link.closed.load(Ordering::SeqCst) {
            return Err(ConnectorError::Send(format!(
                "connection to {} closed, cannot publish on {}",
                self.url, subject
            )));
        }
        self.conn
            .publish(subject, data)
            .map_err(|e| ConnectorError::Send(format!("publish on {}: {}", subject, e)))
    }

    fn subscribe(&self, subject: &str, handler: RawHandler) -> Result<Box<dyn BrokerSubscription>> {
        let sub = self
            .conn
            .subscribe(subject)
            .map_err(|e| ConnectorError::Subscription(format!("subscribe to {}: {}", subject, e)))?;

        let handler = sub.with_handler(move |msg| {
            deliver(&handler, &msg.subject, &msg.data);
            Ok(())
        });

        Ok(Box::new(NatsSubscription {
            subject: subject.to_string(),
            handler: Mutex::new(Some(handler)),
        }))
    }

    fn connected_addr(&self) -> Option<String> {
        let down = self.link.closed.load(Ordering::SeqCst)
            || self.link.disconnected.load(Ordering::SeqCst);
        (!down).then(|| self.url.clone())
    }

    fn close(&self) {
        if !self.link.closed.swap(true, Ordering::SeqCst) {
            self.conn.clone().close();
        }
    }
}

struct NatsSubscription {
    subject: String,
    handler: Mutex<Option<nats::Handler>>,
}

impl BrokerSubscription for NatsSubscription {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn unsubscribe(&self) -> Result<()> {
        match self.handler.lock().take() {
            Some(handler) => handler
                .unsubscribe()
                .map_err(|e| {
                    ConnectorError::Subscription(format!("unsubscribe from {}: {}", self.subject, e))
                }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for NatsSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsSubscription")
            .field("subject", &self.subject)
            .finish()
    }
}
