//! In-process broker.
//!
//! Routes published bytes to every subscription on the same subject. Each
//! subscription owns a delivery thread fed by an unbounded channel, so
//! handlers never run on the publisher's thread and deliveries on one
//! subscription arrive in publish order.
//!
//! Test hooks simulate broker trouble: refusing connections, dropping and
//! restoring live connections, and closing them. Nothing is buffered while a
//! connection is down.

use super::broker::{
    deliver, Broker, BrokerConnection, BrokerSubscription, ConnectOptions, ConnectionCallback,
    ConnectionEvent, RawHandler,
};
use crate::error::{ConnectorError, Result};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use tracing::{debug, trace};

const DEFAULT_ADDR: &str = "memory://local";

/// Identifier of a broker-level subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct RouteId(u64);

/// Delivery route for one subscription.
struct Route {
    subject: String,
    sender: Sender<Vec<u8>>,
}

struct BrokerState {
    addr: String,
    available: AtomicBool,
    next_id: AtomicU64,
    connect_attempts: AtomicU64,
    routes: RwLock<HashMap<RouteId, Route>>,
    connections: Mutex<Vec<Weak<MemoryConnection>>>,
}

impl BrokerState {
    fn route(&self, subject: &str, data: &[u8]) -> usize {
        let routes = self.routes.read();
        let mut delivered = 0;
        for route in routes.values().filter(|r| r.subject == subject) {
            // A closed receiver means the delivery thread is gone; the route
            // is removed on unsubscribe.
            if route.sender.send(data.to_vec()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn remove_route(&self, id: RouteId) -> bool {
        self.routes.write().remove(&id).is_some()
    }

    fn live_connections(&self) -> Vec<Arc<MemoryConnection>> {
        let mut conns = self.connections.lock();
        conns.retain(|c| c.strong_count() > 0);
        conns.iter().filter_map(Weak::upgrade).collect()
    }
}

/// In-process broker. Clones share the same routing table.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_addr(DEFAULT_ADDR)
    }

    /// Broker that reports `addr` as its connected address.
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            state: Arc::new(BrokerState {
                addr: addr.into(),
                available: AtomicBool::new(true),
                next_id: AtomicU64::new(1),
                connect_attempts: AtomicU64::new(0),
                routes: RwLock::new(HashMap::new()),
                connections: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Refuse (`false`) or accept (`true`) new connections.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Number of `connect` calls seen, successful or not.
    pub fn connect_attempts(&self) -> u64 {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn connection_count(&self) -> usize {
        self.state.live_connections().len()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.routes.read().len()
    }

    /// Inject raw bytes on a subject as if another client had sent them.
    /// Returns how many subscriptions the bytes were routed to.
    pub fn publish_raw(&self, subject: &str, data: &[u8]) -> usize {
        self.state.route(subject, data)
    }

    /// Drop every live connection.
    pub fn disconnect(&self, reason: Option<&str>) {
        for conn in self.state.live_connections() {
            conn.transition(
                ConnState::Connected,
                ConnState::Disconnected,
                ConnectionEvent::Disconnected {
                    reason: reason.map(str::to_string),
                },
            );
        }
    }

    /// Restore every dropped connection.
    pub fn reconnect(&self) {
        for conn in self.state.live_connections() {
            conn.transition(
                ConnState::Disconnected,
                ConnState::Connected,
                ConnectionEvent::Reconnected {
                    addr: self.state.addr.clone(),
                },
            );
        }
    }

    /// Close every live connection.
    pub fn close(&self) {
        for conn in self.state.live_connections() {
            conn.close_with(Some("broker shut down".to_string()));
        }
    }
}

impl Broker for InMemoryBroker {
    fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn BrokerConnection>> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.state.available.load(Ordering::SeqCst) {
            return Err(ConnectorError::Connection(format!(
                "broker unavailable at {}",
                options.url
            )));
        }

        let conn = Arc::new(MemoryConnection {
            broker: Arc::clone(&self.state),
            name: options.name.clone(),
            conn_state: Mutex::new(ConnState::Connected),
            on_event: options.on_event.clone(),
            routes: Arc::new(Mutex::new(HashSet::new())),
        });
        self.state.connections.lock().push(Arc::downgrade(&conn));
        debug!(name = %options.name, url = %options.url, "In-memory broker accepted connection");
        Ok(conn)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnState {
    Connected,
    Disconnected,
    Closed,
}

struct MemoryConnection {
    broker: Arc<BrokerState>,
    name: String,
    conn_state: Mutex<ConnState>,
    on_event: Option<ConnectionCallback>,
    /// Live routes opened through this connection, removed on close.
    routes: Arc<Mutex<HashSet<RouteId>>>,
}

impl MemoryConnection {
    fn transition(&self, from: ConnState, to: ConnState, event: ConnectionEvent) {
        {
            let mut state = self.conn_state.lock();
            if *state != from {
                return;
            }
            *state = to;
        }
        self.notify(&event);
    }

    fn close_with(&self, reason: Option<String>) {
        {
            let mut state = self.conn_state.lock();
            if *state == ConnState::Closed {
                return;
            }
            *state = ConnState::Closed;
        }
        let ids: Vec<RouteId> = self.routes.lock().drain().collect();
        for id in ids {
            self.broker.remove_route(id);
        }
        self.notify(&ConnectionEvent::Closed { reason });
    }

    fn notify(&self, event: &ConnectionEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }
}

impl BrokerConnection for MemoryConnection {
    fn publish(&self, subject: &str, data: &[u8]) -> Result<()> {
        match *self.conn_state.lock() {
            ConnState::Connected => {}
            ConnState::Disconnected => {
                return Err(ConnectorError::Send(format!(
                    "{}: connection lost, cannot publish on {}",
                    self.name, subject
                )))
            }
            ConnState::Closed => {
                return Err(ConnectorError::Send(format!(
                    "{}: connection closed, cannot publish on {}",
                    self.name, subject
                )))
            }
        }
        let delivered = self.broker.route(subject, data);
        trace!(subject, bytes = data.len(), delivered, "Routed publish");
        Ok(())
    }

    fn subscribe(&self, subject: &str, handler: RawHandler) -> Result<Box<dyn BrokerSubscription>> {
        // Held until the route is recorded so a concurrent close either
        // rejects this subscribe or removes the new route.
        let state = self.conn_state.lock();
        if *state == ConnState::Closed {
            return Err(ConnectorError::Subscription(format!(
                "{}: connection closed, cannot subscribe to {}",
                self.name, subject
            )));
        }

        let id = RouteId(self.broker.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = unbounded::<Vec<u8>>();
        let thread_subject = subject.to_string();

        thread::Builder::new()
            .name(format!("memory-broker-sub-{}", id.0))
            .spawn(move || {
                // Ends once the route (the only sender) is dropped.
                for data in receiver.iter() {
                    deliver(&handler, &thread_subject, &data);
                }
            })
            .map_err(|e| ConnectorError::Subscription(e.to_string()))?;

        self.broker.routes.write().insert(
            id,
            Route {
                subject: subject.to_string(),
                sender,
            },
        );
        self.routes.lock().insert(id);
        drop(state);

        Ok(Box::new(MemorySubscription {
            id,
            subject: subject.to_string(),
            broker: Arc::clone(&self.broker),
            conn_routes: Arc::clone(&self.routes),
        }))
    }

    fn connected_addr(&self) -> Option<String> {
        match *self.conn_state.lock() {
            ConnState::Connected => Some(self.broker.addr.clone()),
            _ => None,
        }
    }

    fn close(&self) {
        self.close_with(None);
    }
}

struct MemorySubscription {
    id: RouteId,
    subject: String,
    broker: Arc<BrokerState>,
    conn_routes: Arc<Mutex<HashSet<RouteId>>>,
}

impl BrokerSubscription for MemorySubscription {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn unsubscribe(&self) -> Result<()> {
        self.conn_routes.lock().remove(&self.id);
        if self.broker.remove_route(self.id) {
            debug!(subject = %self.subject, "Removed in-memory route");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    fn collecting_handler() -> (RawHandler, crossbeam_channel::Receiver<Vec<u8>>) {
        let (tx, rx) = bounded(16);
        let handler: RawHandler = Box::new(move |_subject: &str, data: &[u8]| {
            let _ = tx.send(data.to_vec());
        });
        (handler, rx)
    }

    #[test]
    fn test_routes_by_subject() {
        let broker = InMemoryBroker::new();
        let conn = broker.connect(&ConnectOptions::new("memory://", "test")).unwrap();

        let (handler, rx) = collecting_handler();
        let _sub = conn.subscribe("a", handler).unwrap();

        conn.publish("b", b"other").unwrap();
        conn.publish("a", b"mine").unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), b"mine".to_vec());
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_unavailable_broker_refuses() {
        let broker = InMemoryBroker::new();
        broker.set_available(false);

        let result = broker.connect(&ConnectOptions::new("memory://", "test"));
        assert!(matches!(result, Err(ConnectorError::Connection(_))));
        assert_eq!(broker.connect_attempts(), 1);
    }

    #[test]
    fn test_disconnected_publish_fails_without_buffering() {
        let broker = InMemoryBroker::new();
        let conn = broker.connect(&ConnectOptions::new("memory://", "test")).unwrap();
        let (handler, rx) = collecting_handler();
        let _sub = conn.subscribe("a", handler).unwrap();

        broker.disconnect(Some("network down"));
        assert!(matches!(conn.publish("a", b"lost"), Err(ConnectorError::Send(_))));
        assert!(conn.connected_addr().is_none());

        broker.reconnect();
        conn.publish("a", b"after").unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), b"after".to_vec());
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_lifecycle_callbacks() {
        let broker = InMemoryBroker::with_addr("memory://node-1");
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let options = ConnectOptions::new("memory://", "test")
            .with_callback(Arc::new(move |e: &ConnectionEvent| sink.lock().push(e.clone())));
        let _conn = broker.connect(&options).unwrap();

        broker.disconnect(None);
        broker.reconnect();
        broker.close();

        assert_eq!(
            *events.lock(),
            vec![
                ConnectionEvent::Disconnected { reason: None },
                ConnectionEvent::Reconnected {
                    addr: "memory://node-1".to_string()
                },
                ConnectionEvent::Closed {
                    reason: Some("broker shut down".to_string())
                },
            ]
        );
    }

    #[test]
    fn test_close_removes_routes() {
        let broker = InMemoryBroker::new();
        let conn = broker.connect(&ConnectOptions::new("memory://", "test")).unwrap();
        let (handler, _rx) = collecting_handler();
        let _sub = conn.subscribe("a", handler).unwrap();
        assert_eq!(broker.subscription_count(), 1);

        conn.close();
        assert_eq!(broker.subscription_count(), 0);
        assert!(matches!(conn.publish("a", b"x"), Err(ConnectorError::Send(_))));
        let (handler, _rx) = collecting_handler();
        assert!(conn.subscribe("a", handler).is_err());
    }

    #[test]
    fn test_panicking_handler_keeps_delivering() {
        let broker = InMemoryBroker::new();
        let conn = broker.connect(&ConnectOptions::new("memory://", "test")).unwrap();
        let (tx, rx) = bounded(16);
        let handler: RawHandler = Box::new(move |_subject: &str, data: &[u8]| {
            if data == b"boom" {
                panic!("handler failure");
            }
            tx.send(data.to_vec()).unwrap();
        });
        let _sub = conn.subscribe("c", handler).unwrap();

        conn.publish("c", b"boom").unwrap();
        conn.publish("c", b"after").unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), b"after".to_vec());
    }

    #[test]
    fn test_unsubscribe_prunes_connection_routes() {
        let broker = InMemoryBroker::new();
        let conn = broker.connect(&ConnectOptions::new("memory://", "test")).unwrap();

        for _ in 0..100 {
            let (handler, _rx) = collecting_handler();
            conn.subscribe("a", handler).unwrap().unsubscribe().unwrap();
        }
        let (handler, _rx) = collecting_handler();
        let _live = conn.subscribe("a", handler).unwrap();

        let conns = broker.state.live_connections();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].routes.lock().len(), 1);
        assert_eq!(broker.subscription_count(), 1);
    }

    #[test]
    fn test_close_racing_subscribe_leaves_no_routes() {
        for _ in 0..20 {
            let broker = InMemoryBroker::new();
            let conn = broker.connect(&ConnectOptions::new("memory://", "test")).unwrap();

            let subscriber = {
                let conn = Arc::clone(&conn);
                thread::spawn(move || {
                    let mut subs = Vec::new();
                    for _ in 0..50 {
                        let (handler, _rx) = collecting_handler();
                        match conn.subscribe("a", handler) {
                            Ok(sub) => subs.push(sub),
                            Err(_) => break,
                        }
                    }
                    subs
                })
            };
            conn.close();
            let _subs = subscriber.join().unwrap();

            assert_eq!(broker.subscription_count(), 0);
        }
    }
}
