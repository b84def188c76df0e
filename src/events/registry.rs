//! Event registry: alert/status registration plus the live event cache
//! served to scrapers.

use super::alert::Alert;
use super::status::Status;
use super::types::{EventRecord, GetEventsRequest, GetEventsResponse, ResponseStatus};
use crate::error::{ConnectorError, Result};
use crate::types::ResponseCode;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Latest record per (id, stream id). Shared between a registry and every
/// descriptor bound to it.
#[derive(Debug, Default)]
pub(crate) struct EventCache {
    events: RwLock<HashMap<String, EventRecord>>,
}

impl EventCache {
    pub(crate) fn upsert(&self, record: EventRecord) {
        let key = record.key();
        self.events.write().insert(key, record);
    }

    fn snapshot(&self) -> Vec<EventRecord> {
        self.events.read().values().cloned().collect()
    }

    fn clear(&self) {
        self.events.write().clear();
    }

    fn len(&self) -> usize {
        self.events.read().len()
    }
}

/// A descriptor's handle to the registry it was registered with.
///
/// Set once, at first registration; resolved on every publish.
#[derive(Debug, Default)]
pub(crate) struct RegistryBinding(OnceLock<Arc<EventCache>>);

impl RegistryBinding {
    pub(crate) fn bind(&self, cache: &Arc<EventCache>, kind: &'static str, name: &str) {
        if let Err(rejected) = self.0.set(Arc::clone(cache)) {
            if let Some(existing) = self.0.get() {
                if !Arc::ptr_eq(existing, &rejected) {
                    warn!(
                        kind,
                        name,
                        "descriptor already bound to another registry; keeping the first binding"
                    );
                }
            }
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.0.get().is_some()
    }

    pub(crate) fn resolve(&self, kind: &'static str, name: &str) -> Result<&Arc<EventCache>> {
        self.0.get().ok_or_else(|| ConnectorError::NotRegistered {
            kind,
            name: name.to_string(),
        })
    }
}

/// Registry of alerts and statuses a connector can raise, and the cache of
/// their latest published values.
///
/// Registration takes `&mut self` and therefore happens while the registry
/// has a single owner, before it is shared with producers and scrapers:
///
/// ```
/// use connector_events::{Alert, EventRegistry, PublishOptions, Severity, State};
/// use std::sync::Arc;
///
/// let mut registry = EventRegistry::new();
/// let disk_full = Alert::new("disk-full", "disk is full", Severity::Critical, State::Failed);
/// registry.register_alert(&disk_full);
/// let registry = Arc::new(registry);
///
/// disk_full.publish(PublishOptions::new()).unwrap();
/// assert_eq!(registry.len(), 1);
/// ```
///
/// Records are never evicted: the latest value for each key stays visible
/// until it is overwritten or [`EventRegistry::clear`] is called.
#[derive(Debug, Default)]
pub struct EventRegistry {
    alerts: HashMap<String, Alert>,
    statuses: HashMap<String, Status>,
    cache: Arc<EventCache>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an alert and bind it to this registry.
    ///
    /// A second alert with the same name replaces the first in the template
    /// map.
    pub fn register_alert(&mut self, alert: &Alert) {
        alert.bind(&self.cache);
        debug!(alert = %alert.name(), "Registered alert");
        self.alerts.insert(alert.name().to_string(), alert.clone());
    }

    /// Register a status and bind it to this registry.
    pub fn register_status(&mut self, status: &Status) {
        status.bind(&self.cache);
        debug!(status = %status.name(), "Registered status");
        self.statuses.insert(status.name().to_string(), status.clone());
    }

    pub fn alert(&self, name: &str) -> Option<&Alert> {
        self.alerts.get(name)
    }

    pub fn status(&self, name: &str) -> Option<&Status> {
        self.statuses.get(name)
    }

    /// Insert a record, replacing any record with the same id and stream id.
    pub fn record_event(&self, record: EventRecord) {
        self.cache.upsert(record);
    }

    /// Snapshot of every live record, in no particular order.
    pub fn list_events(&self) -> Vec<EventRecord> {
        self.cache.snapshot()
    }

    /// Drop every live record. Registered descriptors stay registered.
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log every live record at info level.
    pub fn log_events(&self) {
        let events = self.cache.events.read();
        for (key, event) in events.iter() {
            info!(key = %key, event = ?event, "live event");
        }
    }

    /// Scrape endpoint: the current snapshot with an OK status.
    pub fn get_events(&self, _request: &GetEventsRequest) -> GetEventsResponse {
        let event_payloads = self.list_events();
        debug!(count = event_payloads.len(), "Serving event scrape");
        GetEventsResponse {
            status: ResponseStatus {
                code: ResponseCode::Ok,
            },
            event_payloads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{AlertEvent, StatusEvent};
    use crate::events::PublishOptions;
    use crate::types::{Severity, State};

    fn status_record(id: &str, stream_id: &str, message: &str) -> EventRecord {
        EventRecord::Status(StatusEvent {
            id: id.to_string(),
            stream_id: stream_id.to_string(),
            message: message.to_string(),
            state: State::Healthy,
            metadata: None,
        })
    }

    #[test]
    fn test_record_event_upserts() {
        let registry = EventRegistry::new();

        registry.record_event(status_record("db", "", "first"));
        registry.record_event(status_record("db", "", "second"));
        registry.record_event(status_record("db", "s1", "other stream"));

        assert_eq!(registry.len(), 2);
        let events = registry.list_events();
        let plain = events.iter().find(|e| e.stream_id().is_empty()).unwrap();
        match plain {
            EventRecord::Status(s) => assert_eq!(s.message, "second"),
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[test]
    fn test_alert_replaces_status_with_same_key() {
        let registry = EventRegistry::new();

        registry.record_event(status_record("x", "", "status"));
        registry.record_event(EventRecord::Alert(AlertEvent {
            id: "x".to_string(),
            stream_id: String::new(),
            message: "alert".to_string(),
            severity: Severity::Warning,
            state: State::Unhealthy,
            metadata: None,
        }));

        let events = registry.list_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], EventRecord::Alert(_)));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let registry = EventRegistry::new();
        registry.record_event(status_record("db", "", "first"));

        let snapshot = registry.list_events();
        registry.record_event(status_record("db", "", "second"));
        registry.clear();

        assert_eq!(snapshot.len(), 1);
        match &snapshot[0] {
            EventRecord::Status(s) => assert_eq!(s.message, "first"),
            other => panic!("Expected Status, got {:?}", other),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_events_ok_when_empty() {
        let registry = EventRegistry::new();
        let response = registry.get_events(&GetEventsRequest::default());
        assert_eq!(response.status.code, ResponseCode::Ok);
        assert!(response.event_payloads.is_empty());
    }

    #[test]
    fn test_reregister_replaces_template() {
        let mut registry = EventRegistry::new();
        let first = Alert::new("a", "first", Severity::Info, State::Healthy);
        let second = Alert::new("a", "second", Severity::Critical, State::Failed);

        registry.register_alert(&first);
        registry.register_alert(&second);

        assert_eq!(registry.alert("a").unwrap().message(), "second");
        assert!(first.is_registered());
        assert!(second.is_registered());
    }

    #[test]
    fn test_binding_keeps_first_registry() {
        let mut first = EventRegistry::new();
        let mut second = EventRegistry::new();
        let status = Status::new("db", "db down", State::Unhealthy);

        first.register_status(&status);
        second.register_status(&status);
        status.publish(PublishOptions::new()).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert!(second.status("db").is_some());
    }
}
