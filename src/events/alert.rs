//! Alerts: named, severity-classified events raised by a connector.

use super::options::PublishOptions;
use super::registry::{EventCache, RegistryBinding};
use super::types::{AlertEvent, EventRecord};
use crate::error::Result;
use crate::types::{Severity, State};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct AlertTemplate {
    name: String,
    message: String,
    severity: Severity,
    state: State,
    registry: RegistryBinding,
}

/// An alert template. Clones share the same registry binding, so a clone
/// taken before registration can publish once any clone is registered.
#[derive(Clone, Debug)]
pub struct Alert {
    inner: Arc<AlertTemplate>,
}

impl Alert {
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        state: State,
    ) -> Self {
        Self {
            inner: Arc::new(AlertTemplate {
                name: name.into(),
                message: message.into(),
                severity,
                state,
                registry: RegistryBinding::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    pub fn severity(&self) -> Severity {
        self.inner.severity
    }

    pub fn state(&self) -> State {
        self.inner.state
    }

    pub fn is_registered(&self) -> bool {
        self.inner.registry.is_bound()
    }

    pub(crate) fn bind(&self, cache: &Arc<EventCache>) {
        self.inner.registry.bind(cache, "alert", &self.inner.name);
    }

    /// Raise the alert, replacing any previous record for the same stream.
    ///
    /// Fails with `NotRegistered` before registration and with
    /// `Serialization` if the metadata cannot be encoded; the registry is
    /// untouched in both cases.
    pub fn publish(&self, options: impl Into<PublishOptions>) -> Result<()> {
        let t = &self.inner;
        let cache = t.registry.resolve("alert", &t.name)?;
        let (stream_id, metadata) = options.into().resolve()?;

        let record = EventRecord::Alert(AlertEvent {
            id: t.name.clone(),
            stream_id,
            message: t.message.clone(),
            severity: t.severity,
            state: t.state,
            metadata,
        });
        cache.upsert(record);
        debug!(alert = %t.name, "Published alert");
        Ok(())
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[name: {}][message: {}][severity: {}][state: {}]",
            self.inner.name, self.inner.message, self.inner.severity, self.inner.state
        )
    }
}
