//! Statuses: named health reports without a severity.

use super::options::PublishOptions;
use super::registry::{EventCache, RegistryBinding};
use super::types::{EventRecord, StatusEvent};
use crate::error::Result;
use crate::types::State;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct StatusTemplate {
    name: String,
    message: String,
    state: State,
    registry: RegistryBinding,
}

/// A status template. Publishes the same way as [`crate::Alert`].
#[derive(Clone, Debug)]
pub struct Status {
    inner: Arc<StatusTemplate>,
}

impl Status {
    pub fn new(name: impl Into<String>, message: impl Into<String>, state: State) -> Self {
        Self {
            inner: Arc::new(StatusTemplate {
                name: name.into(),
                message: message.into(),
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

    pub fn state(&self) -> State {
        self.inner.state
    }

    pub fn is_registered(&self) -> bool {
        self.inner.registry.is_bound()
    }

    pub(crate) fn bind(&self, cache: &Arc<EventCache>) {
        self.inner.registry.bind(cache, "status", &self.inner.name);
    }

    pub fn publish(&self, options: impl Into<PublishOptions>) -> Result<()> {
        let t = &self.inner;
        let cache = t.registry.resolve("status", &t.name)?;
        let (stream_id, metadata) = options.into().resolve()?;

        let record = EventRecord::Status(StatusEvent {
            id: t.name.clone(),
            stream_id,
            message: t.message.clone(),
            state: t.state,
            metadata,
        });
        cache.upsert(record);
        debug!(status = %t.name, "Published status");
        Ok(())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[name: {}][message: {}][state: {}]",
            self.inner.name, self.inner.message, self.inner.state
        )
    }
}
