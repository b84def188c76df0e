//! Alert and status events served to a pull-based scraper.
//!
//! A connector declares the alerts and statuses it can raise, registers them
//! with an [`EventRegistry`] at startup, and publishes them from any thread.
//! The registry keeps only the latest record per (name, stream id) and hands
//! a snapshot to whoever scrapes it.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = EventRegistry::new();
//!
//! let fetch_failed = Alert::new(
//!     "unableToFetchData",
//!     "unable to fetch the data required to stream",
//!     Severity::Critical,
//!     State::Failed,
//! );
//! registry.register_alert(&fetch_failed);
//! let registry = Arc::new(registry);
//!
//! fetch_failed.publish(PublishOptions::new())?;
//! fetch_failed.publish(PublishOptions::new().with_stream_id(stream_id))?;
//!
//! let response = registry.get_events(&GetEventsRequest::default());
//! ```

mod alert;
mod metadata;
mod options;
mod registry;
mod status;
mod types;

pub use alert::Alert;
pub use metadata::{
    EventMetadata, MetadataStruct, MetadataValue, ERROR_MESSAGE_KEY, EXTRA_MESSAGE_KEY,
    STREAM_ID_KEY,
};
pub use options::{PublishOption, PublishOptions};
pub use registry::EventRegistry;
pub use status::Status;
pub use types::{
    AlertEvent, EventRecord, GetEventsRequest, GetEventsResponse, ResponseStatus, StatusEvent,
};
