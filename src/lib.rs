//! # Connector Events
//!
//! Concurrency and messaging layer for data-pipeline connectors.
//!
//! ## Core Concepts
//!
//! - **Events**: Alerts and statuses registered once, published from any
//!   thread, and scraped as a snapshot of their latest values
//! - **Transport**: Publish/subscribe of byte payloads through a broker, with
//!   several payloads batched per envelope
//! - **RetryOnce**: Run-until-first-success gate used to construct the
//!   transport client
//!
//! ## Example
//!
//! ```ignore
//! use connector_events::*;
//!
//! let mut registry = EventRegistry::new();
//! let db_down = Status::new("unableToContactDB", "unable to contact the database", State::Unhealthy);
//! registry.register_status(&db_down);
//! let registry = Arc::new(registry);
//!
//! let provider = TransportProvider::new(NatsBroker::new(), TransportConfig::from_env());
//! match provider.client() {
//!     Ok(client) => client.publish("stream-1", Message::new(b"row".to_vec()))?,
//!     Err(_) => db_down.publish(PublishOptions::new().with_stream_id("stream-1"))?,
//! }
//!
//! let scrape = registry.get_events(&GetEventsRequest::default());
//! ```

pub mod error;
pub mod events;
pub mod once;
pub mod transport;
pub mod types;

// Re-exports
pub use error::{ConnectorError, Result};
pub use events::{
    Alert, AlertEvent, EventMetadata, EventRecord, EventRegistry, GetEventsRequest,
    GetEventsResponse, MetadataValue, PublishOption, PublishOptions, ResponseStatus, Status,
    StatusEvent,
};
pub use once::RetryOnce;
pub use transport::{
    Broker, ClientState, ConnectionEvent, Envelope, InMemoryBroker, Message, MetricsSink,
    NatsBroker, PushGatewaySink, Subscription, TransportClient, TransportConfig,
    TransportMetrics, TransportProvider,
};
pub use types::*;
