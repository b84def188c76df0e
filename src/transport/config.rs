//! Transport configuration, resolved once at startup.

use std::env;
use std::time::Duration;

/// Environment variable holding the broker address.
pub const BROKER_URL_VAR: &str = "NATS_BROKER";
/// Environment variable holding the client identity.
pub const CLIENT_NAME_VAR: &str = "NATS_NAME";
/// Environment variable holding the metrics push endpoint.
pub const METRICS_ENDPOINT_VAR: &str = "PUSH_GW";

/// Transport configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Broker address.
    pub broker_url: String,

    /// Client identity reported to the broker.
    pub client_name: String,

    /// Push gateway that metrics snapshots are sent to. Empty disables
    /// export.
    pub metrics_endpoint: String,

    /// How often metrics are pushed.
    /// Default: 1 minute
    pub metrics_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker_url: "nats://127.0.0.1:4222".to_string(),
            client_name: String::new(),
            metrics_endpoint: String::new(),
            metrics_interval: Duration::from_secs(60),
        }
    }
}

impl TransportConfig {
    /// Read the configuration from the process environment. Unset variables
    /// resolve to empty strings, as the deployment injects all three.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            broker_url: lookup(BROKER_URL_VAR).unwrap_or_default(),
            client_name: lookup(CLIENT_NAME_VAR).unwrap_or_default(),
            metrics_endpoint: lookup(METRICS_ENDPOINT_VAR).unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn with_broker_url(mut self, url: impl Into<String>) -> Self {
        self.broker_url = url.into();
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_metrics_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.metrics_endpoint = endpoint.into();
        self
    }

    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    pub fn metrics_enabled(&self) -> bool {
        !self.metrics_endpoint.is_empty()
    }
}
