//! Error types for the event registry and transport.

use thiserror::Error;

/// Main error type for connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Publish was attempted on a descriptor that was never registered.
    #[error("{kind} not registered with the registry: {name}")]
    NotRegistered { kind: &'static str, name: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    Send(String),

    /// Inbound envelope could not be decoded. Absorbed by subscriptions;
    /// only returned directly from `Envelope::decode`.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Subscription error: {0}")]
    Subscription(String),
}

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for ConnectorError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        ConnectorError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ConnectorError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        ConnectorError::Decode(e.to_string())
    }
}

/// Result type for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;
