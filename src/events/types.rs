//! Wire types returned by the scrape endpoint.

use super::metadata::MetadataStruct;
use crate::types::{ResponseCode, Severity, State};
use serde::{Deserialize, Serialize};

/// Alert as seen by the scraper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub id: String,
    pub stream_id: String,
    pub message: String,
    pub severity: Severity,
    pub state: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataStruct>,
}

/// Status as seen by the scraper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub id: String,
    pub stream_id: String,
    pub message: String,
    pub state: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataStruct>,
}

/// A live event, keyed in the registry by id and stream id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRecord {
    Alert(AlertEvent),
    Status(StatusEvent),
}

impl EventRecord {
    pub fn id(&self) -> &str {
        match self {
            EventRecord::Alert(a) => &a.id,
            EventRecord::Status(s) => &s.id,
        }
    }

    pub fn stream_id(&self) -> &str {
        match self {
            EventRecord::Alert(a) => &a.stream_id,
            EventRecord::Status(s) => &s.stream_id,
        }
    }

    /// Cache key: id followed by stream id.
    pub fn key(&self) -> String {
        let (id, stream_id) = (self.id(), self.stream_id());
        let mut key = String::with_capacity(id.len() + stream_id.len());
        key.push_str(id);
        key.push_str(stream_id);
        key
    }
}

impl From<AlertEvent> for EventRecord {
    fn from(alert: AlertEvent) -> Self {
        EventRecord::Alert(alert)
    }
}

impl From<StatusEvent> for EventRecord {
    fn from(status: StatusEvent) -> Self {
        EventRecord::Status(status)
    }
}

/// Scrape request. Carries no parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GetEventsRequest {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub code: ResponseCode,
}

/// Scrape response: status plus every live event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEventsResponse {
    pub status: ResponseStatus,
    pub event_payloads: Vec<EventRecord>,
}
