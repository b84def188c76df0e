//! Wire envelope exchanged through the broker.
//!
//! One envelope carries one or more logical payloads under a single
//! timestamp. Encoded as a MessagePack map `{timestamp, payloads}` with each
//! payload written as a `bin` byte string.

use crate::error::Result;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// A single logical message handed to subscribers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The payload as a string, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Network unit: a timestamp plus an ordered batch of payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Nanoseconds since the Unix epoch at send time.
    pub timestamp: i64,
    #[serde(with = "payload_bytes")]
    pub payloads: Vec<Vec<u8>>,
}

/// Serde adapter for a list of byte strings.
///
/// Decoding also accepts payloads written as arrays of integers.
mod payload_bytes {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_bytes::{ByteBuf, Bytes};

    pub fn serialize<S: Serializer>(payloads: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(payloads.iter().map(|p| Bytes::new(p)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let bufs = Vec::<ByteBuf>::deserialize(deserializer)?;
        Ok(bufs.into_iter().map(ByteBuf::into_vec).collect())
    }
}

impl Envelope {
    /// Envelope stamped with the current time.
    pub fn new(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            timestamp: Timestamp::now().0,
            payloads,
        }
    }

    pub fn single(payload: Vec<u8>) -> Self {
        Self::new(vec![payload])
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Split into the messages handed to a subscriber, in order.
    pub fn into_messages(self) -> impl Iterator<Item = Message> {
        self.payloads.into_iter().map(|payload| Message { payload })
    }
}
