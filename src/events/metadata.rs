//! Optional side payload attached to published events.

use crate::error::{ConnectorError, Result};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Key under which `EventMetadata::error_message` is serialized.
pub const ERROR_MESSAGE_KEY: &str = "ErrorMessage";
/// Key under which `EventMetadata::stream_id` is serialized.
pub const STREAM_ID_KEY: &str = "StreamID";
/// Key under which `EventMetadata::extra` is serialized.
pub const EXTRA_MESSAGE_KEY: &str = "ExtraMessage";

/// Serialized metadata as carried on the wire.
pub type MetadataStruct = Map<String, Value>;

/// A metadata value: a scalar or a collection of values.
///
/// Numbers are stored as `f64`, matching what a structured wire value can
/// hold. Non-finite numbers cannot be represented and fail serialization.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    fn to_value(&self, path: &str) -> Result<Value> {
        Ok(match self {
            MetadataValue::Null => Value::Null,
            MetadataValue::Bool(b) => Value::Bool(*b),
            MetadataValue::Number(n) => Number::from_f64(*n).map(Value::Number).ok_or_else(|| {
                ConnectorError::Serialization(format!(
                    "metadata value at {} is not a finite number: {}",
                    path, n
                ))
            })?,
            MetadataValue::String(s) => Value::String(s.clone()),
            MetadataValue::List(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item.to_value(&format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            MetadataValue::Map(fields) => Value::Object(map_to_struct(fields, path)?),
        })
    }
}

fn map_to_struct(fields: &BTreeMap<String, MetadataValue>, path: &str) -> Result<MetadataStruct> {
    let mut out = Map::new();
    for (key, value) in fields {
        out.insert(key.clone(), value.to_value(&format!("{}.{}", path, key))?);
    }
    Ok(out)
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Number(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Number(v as f64)
    }
}

impl From<i32> for MetadataValue {
    fn from(v: i32) -> Self {
        MetadataValue::Number(f64::from(v))
    }
}

impl From<u32> for MetadataValue {
    fn from(v: u32) -> Self {
        MetadataValue::Number(f64::from(v))
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl<T: Into<MetadataValue>> From<Vec<T>> for MetadataValue {
    fn from(v: Vec<T>) -> Self {
        MetadataValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, MetadataValue>> for MetadataValue {
    fn from(v: BTreeMap<String, MetadataValue>) -> Self {
        MetadataValue::Map(v)
    }
}

/// Extra properties attached to an alert or status when it is published.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventMetadata {
    pub error_message: String,
    pub stream_id: String,
    pub extra: BTreeMap<String, MetadataValue>,
}

impl EventMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = stream_id.into();
        self
    }

    /// Add one extra property. A repeated key replaces the earlier value.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Serialize into the structured form carried on wire records.
    ///
    /// All three keys are always present; `ExtraMessage` is an empty object
    /// when no extras were set.
    pub fn to_struct(&self) -> Result<MetadataStruct> {
        let extra = map_to_struct(&self.extra, EXTRA_MESSAGE_KEY).map_err(|e| {
            tracing::error!(error = %e, "unable to convert event metadata to structured form");
            e
        })?;

        let mut out = Map::new();
        out.insert(
            ERROR_MESSAGE_KEY.to_string(),
            Value::String(self.error_message.clone()),
        );
        out.insert(STREAM_ID_KEY.to_string(), Value::String(self.stream_id.clone()));
        out.insert(EXTRA_MESSAGE_KEY.to_string(), Value::Object(extra));
        Ok(out)
    }
}
