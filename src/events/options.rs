//! Per-publish overrides for alerts and statuses.

use super::metadata::{EventMetadata, MetadataStruct};
use crate::error::Result;

/// A single override applied when publishing.
#[derive(Clone, Debug, PartialEq)]
pub enum PublishOption {
    /// Publish against a specific stream instead of the connector as a whole.
    StreamId(String),
    /// Attach metadata to the published record.
    Metadata(EventMetadata),
}

/// Overrides for one `publish` call.
///
/// Settings are applied in order; a later setting of the same field replaces
/// an earlier one. Build it either with the `with_*` methods or by collecting
/// an ordered list of [`PublishOption`]s:
///
/// ```
/// use connector_events::{PublishOption, PublishOptions};
///
/// let opts: PublishOptions = vec![
///     PublishOption::StreamId("first".into()),
///     PublishOption::StreamId("second".into()),
/// ]
/// .into_iter()
/// .collect();
/// assert_eq!(opts.stream_id(), "second");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishOptions {
    stream_id: String,
    metadata: Option<EventMetadata>,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream_id(self, stream_id: impl Into<String>) -> Self {
        self.apply(PublishOption::StreamId(stream_id.into()))
    }

    pub fn with_metadata(self, metadata: EventMetadata) -> Self {
        self.apply(PublishOption::Metadata(metadata))
    }

    /// Apply one option on top of the current settings.
    pub fn apply(mut self, option: PublishOption) -> Self {
        match option {
            PublishOption::StreamId(id) => self.stream_id = id,
            PublishOption::Metadata(m) => self.metadata = Some(m),
        }
        self
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn metadata(&self) -> Option<&EventMetadata> {
        self.metadata.as_ref()
    }

    /// Consume the options, serializing any metadata.
    pub(crate) fn resolve(self) -> Result<(String, Option<MetadataStruct>)> {
        let metadata = self.metadata.as_ref().map(EventMetadata::to_struct).transpose()?;
        Ok((self.stream_id, metadata))
    }
}

impl FromIterator<PublishOption> for PublishOptions {
    fn from_iter<I: IntoIterator<Item = PublishOption>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), Self::apply)
    }
}

impl From<PublishOption> for PublishOptions {
    fn from(option: PublishOption) -> Self {
        Self::default().apply(option)
    }
}
