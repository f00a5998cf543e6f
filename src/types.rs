//! Core types for model-poller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Attribute holding the object name
pub const ATTR_OBJECT_ID: &str = "objectId";
/// Attribute holding the bucket name
pub const ATTR_BUCKET_ID: &str = "bucketId";
/// Attribute holding the storage event type
pub const ATTR_EVENT_TYPE: &str = "eventType";
/// Attribute holding the payload encoding
pub const ATTR_PAYLOAD_FORMAT: &str = "payloadFormat";

/// A single Cloud Storage notification delivered through Pub/Sub
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Notification {
    /// Raw payload bytes (UTF-8 JSON for `JSON_API_V1`)
    pub data: Vec<u8>,
    /// Notification attributes
    pub attributes: HashMap<String, String>,
    /// Pub/Sub message id
    pub message_id: Option<String>,
    /// Time the notification was published
    pub publish_time: Option<DateTime<Utc>>,
}

impl Notification {
    /// Create a notification from payload bytes and attribute pairs
    pub fn new<K, V>(data: impl Into<Vec<u8>>, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            data: data.into(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            message_id: None,
            publish_time: None,
        }
    }

    /// Look up an attribute by name
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Cloud Storage notification event type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Object content fully written and stable
    ObjectFinalize,
    /// Object metadata changed
    ObjectMetadataUpdate,
    /// Object permanently deleted
    ObjectDelete,
    /// Live version became noncurrent
    ObjectArchive,
    /// Any value this crate does not know about
    Other(String),
}

impl EventType {
    /// Parse the wire value of the `eventType` attribute
    pub fn parse(value: &str) -> Self {
        match value {
            "OBJECT_FINALIZE" => EventType::ObjectFinalize,
            "OBJECT_METADATA_UPDATE" => EventType::ObjectMetadataUpdate,
            "OBJECT_DELETE" => EventType::ObjectDelete,
            "OBJECT_ARCHIVE" => EventType::ObjectArchive,
            other => EventType::Other(other.to_string()),
        }
    }

    /// Wire value of this event type
    pub fn as_str(&self) -> &str {
        match self {
            EventType::ObjectFinalize => "OBJECT_FINALIZE",
            EventType::ObjectMetadataUpdate => "OBJECT_METADATA_UPDATE",
            EventType::ObjectDelete => "OBJECT_DELETE",
            EventType::ObjectArchive => "OBJECT_ARCHIVE",
            EventType::Other(s) => s,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding of the notification payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Payload is the JSON API object resource
    JsonApiV1,
    /// No payload
    None,
    /// Any value this crate does not know about
    Other(String),
}

impl PayloadFormat {
    /// Parse the wire value of the `payloadFormat` attribute
    pub fn parse(value: &str) -> Self {
        match value {
            "JSON_API_V1" => PayloadFormat::JsonApiV1,
            "NONE" => PayloadFormat::None,
            other => PayloadFormat::Other(other.to_string()),
        }
    }
}

/// Object resource carried in a `JSON_API_V1` payload
///
/// The JSON API encodes 64-bit integers as strings; numbers are accepted too and
/// kept in their textual form so descriptions print exactly what was sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// Object size in bytes
    #[serde(deserialize_with = "string_or_number")]
    pub size: String,
    /// MIME type of the object
    pub content_type: String,
    /// Metadata generation of this object version
    #[serde(deserialize_with = "string_or_number")]
    pub metageneration: String,
    /// Object name
    #[serde(default)]
    pub name: Option<String>,
    /// Bucket name
    #[serde(default)]
    pub bucket: Option<String>,
    /// Content generation of this object version
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub generation: Option<String>,
    /// Base64 MD5 hash of the content
    #[serde(default)]
    pub md5_hash: Option<String>,
    /// Creation time
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    /// Last metadata modification time
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

/// Lifecycle events emitted by the subscriber
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A notification arrived from the subscription
    MessageReceived {
        /// Pub/Sub message id
        message_id: Option<String>,
        /// Object named by the notification, if present
        object_id: Option<String>,
    },

    /// The object is not a ZIP archive and was not downloaded
    ArchiveSkipped {
        /// Object name
        object_id: String,
    },

    /// The archive was written to the staging directory
    ArchiveDownloaded {
        /// Bucket name
        bucket_id: String,
        /// Object name
        object_id: String,
        /// Bytes written
        bytes: u64,
    },

    /// The archive was extracted and removed
    ArchiveExtracted {
        /// Object name
        object_id: String,
        /// Destination directory
        destination: PathBuf,
        /// Number of files written
        files: usize,
    },

    /// The handler finished and the message was acknowledged
    MessageProcessed {
        /// Pub/Sub message id
        message_id: Option<String>,
        /// Description returned by the handler
        description: String,
    },

    /// The handler failed
    MessageFailed {
        /// Pub/Sub message id
        message_id: Option<String>,
        /// Error message
        error: String,
        /// Whether the message was acknowledged despite the failure
        acknowledged: bool,
    },
}
