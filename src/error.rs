//! Error types for model-poller
//!
//! Errors fall into two groups:
//! - message-scoped errors, caused by the content of a single notification
//!   (missing attributes, malformed payloads, unsafe object names)
//! - transport and filesystem errors from Pub/Sub, Cloud Storage, or extraction
//!
//! The subscriber uses [`Error::is_message_scoped`] to decide whether a failed
//! message is acknowledged or handed back to Pub/Sub for redelivery.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for model-poller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for model-poller
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "subscription")
        key: Option<String>,
    },

    /// A required notification attribute is absent
    #[error("notification is missing required attribute `{key}`")]
    MissingAttribute {
        /// The attribute name that was looked up
        key: &'static str,
    },

    /// Notification payload is not valid UTF-8
    #[error("invalid notification payload: {0}")]
    InvalidPayload(#[from] std::string::FromUtf8Error),

    /// Notification payload is not the expected JSON document
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object id cannot be mapped to a local file inside the staging directory
    #[error("invalid object name {name}: {reason}")]
    InvalidObjectName {
        /// The object id from the notification
        name: String,
        /// Why the name was rejected
        reason: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Pub/Sub API returned a non-success status
    #[error("Pub/Sub request failed with status {status}: {message}")]
    PubSub {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Cloud Storage API returned a non-success status
    #[error("storage request failed with status {status}: {message}")]
    Storage {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Requested object does not exist in the bucket
    #[error("object gs://{bucket}/{object} not found")]
    ObjectNotFound {
        /// Bucket name
        bucket: String,
        /// Object name
        object: String,
    },

    /// Archive extraction error
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The archive could not be read as a ZIP file
    #[error("{archive} is not a readable ZIP archive: {reason}")]
    Corrupt {
        /// The archive that failed to open
        archive: PathBuf,
        /// The reason reported by the ZIP reader
        reason: String,
    },

    /// A single entry could not be read or written
    #[error("failed to extract entry {entry} from {archive}: {reason}")]
    EntryFailed {
        /// The archive being extracted
        archive: PathBuf,
        /// The entry name inside the archive
        entry: String,
        /// The underlying reason
        reason: String,
    },

    /// The entry is encrypted and no password handling is available
    #[error("entry {entry} in {archive} is encrypted")]
    Encrypted {
        /// The archive being extracted
        archive: PathBuf,
        /// The encrypted entry
        entry: String,
    },

    /// The blocking extraction task panicked or was cancelled
    #[error("extraction task for {archive} did not complete: {reason}")]
    TaskFailed {
        /// The archive being extracted
        archive: PathBuf,
        /// Join error description
        reason: String,
    },
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Whether this error is caused by the notification itself
    ///
    /// Redelivering such a message produces the same failure, so the subscriber
    /// acknowledges it after logging. Everything else is left to Pub/Sub's
    /// redelivery.
    pub fn is_message_scoped(&self) -> bool {
        matches!(
            self,
            Error::MissingAttribute { .. }
                | Error::InvalidPayload(_)
                | Error::Serialization(_)
                | Error::InvalidObjectName { .. }
                | Error::ObjectNotFound { .. }
                | Error::Extraction(ExtractionError::Corrupt { .. })
                | Error::Extraction(ExtractionError::Encrypted { .. })
        )
    }
}
