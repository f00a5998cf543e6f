//! Processing of a single storage notification
//!
//! [`EventHandler::process`] turns one notification into a human-readable
//! description. For a finalized `.zip` object announced with a `JSON_API_V1`
//! payload it also downloads the archive, extracts it into the save
//! directory, and removes the downloaded file.
//!
//! Every call is independent; the handler keeps no state between messages.

use crate::error::{Error, Result};
use crate::extraction::extract_archive;
use crate::storage::ObjectDownloader;
use crate::types::{
    ATTR_BUCKET_ID, ATTR_EVENT_TYPE, ATTR_OBJECT_ID, ATTR_PAYLOAD_FORMAT, Event, EventType,
    Notification, ObjectMetadata, PayloadFormat,
};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the lifecycle event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Turns notifications into descriptions and archive side effects
#[derive(Clone)]
pub struct EventHandler {
    downloader: Arc<dyn ObjectDownloader>,
    staging_dir: PathBuf,
    event_tx: broadcast::Sender<Event>,
}

impl EventHandler {
    /// Create a handler that stages downloads in `staging_dir`
    pub fn new(downloader: Arc<dyn ObjectDownloader>, staging_dir: impl Into<PathBuf>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            downloader,
            staging_dir: staging_dir.into(),
            event_tx,
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: Event) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Process one notification and describe it
    ///
    /// Attributes are looked up in this order: `objectId`, `bucketId`,
    /// `eventType`, `payloadFormat`. A non-zip object returns a warning before
    /// any later attribute is consulted.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingAttribute`] when a required attribute is absent
    /// - [`Error::InvalidPayload`] / [`Error::Serialization`] for a bad
    ///   `JSON_API_V1` payload
    /// - download, extraction and filesystem errors for finalize events
    pub async fn process(&self, notification: &Notification, save_dir: &Path) -> Result<String> {
        let object_id = required(notification, ATTR_OBJECT_ID)?;

        if !is_zip_object(object_id) {
            self.emit(Event::ArchiveSkipped {
                object_id: object_id.to_string(),
            });
            return Ok(not_zip_warning(object_id));
        }

        let bucket_id = required(notification, ATTR_BUCKET_ID)?;
        let event_type = required(notification, ATTR_EVENT_TYPE)?;
        let mut description = format!(
            "\tEvent type: {event_type}\n\tBucket ID: {bucket_id}\n\tObject ID: {object_id}\n"
        );

        let payload_format = required(notification, ATTR_PAYLOAD_FORMAT)?;
        if PayloadFormat::parse(payload_format) != PayloadFormat::JsonApiV1 {
            debug!(object_id, payload_format, "payload not in JSON API format");
            return Ok(description);
        }

        let metadata = parse_metadata(&notification.data)?;
        description.push_str(&format!(
            "\tContent type: {}\n\tSize: {}\n\tMetageneration: {}\n",
            metadata.content_type, metadata.size, metadata.metageneration
        ));

        if EventType::parse(event_type) == EventType::ObjectFinalize {
            self.download_and_extract(bucket_id, object_id, save_dir)
                .await?;
        }

        Ok(description)
    }

    /// Download `object_id`, unpack it into `save_dir`, and delete the archive
    async fn download_and_extract(
        &self,
        bucket_id: &str,
        object_id: &str,
        save_dir: &Path,
    ) -> Result<()> {
        let archive_path = staging_path(&self.staging_dir, object_id)?;
        let created_root = first_missing_dir(&self.staging_dir, &archive_path).await;

        info!(bucket_id, object_id, "Download zip file {}", object_id);
        let bytes = match self
            .downloader
            .download_to_file(bucket_id, object_id, &archive_path)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_staged(&archive_path, created_root.as_deref()).await;
                return Err(e);
            }
        };
        self.emit(Event::ArchiveDownloaded {
            bucket_id: bucket_id.to_string(),
            object_id: object_id.to_string(),
            bytes,
        });

        info!(object_id, ?save_dir, "Extract archive to {}", save_dir.display());
        let extracted = extract_archive(&archive_path, save_dir).await;
        remove_staged(&archive_path, created_root.as_deref()).await;
        let files = extracted?;

        self.emit(Event::ArchiveExtracted {
            object_id: object_id.to_string(),
            destination: save_dir.to_path_buf(),
            files: files.len(),
        });

        Ok(())
    }
}

fn required<'a>(notification: &'a Notification, key: &'static str) -> Result<&'a str> {
    notification
        .attribute(key)
        .ok_or(Error::MissingAttribute { key })
}

/// Whether the text after the first `.` of the object id is exactly `zip`
pub fn is_zip_object(object_id: &str) -> bool {
    object_id
        .split_once('.')
        .is_some_and(|(_, extension)| extension == "zip")
}

/// Description returned for objects that are not ZIP archives
pub fn not_zip_warning(object_id: &str) -> String {
    format!("Warning: File {object_id} is not of type `.zip`.\nFile not saved")
}

fn parse_metadata(data: &[u8]) -> Result<ObjectMetadata> {
    let text = String::from_utf8(data.to_vec())?;
    Ok(serde_json::from_str(&text)?)
}

/// Local path of the downloaded archive, named after the object id
///
/// Object ids containing root, `.` or `..` components are rejected so the
/// download cannot land outside `staging_dir`.
fn staging_path(staging_dir: &Path, object_id: &str) -> Result<PathBuf> {
    let relative = Path::new(object_id);
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));

    if !safe || relative.as_os_str().is_empty() {
        return Err(Error::InvalidObjectName {
            name: object_id.to_string(),
            reason: "object id does not map to a file inside the staging directory".to_string(),
        });
    }

    Ok(staging_dir.join(relative))
}

/// Outermost directory between `staging_dir` and the archive that does not
/// exist yet, i.e. the first one the download will have to create
async fn first_missing_dir(staging_dir: &Path, archive_path: &Path) -> Option<PathBuf> {
    let mut missing = None;
    let mut dir = archive_path.parent();
    while let Some(current) = dir {
        if current == staging_dir || !current.starts_with(staging_dir) {
            break;
        }
        if tokio::fs::try_exists(current).await.unwrap_or(true) {
            break;
        }
        missing = Some(current.to_path_buf());
        dir = current.parent();
    }
    missing
}

/// Delete the downloaded archive, then every directory the download created
/// for it that is now empty
///
/// `created_root` is the outermost directory created for the archive. Pruning
/// walks upwards from the archive and stops after it, or at the first
/// directory that still has entries.
async fn remove_staged(archive_path: &Path, created_root: Option<&Path>) {
    match tokio::fs::remove_file(archive_path).await {
        Ok(()) => debug!(?archive_path, "removed downloaded archive"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?archive_path, error = %e, "failed to remove downloaded archive"),
    }

    let Some(root) = created_root else {
        return;
    };
    let mut dir = archive_path.parent();
    while let Some(current) = dir {
        if !current.starts_with(root) {
            break;
        }
        match tokio::fs::remove_dir(current).await {
            Ok(()) => debug!(dir = ?current, "removed staging directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            // Not empty, or not ours to remove
            Err(_) => break,
        }
        if current == root {
            break;
        }
        dir = current.parent();
    }
}
