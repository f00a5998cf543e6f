//! Notification fixtures, archive builders, and a recording downloader

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use model_poller::{Error, Notification, ObjectDownloader, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Metadata payload from the `model.zip` example notification
pub const MODEL_ZIP_PAYLOAD: &str =
    r#"{"size": "10", "contentType": "application/zip", "metageneration": "1"}"#;

/// Build a notification with the four standard attributes
pub fn notification(
    object_id: &str,
    event_type: &str,
    payload_format: &str,
    data: &str,
) -> Notification {
    Notification::new(
        data.as_bytes().to_vec(),
        [
            ("objectId", object_id),
            ("bucketId", "ml_models"),
            ("eventType", event_type),
            ("payloadFormat", payload_format),
        ],
    )
}

/// The finalize notification for `model.zip` in `ml_models`
pub fn model_zip_finalize() -> Notification {
    notification(
        "model.zip",
        "OBJECT_FINALIZE",
        "JSON_API_V1",
        MODEL_ZIP_PAYLOAD,
    )
}

/// Build an in-memory ZIP archive from `(name, content)` pairs
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Pub/Sub JSON for one received message
pub fn received_message_json(
    ack_id: &str,
    message_id: &str,
    attributes: &[(&str, &str)],
    data: &str,
) -> serde_json::Value {
    let attributes: serde_json::Map<String, serde_json::Value> = attributes
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();

    serde_json::json!({
        "ackId": ack_id,
        "message": {
            "data": STANDARD.encode(data),
            "attributes": attributes,
            "messageId": message_id,
            "publishTime": "2024-03-01T12:00:00.000Z"
        }
    })
}

/// One recorded call to [`RecordingDownloader`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadCall {
    pub bucket: String,
    pub object: String,
    pub destination: PathBuf,
}

/// Downloader that writes canned bytes and records every call
pub struct RecordingDownloader {
    body: Option<Vec<u8>>,
    calls: Mutex<Vec<DownloadCall>>,
}

impl RecordingDownloader {
    /// Serve `body` for every object
    pub fn serving(body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request as if the object did not exist
    pub fn missing() -> Self {
        Self {
            body: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<DownloadCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectDownloader for RecordingDownloader {
    async fn download_to_file(
        &self,
        bucket: &str,
        object: &str,
        destination: &Path,
    ) -> Result<u64> {
        self.calls.lock().unwrap().push(DownloadCall {
            bucket: bucket.to_string(),
            object: object.to_string(),
            destination: destination.to_path_buf(),
        });

        let Some(body) = &self.body else {
            return Err(Error::ObjectNotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            });
        };

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, body)?;
        Ok(body.len() as u64)
    }
}
