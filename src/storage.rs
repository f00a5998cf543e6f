//! Cloud Storage object downloads
//!
//! [`ObjectDownloader`] is the seam between the event handler and the storage
//! service. [`GcsClient`] implements it over the JSON API media endpoint and
//! streams the body to disk chunk by chunk.

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Downloads a single object to a local file
#[async_trait]
pub trait ObjectDownloader: Send + Sync {
    /// Write `gs://{bucket}/{object}` to `destination`
    ///
    /// # Returns
    /// Number of bytes written
    ///
    /// # Errors
    /// Fails if the object does not exist, the caller is not authorized, or
    /// the transfer or the local write fails.
    async fn download_to_file(&self, bucket: &str, object: &str, destination: &Path)
    -> Result<u64>;
}

/// Cloud Storage JSON API client
#[derive(Clone)]
pub struct GcsClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl GcsClient {
    /// Build a client from storage settings and an optional bearer token
    pub fn new(config: &StorageConfig, access_token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Media download URL for an object
    pub fn media_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.endpoint,
            urlencoding::encode(bucket),
            urlencoding::encode(object)
        )
    }
}

#[async_trait]
impl ObjectDownloader for GcsClient {
    async fn download_to_file(
        &self,
        bucket: &str,
        object: &str,
        destination: &Path,
    ) -> Result<u64> {
        let url = self.media_url(bucket, object);
        debug!(%url, ?destination, "downloading object");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let mut response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::ObjectNotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Storage {
                status: status.as_u16(),
                message,
            });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(
            bucket,
            object,
            ?destination,
            bytes = written,
            "blob downloaded"
        );

        Ok(written)
    }
}
