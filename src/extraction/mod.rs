//! Archive extraction
//!
//! Downloaded objects are ZIP archives; [`ZipExtractor`] unpacks them into the
//! save directory. Extraction is blocking file I/O, so async callers go through
//! [`extract_archive`], which runs it on the blocking thread pool.

mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use zip::ZipExtractor;

use crate::error::{ExtractionError, Result};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::info;

/// Extract a ZIP archive into `dest_path` without blocking the runtime
///
/// # Returns
/// * `Ok(Vec<PathBuf>)` - List of extracted files on success
/// * `Err(Error)` - I/O failure, corrupt archive, or encrypted entry
pub async fn extract_archive(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
    let archive = archive_path.to_path_buf();
    let dest = dest_path.to_path_buf();

    info!(?archive_path, ?dest_path, "extracting archive");

    spawn_blocking(move || ZipExtractor::extract(&archive, &dest))
        .await
        .map_err(|e| ExtractionError::TaskFailed {
            archive: archive_path.to_path_buf(),
            reason: e.to_string(),
        })?
}
