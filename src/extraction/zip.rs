use crate::error::{ExtractionError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::result::ZipError;

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Open a ZIP entry by index
    fn open_zip_entry<'a>(
        archive: &'a mut zip::ZipArchive<File>,
        index: usize,
        archive_path: &Path,
    ) -> Result<zip::read::ZipFile<'a>> {
        archive.by_index(index).map_err(|e| match e {
            ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => {
                ExtractionError::Encrypted {
                    archive: archive_path.to_path_buf(),
                    entry: format!("#{index}"),
                }
                .into()
            }
            other => ExtractionError::EntryFailed {
                archive: archive_path.to_path_buf(),
                entry: format!("#{index}"),
                reason: other.to_string(),
            }
            .into(),
        })
    }

    /// Extract a single ZIP entry to disk, creating directories as needed
    ///
    /// Returns `None` for directories and for entries whose names would
    /// escape `dest_path`.
    fn extract_zip_entry(
        mut file: zip::read::ZipFile,
        dest_path: &Path,
        archive_path: &Path,
    ) -> Result<Option<PathBuf>> {
        let file_path = match file.enclosed_name() {
            Some(path) => dest_path.join(path),
            None => {
                warn!(entry = file.name(), "skipping entry with unsafe path");
                return Ok(None);
            }
        };

        if file.is_dir() {
            std::fs::create_dir_all(&file_path)?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&file_path)?;
        std::io::copy(&mut file, &mut outfile).map_err(|e| ExtractionError::EntryFailed {
            archive: archive_path.to_path_buf(),
            entry: file.name().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(file_path))
    }

    /// Extract every entry of `archive_path` into `dest_path`
    ///
    /// The destination is created if missing. Existing files with the same
    /// names are overwritten.
    pub fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting ZIP extraction");

        std::fs::create_dir_all(dest_path)?;

        let file = File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| ExtractionError::Corrupt {
            archive: archive_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut extracted_files = Vec::new();

        for i in 0..archive.len() {
            let file = Self::open_zip_entry(&mut archive, i, archive_path)?;

            if let Some(file_path) = Self::extract_zip_entry(file, dest_path, archive_path)? {
                extracted_files.push(file_path);
            }
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "ZIP extraction successful"
        );

        Ok(extracted_files)
    }
}
