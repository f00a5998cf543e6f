use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing the given files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a password-encrypted ZIP using the deprecated ZipCrypto method
fn create_encrypted_zip(archive_path: &Path, file_name: &str, content: &[u8]) {
    use ::zip::unstable::write::FileOptionsExt;
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored)
        .with_deprecated_encryption(b"hunter2");
    writer.start_file(file_name, options).unwrap();
    std::io::Write::write_all(&mut writer, content).unwrap();
    writer.finish().unwrap();
}

// ===========================================================================
// ZipExtractor::extract
// ===========================================================================

#[test]
fn extract_writes_single_file() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("model.zip");
    create_zip_archive(&archive_path, &[("weights.bin", b"0123456789")]);

    let dest = temp_dir.path().join("models");
    let files = ZipExtractor::extract(&archive_path, &dest).unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0], dest.join("weights.bin"));
    assert_eq!(std::fs::read(&files[0]).unwrap(), b"0123456789");
}

#[test]
fn extract_creates_nested_directories() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("model.zip");
    create_zip_archive(
        &archive_path,
        &[
            ("config.json", b"{}"),
            ("variables/variables.index", b"index"),
            ("assets/vocab/tokens.txt", b"a b c"),
        ],
    );

    let dest = temp_dir.path().join("out");
    let files = ZipExtractor::extract(&archive_path, &dest).unwrap();

    assert_eq!(files.len(), 3, "every file entry should be extracted");
    assert_eq!(
        std::fs::read(dest.join("variables/variables.index")).unwrap(),
        b"index"
    );
    assert_eq!(
        std::fs::read(dest.join("assets/vocab/tokens.txt")).unwrap(),
        b"a b c"
    );
}

#[test]
fn extract_creates_missing_destination() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("model.zip");
    create_zip_archive(&archive_path, &[("a.txt", b"a")]);

    let dest = temp_dir.path().join("does/not/exist/yet");
    ZipExtractor::extract(&archive_path, &dest).unwrap();

    assert!(dest.join("a.txt").is_file());
}

#[test]
fn extract_overwrites_existing_files() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("model.zip");
    create_zip_archive(&archive_path, &[("version.txt", b"v2")]);

    let dest = temp_dir.path().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("version.txt"), b"v1-with-longer-content").unwrap();

    ZipExtractor::extract(&archive_path, &dest).unwrap();

    assert_eq!(std::fs::read(dest.join("version.txt")).unwrap(), b"v2");
}

#[test]
fn extract_skips_entries_that_escape_destination() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("evil.zip");
    create_zip_archive(
        &archive_path,
        &[("../outside.txt", b"escape"), ("inside.txt", b"ok")],
    );

    let dest = temp_dir.path().join("out");
    let files = ZipExtractor::extract(&archive_path, &dest).unwrap();

    assert_eq!(files, vec![dest.join("inside.txt")]);
    assert!(
        !temp_dir.path().join("outside.txt").exists(),
        "traversal entry must not be written"
    );
}

#[test]
fn extract_empty_archive_returns_no_files() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("empty.zip");
    create_zip_archive(&archive_path, &[]);

    let files = ZipExtractor::extract(&archive_path, &temp_dir.path().join("out")).unwrap();
    assert!(files.is_empty());
}

#[test]
fn extract_nonexistent_archive_returns_io_error() {
    let temp_dir = TempDir::new().unwrap();

    let result = ZipExtractor::extract(
        Path::new("/no/such/file.zip"),
        &temp_dir.path().join("out"),
    );
    assert!(matches!(result, Err(Error::Io(_))), "got {result:?}");
}

#[test]
fn extract_corrupt_archive_returns_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("corrupt.zip");
    std::fs::write(&archive_path, b"not a zip file at all").unwrap();

    let result = ZipExtractor::extract(&archive_path, &temp_dir.path().join("out"));
    match result {
        Err(Error::Extraction(ExtractionError::Corrupt { archive, .. })) => {
            assert_eq!(archive, archive_path);
        }
        other => panic!("expected Corrupt, got: {other:?}"),
    }
}

#[test]
fn extract_encrypted_entry_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("secret.zip");
    create_encrypted_zip(&archive_path, "secret.txt", b"data");

    let result = ZipExtractor::extract(&archive_path, &temp_dir.path().join("out"));
    match result {
        Err(Error::Extraction(ExtractionError::Encrypted { archive, .. })) => {
            assert_eq!(archive, archive_path);
        }
        other => panic!("expected Encrypted, got: {other:?}"),
    }
}

// ===========================================================================
// extract_archive (async wrapper)
// ===========================================================================

#[tokio::test]
async fn extract_archive_runs_off_the_runtime() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("model.zip");
    create_zip_archive(&archive_path, &[("saved_model.pb", b"graph")]);

    let dest = temp_dir.path().join("models");
    let files = extract_archive(&archive_path, &dest).await.unwrap();

    assert_eq!(files, vec![dest.join("saved_model.pb")]);
}

#[tokio::test]
async fn extract_archive_propagates_corrupt_archive() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("broken.zip");
    std::fs::write(&archive_path, b"PK\x03\x04 truncated").unwrap();

    let err = extract_archive(&archive_path, &temp_dir.path().join("out"))
        .await
        .unwrap_err();
    assert!(err.is_message_scoped(), "corrupt archives are not retryable");
}
