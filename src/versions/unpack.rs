//! Archive extraction for downloaded versions.

use std::fs;
use std::path::PathBuf;

use crate::api::types::ApiError;

/// Extract a `.tar.gz` archive into `dest`, creating it if needed.
///
/// Runs on the blocking pool. Entries that would escape `dest` are skipped
/// by `tar` itself.
pub async fn unpack_tar_gz(archive_path: PathBuf, dest: PathBuf) -> Result<(), ApiError> {
    log::info!(
        "Extracting {} into {}",
        archive_path.display(),
        dest.display()
    );

    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        fs::create_dir_all(&dest)?;

        let tar_gz = fs::File::open(&archive_path)?;
        let tar = flate2::read::GzDecoder::new(tar_gz);
        let mut archive = tar::Archive::new(tar);
        archive.unpack(&dest).map_err(|e| ApiError::IoError {
            message: format!("Failed to extract archive: {e}"),
        })
    })
    .await
    .map_err(|e| ApiError::IoError {
        message: format!("Extract task failed: {e}"),
    })?
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unpack_extracts_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("build.tar.gz");
        fixtures::write_tar_gz(
            &archive,
            &[
                ("bin/game", b"#!/bin/sh\n".as_slice()),
                ("data/readme.txt", b"hi".as_slice()),
            ],
        );

        let dest = dir.path().join("out");
        unpack_tar_gz(archive, dest.clone()).await.unwrap();

        assert_eq!(std::fs::read(dest.join("data/readme.txt")).unwrap(), b"hi");
        assert!(dest.join("bin/game").exists());
    }

    #[tokio::test]
    async fn test_unpack_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let result = unpack_tar_gz(archive, dir.path().join("out")).await;
        assert!(matches!(result, Err(ApiError::IoError { .. })));
    }
}
