//! Starting installed versions.

use std::process::Stdio;

use tokio::process::Command;

use crate::api::types::ApiError;
use crate::versions::manager::VersionManager;

/// Start the executable of an installed version.
///
/// Completes once the process has been spawned; the process outlives the
/// call and is reaped in the background.
///
/// # Errors
///
/// - `VersionNotInstalled` if `tag` has no installation
/// - `InvalidInput` if `executable` escapes the version directory
/// - `IoError` if the executable is missing or cannot be started
pub async fn run_version(
    manager: &VersionManager,
    tag: &str,
    executable: &str,
) -> Result<(), ApiError> {
    if executable.trim().is_empty() || executable.contains("..") {
        return Err(ApiError::InvalidInput {
            message: format!("Invalid executable path: {executable}"),
        });
    }

    let record = manager.installed_version(tag).await?;
    let version_dir = manager.version_dir(&record.tag);
    let program = version_dir.join(executable);

    if !tokio::fs::try_exists(&program).await.unwrap_or(false) {
        return Err(ApiError::IoError {
            message: format!("Executable not found: {}", program.display()),
        });
    }

    log::info!("Running version: tag={tag}, program={}", program.display());

    let mut child = Command::new(&program)
        .current_dir(&version_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ApiError::IoError {
            message: format!("Failed to start {tag}: {e}"),
        })?;

    let pid = child.id();
    let tag = tag.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => log::info!("Version exited: tag={tag}, pid={pid:?}, code={:?}", status.code()),
            Err(e) => log::warn!("Version wait failed: tag={tag}, error={e}"),
        }
    });

    Ok(())
}
