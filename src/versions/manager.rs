//! Version Manager - owns the on-disk store of installed versions.
//!
//! # Install Directory Structure
//!
//! ```text
//! install_dir/
//! ├── .downloads/            # Archives being downloaded, one per session
//! ├── .staging/              # Archives being unpacked, one per session
//! ├── v1.0/
//! │   ├── install.json       # InstalledVersion record
//! │   └── ...
//! └── v2.0/
//!     ├── install.json
//!     └── ...
//! ```
//!
//! A version counts as installed only once its `install.json` exists; the
//! directory is moved into place after the metadata is written, so a crashed
//! install never looks installed.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use uuid::Uuid;

use crate::api::types::{ApiError, InstalledVersion, VersionDescriptor};

pub const METADATA_FILE: &str = "install.json";
const DOWNLOADS_DIR: &str = ".downloads";
const STAGING_DIR: &str = ".staging";

pub struct VersionManager {
    install_root: PathBuf,
}

impl VersionManager {
    /// Create a manager rooted at `install_root`, creating the directory
    /// layout if necessary.
    pub fn new(install_root: PathBuf) -> Result<Self, ApiError> {
        for dir in [
            install_root.clone(),
            install_root.join(DOWNLOADS_DIR),
            install_root.join(STAGING_DIR),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| ApiError::IoError {
                message: format!("Failed to create directory {}: {e}", dir.display()),
            })?;
        }

        log::debug!("VersionManager rooted at {}", install_root.display());
        Ok(Self { install_root })
    }

    /// Validate a version tag before it is used as a path component.
    ///
    /// Valid tags:
    /// - 1-64 characters of letters, digits, `.`, `_` and `-`
    /// - Start with a letter or digit
    /// - Never contain `..`
    pub fn validate_tag(tag: &str) -> Result<(), ApiError> {
        static TAG_PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

        if tag.is_empty() {
            return Err(ApiError::InvalidInput {
                message: "Version tag cannot be empty".to_string(),
            });
        }

        if tag.contains("..") {
            return Err(ApiError::InvalidInput {
                message: "Version tag contains invalid path characters".to_string(),
            });
        }

        let pattern = TAG_PATTERN
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$"))
            .as_ref()
            .map_err(|e| ApiError::InvalidInput {
                message: format!("Tag pattern failed to compile: {e}"),
            })?;
        if !pattern.is_match(tag) {
            return Err(ApiError::InvalidInput {
                message: format!("Invalid version tag: {tag}"),
            });
        }

        Ok(())
    }

    /// Validate a session id before it names download and staging paths.
    ///
    /// Session ids are UUIDs chosen by the UI side; anything else could
    /// point cleanup at a directory outside the install root.
    pub fn validate_session_id(id: &str) -> Result<(), ApiError> {
        Uuid::parse_str(id)
            .map(|_| ())
            .map_err(|e| ApiError::InvalidInput {
                message: format!("Invalid session id {id:?}: {e}"),
            })
    }

    pub fn version_dir(&self, tag: &str) -> PathBuf {
        self.install_root.join(tag)
    }

    pub fn download_path(&self, session_id: &str) -> PathBuf {
        self.install_root
            .join(DOWNLOADS_DIR)
            .join(format!("{session_id}.tar.gz"))
    }

    pub fn staging_dir(&self, session_id: &str) -> PathBuf {
        self.install_root.join(STAGING_DIR).join(session_id)
    }

    pub async fn is_installed(&self, tag: &str) -> Result<bool, ApiError> {
        Self::validate_tag(tag)?;
        let metadata_path = self.version_dir(tag).join(METADATA_FILE);
        Ok(tokio::fs::try_exists(&metadata_path).await.unwrap_or(false))
    }

    /// Read the record of one installed version.
    pub async fn installed_version(&self, tag: &str) -> Result<InstalledVersion, ApiError> {
        Self::validate_tag(tag)?;
        let dir = self.version_dir(tag);
        let tag = tag.to_string();

        tokio::task::spawn_blocking(move || read_record(&dir))
            .await
            .map_err(|e| ApiError::IoError {
                message: format!("Metadata read task failed: {e}"),
            })?
            .ok_or(ApiError::VersionNotInstalled { tag })
    }

    /// List installed versions, oldest install first.
    pub async fn installed_versions(&self) -> Result<Vec<InstalledVersion>, ApiError> {
        let root = self.install_root.clone();

        let mut versions = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
            let mut versions = Vec::new();
            for entry in std::fs::read_dir(&root)? {
                let path = entry?.path();
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(true, |n| n.starts_with('.'));
                if hidden || !path.is_dir() {
                    continue;
                }
                if let Some(record) = read_record(&path) {
                    versions.push(record);
                }
            }
            Ok(versions)
        })
        .await
        .map_err(|e| ApiError::IoError {
            message: format!("Directory scan task failed: {e}"),
        })??;

        versions.sort_by(|a, b| {
            a.installed_at_ms
                .cmp(&b.installed_at_ms)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        log::debug!("Installed versions listed: count={}", versions.len());
        Ok(versions)
    }

    /// Write metadata into `staged_dir` and move it into place as `tag`,
    /// replacing any previous installation of that tag.
    pub async fn commit(
        &self,
        staged_dir: &Path,
        descriptor: &VersionDescriptor,
    ) -> Result<InstalledVersion, ApiError> {
        Self::validate_tag(&descriptor.tag)?;
        let target = self.version_dir(&descriptor.tag);

        let record = InstalledVersion {
            tag: descriptor.tag.clone(),
            name: descriptor.name.clone(),
            size: descriptor.size,
            installed_at_ms: now_ms(),
            path: target.to_string_lossy().to_string(),
        };

        let json = serde_json::to_string_pretty(&record).map_err(|e| ApiError::IoError {
            message: format!("Failed to serialize install metadata: {e}"),
        })?;
        tokio::fs::write(staged_dir.join(METADATA_FILE), json).await?;

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            log::info!("Replacing existing installation: tag={}", descriptor.tag);
            tokio::fs::remove_dir_all(&target).await?;
        }
        tokio::fs::rename(staged_dir, &target)
            .await
            .map_err(|e| ApiError::IoError {
                message: format!("Failed to move {} into place: {e}", descriptor.tag),
            })?;

        log::info!("Version committed: tag={}, path={}", record.tag, record.path);
        Ok(record)
    }

    /// Remove an installed version.
    ///
    /// # Errors
    ///
    /// `VersionNotInstalled` if there is no installation for `tag`.
    pub async fn uninstall(&self, tag: &str) -> Result<(), ApiError> {
        if !self.is_installed(tag).await? {
            return Err(ApiError::VersionNotInstalled {
                tag: tag.to_string(),
            });
        }

        let dir = self.version_dir(tag);
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| ApiError::IoError {
                message: format!("Failed to remove {}: {e}", dir.display()),
            })?;

        log::info!("Version uninstalled: tag={tag}");
        Ok(())
    }
}

fn read_record(dir: &Path) -> Option<InstalledVersion> {
    let metadata_path = dir.join(METADATA_FILE);
    let content = std::fs::read_to_string(&metadata_path).ok()?;
    match serde_json::from_str::<InstalledVersion>(&content) {
        Ok(mut record) => {
            record.path = dir.to_string_lossy().to_string();
            Some(record)
        }
        Err(e) => {
            log::warn!("Failed to parse {}: {e}", metadata_path.display());
            None
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
