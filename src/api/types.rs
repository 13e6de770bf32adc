//! Bridge types for commands and events.
//!
//! These types travel across the channel between the UI process and the
//! privileged worker, so both sides agree on a single serialized shape.

use serde::{Deserialize, Serialize};

/// Unique identifier for an install session (UUID v4 string)
pub type SessionId = String;

/// Stable identifier of a version (e.g. "v1.2")
pub type VersionTag = String;

/// A version offered by the version source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    /// Stable identifier used by every other command
    pub tag: VersionTag,
    /// Display label
    pub name: String,
    /// Archive size in bytes
    pub size: u64,
    /// Excluded from the default selector list
    #[serde(default)]
    pub hidden: bool,
}

/// The version list as published by the source, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionList {
    #[serde(rename = "Versions")]
    pub versions: Vec<VersionDescriptor>,
}

impl VersionList {
    pub fn find(&self, tag: &str) -> Option<&VersionDescriptor> {
        self.versions.iter().find(|v| v.tag == tag)
    }
}

/// An installed version as recorded by the worker in `install.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledVersion {
    pub tag: VersionTag,
    /// Display label copied from the descriptor at install time
    pub name: String,
    /// Archive size in bytes
    pub size: u64,
    /// Timestamp of installation (milliseconds since epoch)
    pub installed_at_ms: u64,
    /// Absolute path of the version directory
    pub path: String,
}

/// API errors shared by both processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ApiError {
    /// Invalid input parameter
    InvalidInput { message: String },
    /// IO error during file system or process operation
    IoError { message: String },
    /// Download or remote fetch failed
    NetworkError { message: String },
    /// Tag is not offered by the version source
    VersionNotFound { tag: VersionTag },
    /// Tag has no installation on disk
    VersionNotInstalled { tag: VersionTag },
    /// Another install session for this tag is still running
    InstallInProgress { tag: VersionTag },
    /// Malformed or unexpected message on the channel
    ProtocolError { message: String },
    /// The other end of the channel went away
    Disconnected,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::InvalidInput { message } => write!(f, "Invalid input: {message}"),
            ApiError::IoError { message } => write!(f, "IO error: {message}"),
            ApiError::NetworkError { message } => write!(f, "Network error: {message}"),
            ApiError::VersionNotFound { tag } => write!(f, "Version not found: {tag}"),
            ApiError::VersionNotInstalled { tag } => write!(f, "Version not installed: {tag}"),
            ApiError::InstallInProgress { tag } => {
                write!(f, "Version is already being installed: {tag}")
            }
            ApiError::ProtocolError { message } => write!(f, "Protocol error: {message}"),
            ApiError::Disconnected => write!(f, "Worker process disconnected"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::IoError {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_list_uses_published_field_name() {
        let json = r#"{"Versions":[{"tag":"v1.0","name":"First","size":1024}]}"#;
        let list: VersionList = serde_json::from_str(json).unwrap();

        assert_eq!(list.versions.len(), 1);
        assert!(!list.versions[0].hidden);
        assert_eq!(list.find("v1.0").map(|v| v.name.as_str()), Some("First"));
        assert!(list.find("v2.0").is_none());
    }

    #[test]
    fn test_api_error_is_tagged() {
        let err = ApiError::VersionNotInstalled {
            tag: "v1.0".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["type"], "VersionNotInstalled");
        assert_eq!(json["tag"], "v1.0");
        assert_eq!(err.to_string(), "Version not installed: v1.0");
    }

    #[test]
    fn test_installed_version_timestamp_is_integer_millis() {
        let record = InstalledVersion {
            tag: "v1.0".to_string(),
            name: "First".to_string(),
            size: 1024,
            installed_at_ms: 1_700_000_000_123,
            path: "/versions/v1.0".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["installedAtMs"].as_u64(), Some(1_700_000_000_123));
        let back: InstalledVersion = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
