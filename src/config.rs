//! Launcher configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file or
//! a partial file is valid.
//!
//! ```toml
//! [client]
//! progress_interval_ms = 150
//!
//! [worker]
//! install_dir = "/home/me/.local/share/launcher/versions"
//! source_dir = "/srv/launcher"
//! executable = "bin/game"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::types::ApiError;
use crate::runtime::throttle::DEFAULT_PROGRESS_INTERVAL;

const APP_DIR_NAME: &str = "launcher";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub client: ClientConfig,
    pub worker: WorkerConfig,
}

/// UI-side settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Minimum interval between forwarded progress updates; 0 disables
    /// throttling
    pub progress_interval_ms: u64,
}

impl ClientConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL.as_millis() as u64,
        }
    }
}

/// Privileged worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Root directory holding one subdirectory per installed version
    pub install_dir: PathBuf,
    /// Local version source; takes precedence over the URLs below
    pub source_dir: Option<PathBuf>,
    /// URL of the published version list
    pub versions_url: Option<String>,
    /// URL of the launcher info markdown
    pub launcher_info_url: Option<String>,
    /// Archive URL, `{tag}` is replaced by the version tag
    pub archive_url_template: Option<String>,
    /// Program to start, relative to the version directory
    pub executable: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            install_dir: default_data_dir().join("versions"),
            source_dir: None,
            versions_url: None,
            launcher_info_url: None,
            archive_url_template: None,
            executable: "launcher-game".to_string(),
        }
    }
}

impl LauncherConfig {
    /// Parse a configuration file.
    ///
    /// # Errors
    ///
    /// `IoError` if the file cannot be read, `InvalidInput` if it is not
    /// valid configuration TOML.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let content = std::fs::read_to_string(path).map_err(|e| ApiError::IoError {
            message: format!("Failed to read config {}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ApiError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn parse(content: &str) -> Result<Self, ApiError> {
        toml::from_str(content).map_err(|e| ApiError::InvalidInput {
            message: format!("Invalid config: {e}"),
        })
    }
}

/// `<config_dir>/launcher/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LauncherConfig::parse("").unwrap();

        assert_eq!(config, LauncherConfig::default());
        assert_eq!(config.client.progress_interval(), Duration::from_millis(150));
        assert!(config.worker.install_dir.ends_with("versions"));
    }

    #[test]
    fn test_partial_config_overrides_fields() {
        let config = LauncherConfig::parse(
            r#"
            [client]
            progress_interval_ms = 0

            [worker]
            source_dir = "/srv/launcher"
            executable = "bin/game"
            "#,
        )
        .unwrap();

        assert_eq!(config.client.progress_interval(), Duration::ZERO);
        assert_eq!(config.worker.source_dir, Some(PathBuf::from("/srv/launcher")));
        assert_eq!(config.worker.executable, "bin/game");
        assert!(config.worker.versions_url.is_none());
    }

    #[test]
    fn test_malformed_config_is_invalid_input() {
        let result = LauncherConfig::parse("[client]\nprogress_interval_ms = \"fast\"");
        assert!(matches!(result, Err(ApiError::InvalidInput { .. })));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, LauncherConfig::default());

        let result = LauncherConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ApiError::IoError { .. })));
    }
}
