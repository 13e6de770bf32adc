//! Version catalogue and installed-version commands.

use crate::api::types::{ApiError, InstalledVersion, VersionList, VersionTag};
use crate::commands::WorkerState;
use crate::versions::launch;
use crate::versions::manager::VersionManager;

/// List the versions offered by the configured source.
pub async fn get_versions(state: &WorkerState) -> Result<VersionList, ApiError> {
    log::info!("get_versions called");
    state.source.versions().await
}

/// Fetch the launcher info document (markdown).
pub async fn get_launcher_info(state: &WorkerState) -> Result<String, ApiError> {
    log::info!("get_launcher_info called");
    state.source.launcher_info().await
}

pub async fn is_version_installed(state: &WorkerState, tag: VersionTag) -> Result<bool, ApiError> {
    log::debug!("is_version_installed called: tag={tag}");
    VersionManager::validate_tag(&tag)?;
    state.manager.is_installed(&tag).await
}

pub async fn get_installed_versions(state: &WorkerState) -> Result<Vec<InstalledVersion>, ApiError> {
    log::info!("get_installed_versions called");
    state.manager.installed_versions().await
}

/// Remove an installed version.
///
/// Refused with `InstallInProgress` while an install of the same tag runs,
/// since the commit would race the removal.
pub async fn uninstall_version(state: &WorkerState, tag: VersionTag) -> Result<(), ApiError> {
    log::info!("uninstall_version called: tag={tag}");
    VersionManager::validate_tag(&tag)?;

    if state.installer.is_installing(&tag).await {
        return Err(ApiError::InstallInProgress { tag });
    }
    state.manager.uninstall(&tag).await
}

pub async fn run_version(state: &WorkerState, tag: VersionTag) -> Result<(), ApiError> {
    log::info!("run_version called: tag={tag}");
    VersionManager::validate_tag(&tag)?;
    launch::run_version(&state.manager, &tag, &state.executable).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::api::types::VersionDescriptor;
    use crate::versions::source::{DirectorySource, VERSIONS_FILE};

    fn state(source: &std::path::Path, installs: &std::path::Path) -> WorkerState {
        let (tx, _rx) = mpsc::unbounded_channel();
        WorkerState::new(
            Arc::new(VersionManager::new(installs.to_path_buf()).unwrap()),
            Arc::new(DirectorySource::new(source.to_path_buf())),
            "launcher-game".to_string(),
            tx,
        )
    }

    #[tokio::test]
    async fn test_installed_queries_follow_manager() {
        let source = tempfile::tempdir().unwrap();
        let installs = tempfile::tempdir().unwrap();
        let state = state(source.path(), installs.path());

        assert!(!is_version_installed(&state, "v1.0".to_string()).await.unwrap());

        let staged = state.manager.staging_dir("s1");
        std::fs::create_dir_all(&staged).unwrap();
        let descriptor = VersionDescriptor {
            tag: "v1.0".to_string(),
            name: "First".to_string(),
            size: 10,
            hidden: false,
        };
        state.manager.commit(&staged, &descriptor).await.unwrap();

        assert!(is_version_installed(&state, "v1.0".to_string()).await.unwrap());
        let installed = get_installed_versions(&state).await.unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].name, "First");

        uninstall_version(&state, "v1.0".to_string()).await.unwrap();
        assert!(!is_version_installed(&state, "v1.0".to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_invalid_tags() {
        let source = tempfile::tempdir().unwrap();
        let installs = tempfile::tempdir().unwrap();
        let state = state(source.path(), installs.path());

        for result in [
            is_version_installed(&state, "../etc".to_string()).await.map(|_| ()),
            uninstall_version(&state, "".to_string()).await,
            run_version(&state, "a/b".to_string()).await,
        ] {
            assert!(matches!(result, Err(ApiError::InvalidInput { .. })));
        }
    }

    #[tokio::test]
    async fn test_get_versions_reads_source() {
        let source = tempfile::tempdir().unwrap();
        let installs = tempfile::tempdir().unwrap();
        std::fs::write(
            source.path().join(VERSIONS_FILE),
            r#"{"Versions":[{"tag":"v2","name":"Second","size":5,"hidden":true}]}"#,
        )
        .unwrap();
        let state = state(source.path(), installs.path());

        let list = get_versions(&state).await.unwrap();
        assert_eq!(list.versions.len(), 1);
        assert!(list.versions[0].hidden);
    }
}
