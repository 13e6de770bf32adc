//! Version Installer - runs install sessions on the worker side.
//!
//! Each `install_version` command starts one background task:
//! 1. Resolves the tag against the version source
//! 2. Streams the archive into a download file, emitting progress per chunk
//! 3. Emits unpacking and extracts into a staging directory
//! 4. Commits the staged directory as the installed version
//! 5. Emits exactly one terminal event (finish, canceled or error)
//!
//! Cancellation is cooperative: `cancel` flips the session's watch flag,
//! which the task observes while downloading and between stages. Partial
//! files are always removed before the terminal event is emitted.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch, Mutex};

use crate::api::types::{ApiError, SessionId, VersionTag};
use crate::protocols::messages::{InstallerEvent, WorkerMessage};
use crate::versions::manager::VersionManager;
use crate::versions::source::VersionSource;
use crate::versions::unpack::unpack_tar_gz;

/// A running install session
struct RunningInstall {
    tag: VersionTag,
    cancel_tx: watch::Sender<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstallOutcome {
    Finished,
    Canceled,
}

pub struct VersionInstaller {
    manager: Arc<VersionManager>,
    source: Arc<dyn VersionSource>,
    /// Outbound channel for installer events
    events: mpsc::UnboundedSender<WorkerMessage>,
    /// Running sessions keyed by session ID
    running: Mutex<HashMap<SessionId, RunningInstall>>,
    /// Number of running sessions, updated with `running`
    active: watch::Sender<usize>,
}

impl VersionInstaller {
    pub fn new(
        manager: Arc<VersionManager>,
        source: Arc<dyn VersionSource>,
        events: mpsc::UnboundedSender<WorkerMessage>,
    ) -> Self {
        Self {
            manager,
            source,
            events,
            running: Mutex::new(HashMap::new()),
            active: watch::Sender::new(0),
        }
    }

    /// Start an install session. Never fails directly: every rejection is
    /// reported as an `installer_error` event for `id`.
    pub async fn start_install(self: &Arc<Self>, id: SessionId, tag: VersionTag) {
        // The id names download and staging paths, so it is checked first.
        if let Err(error) = VersionManager::validate_session_id(&id) {
            log::warn!("Rejecting install: session_id={id:?}, tag={tag}, error={error}");
            self.emit(InstallerEvent::Error { id, error });
            return;
        }
        if let Err(error) = VersionManager::validate_tag(&tag) {
            log::warn!("Rejecting install: session_id={id}, tag={tag}, error={error}");
            self.emit(InstallerEvent::Error { id, error });
            return;
        }

        let cancel_rx = {
            let mut running = self.running.lock().await;
            if running.contains_key(&id) {
                log::warn!("Duplicate install session ignored: session_id={id}");
                return;
            }
            if running.values().any(|install| install.tag == tag) {
                drop(running);
                log::warn!("Install already in progress: session_id={id}, tag={tag}");
                self.emit(InstallerEvent::Error {
                    id,
                    error: ApiError::InstallInProgress { tag },
                });
                return;
            }

            let (cancel_tx, cancel_rx) = watch::channel(false);
            running.insert(
                id.clone(),
                RunningInstall {
                    tag: tag.clone(),
                    cancel_tx,
                },
            );
            self.active.send_replace(running.len());
            cancel_rx
        };

        log::info!("Starting install: session_id={id}, tag={tag}");

        let installer = Arc::clone(self);
        tokio::spawn(async move {
            installer.run_install_task(id, tag, cancel_rx).await;
        });
    }

    /// Request cancellation of session `id`. Unknown IDs are ignored.
    pub async fn cancel(&self, id: &SessionId) {
        let running = self.running.lock().await;
        match running.get(id) {
            Some(install) => {
                log::info!("Cancel requested: session_id={id}, tag={}", install.tag);
                let _ = install.cancel_tx.send(true);
            }
            None => log::debug!("Cancel for unknown session ignored: session_id={id}"),
        }
    }

    /// Request cancellation of every running session.
    pub async fn cancel_all(&self) {
        let running = self.running.lock().await;
        for (id, install) in running.iter() {
            log::info!("Canceling install: session_id={id}, tag={}", install.tag);
            let _ = install.cancel_tx.send(true);
        }
    }

    pub async fn is_installing(&self, tag: &str) -> bool {
        let running = self.running.lock().await;
        running.values().any(|install| install.tag == tag)
    }

    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }

    /// Wait until no session is running, up to `limit`.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let mut active = self.active.subscribe();
        let idle = matches!(
            tokio::time::timeout(limit, active.wait_for(|count| *count == 0)).await,
            Ok(Ok(_))
        );
        idle
    }

    async fn run_install_task(
        &self,
        id: SessionId,
        tag: VersionTag,
        cancel_rx: watch::Receiver<bool>,
    ) {
        let result = self.install(&id, &tag, cancel_rx).await;
        self.cleanup(&id).await;

        // Leave the running set before the terminal event, so a caller
        // reacting to it already sees the tag as idle.
        {
            let mut running = self.running.lock().await;
            running.remove(&id);
            self.active.send_replace(running.len());
        }

        let event = match result {
            Ok(InstallOutcome::Finished) => {
                log::info!("Install finished: session_id={id}, tag={tag}");
                InstallerEvent::Finish { id }
            }
            Ok(InstallOutcome::Canceled) => {
                log::info!("Install canceled: session_id={id}, tag={tag}");
                InstallerEvent::Canceled { id }
            }
            Err(error) => {
                log::error!("Install failed: session_id={id}, tag={tag}, error={error}");
                InstallerEvent::Error { id, error }
            }
        };
        self.emit(event);
    }

    async fn install(
        &self,
        id: &SessionId,
        tag: &str,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Result<InstallOutcome, ApiError> {
        let versions = self.source.versions().await?;
        let descriptor = versions
            .find(tag)
            .cloned()
            .ok_or_else(|| ApiError::VersionNotFound {
                tag: tag.to_string(),
            })?;

        if cancel_requested(&cancel_rx) {
            return Ok(InstallOutcome::Canceled);
        }

        let download_path = self.manager.download_path(id);
        let mut archive = self.source.open_archive(&descriptor).await?;
        let mut file = tokio::fs::File::create(&download_path).await?;
        let total = archive.total;
        let mut downloaded: u64 = 0;

        loop {
            tokio::select! {
                biased;
                changed = cancel_rx.changed() => {
                    if changed.is_err() || cancel_requested(&cancel_rx) {
                        return Ok(InstallOutcome::Canceled);
                    }
                }
                chunk = archive.chunks.next() => {
                    let Some(chunk) = chunk else {
                        break;
                    };
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    downloaded += chunk.len() as u64;
                    self.emit(InstallerEvent::Progress {
                        id: id.clone(),
                        downloaded,
                        total,
                    });
                }
            }
        }
        file.flush().await?;
        drop(file);

        log::debug!("Download complete: session_id={id}, bytes={downloaded}");

        if cancel_requested(&cancel_rx) {
            return Ok(InstallOutcome::Canceled);
        }

        self.emit(InstallerEvent::Unpacking { id: id.clone() });
        let staging_dir = self.manager.staging_dir(id);
        unpack_tar_gz(download_path, staging_dir.clone()).await?;

        if cancel_requested(&cancel_rx) {
            return Ok(InstallOutcome::Canceled);
        }

        self.manager.commit(&staging_dir, &descriptor).await?;
        Ok(InstallOutcome::Finished)
    }

    async fn cleanup(&self, id: &SessionId) {
        remove_if_exists(&self.manager.download_path(id)).await;
        remove_if_exists(&self.manager.staging_dir(id)).await;
    }

    fn emit(&self, event: InstallerEvent) {
        let name = event.name();
        if self.events.send(WorkerMessage::Event { event }).is_err() {
            log::warn!("Failed to emit {name}: UI channel closed");
        }
    }
}

fn cancel_requested(cancel_rx: &watch::Receiver<bool>) -> bool {
    *cancel_rx.borrow()
}

async fn remove_if_exists(path: &Path) {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(_) => return,
    };
    if let Err(e) = result {
        log::warn!("Failed to remove {}: {e}", path.display());
    }
}
