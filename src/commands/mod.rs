//! Worker command handlers organized by domain.
//!
//! `serve` is the privileged side's command loop: it reads requests from a
//! worker endpoint, runs each handler on its own task, and answers awaited
//! commands with exactly one reply. Install and cancel are answered only
//! through installer events.

pub mod installer;
pub mod versions;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::types::ApiError;
use crate::protocols::channel::WorkerEndpoint;
use crate::protocols::messages::{CallId, Command, ReplyValue, Request, WorkerMessage};
use crate::versions::installer::VersionInstaller;
use crate::versions::manager::VersionManager;
use crate::versions::source::VersionSource;

/// Time given to running installs to clean up after the UI disconnects.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Services the command handlers operate on.
pub struct WorkerState {
    pub manager: Arc<VersionManager>,
    pub source: Arc<dyn VersionSource>,
    pub installer: Arc<VersionInstaller>,
    /// Program to start, relative to the version directory
    pub executable: String,
}

impl WorkerState {
    pub fn new(
        manager: Arc<VersionManager>,
        source: Arc<dyn VersionSource>,
        executable: String,
        events: mpsc::UnboundedSender<WorkerMessage>,
    ) -> Self {
        let installer = Arc::new(VersionInstaller::new(
            manager.clone(),
            source.clone(),
            events,
        ));
        Self {
            manager,
            source,
            installer,
            executable,
        }
    }
}

/// Serve commands until the UI side closes the channel.
pub async fn serve(
    endpoint: WorkerEndpoint,
    manager: Arc<VersionManager>,
    source: Arc<dyn VersionSource>,
    executable: String,
) {
    let WorkerEndpoint {
        mut inbound,
        outbound,
    } = endpoint;
    let state = Arc::new(WorkerState::new(
        manager,
        source,
        executable,
        outbound.clone(),
    ));

    log::info!("Worker serving commands");

    while let Some(request) = inbound.recv().await {
        handle_request(&state, &outbound, request).await;
    }

    log::info!("UI channel closed; stopping worker");
    state.installer.cancel_all().await;
    if !state.installer.wait_idle(SHUTDOWN_GRACE).await {
        log::warn!("Installs still running at shutdown");
    }
}

async fn handle_request(
    state: &Arc<WorkerState>,
    outbound: &mpsc::UnboundedSender<WorkerMessage>,
    request: Request,
) {
    let Request { call_id, command } = request;
    log::debug!("Command received: {}, call_id={call_id:?}", command.name());

    if command.is_fire_and_forget() {
        // Handled inline so installs and cancels keep their arrival order.
        match command {
            Command::InstallVersion { id, tag } => {
                installer::install_version(state, id, tag).await;
            }
            Command::InstallerCancel { id } => installer::installer_cancel(state, id).await,
            _ => {}
        }
        if let Some(call_id) = call_id {
            send_reply(outbound, call_id, Ok(ReplyValue::Done));
        }
        return;
    }

    let state = Arc::clone(state);
    let outbound = outbound.clone();
    tokio::spawn(async move {
        let name = command.name();
        let result = run_command(&state, command).await;
        match call_id {
            Some(call_id) => send_reply(&outbound, call_id, result),
            None => {
                if let Err(e) = result {
                    log::warn!("Unanswered command {name} failed: {e}");
                }
            }
        }
    });
}

async fn run_command(state: &WorkerState, command: Command) -> Result<ReplyValue, ApiError> {
    match command {
        Command::GetVersions => versions::get_versions(state).await.map(ReplyValue::Versions),
        Command::GetLauncherInfo => versions::get_launcher_info(state)
            .await
            .map(ReplyValue::LauncherInfo),
        Command::IsVersionInstalled { tag } => versions::is_version_installed(state, tag)
            .await
            .map(ReplyValue::Installed),
        Command::GetInstalledVersions => versions::get_installed_versions(state)
            .await
            .map(ReplyValue::InstalledVersions),
        Command::UninstallVersion { tag } => versions::uninstall_version(state, tag)
            .await
            .map(|()| ReplyValue::Done),
        Command::RunVersion { tag } => versions::run_version(state, tag)
            .await
            .map(|()| ReplyValue::Done),
        Command::InstallVersion { .. } | Command::InstallerCancel { .. } => {
            Err(ApiError::ProtocolError {
                message: format!("{} has no reply", command.name()),
            })
        }
    }
}

fn send_reply(
    outbound: &mpsc::UnboundedSender<WorkerMessage>,
    call_id: CallId,
    result: Result<ReplyValue, ApiError>,
) {
    if outbound
        .send(WorkerMessage::Reply { call_id, result })
        .is_err()
    {
        log::warn!("Failed to send reply: call_id={call_id}, UI channel closed");
    }
}
