//! Install session commands.
//!
//! Neither command has a reply; the outcome of an install is reported
//! through installer events carrying the session id.

use std::sync::Arc;

use crate::api::types::{SessionId, VersionTag};
use crate::commands::WorkerState;

/// Start installing `tag` under the UI-chosen session `id`.
pub async fn install_version(state: &Arc<WorkerState>, id: SessionId, tag: VersionTag) {
    log::info!("install_version called: id={id}, tag={tag}");
    state.installer.start_install(id, tag).await;
}

/// Request cancellation of session `id`. Unknown ids are ignored.
pub async fn installer_cancel(state: &Arc<WorkerState>, id: SessionId) {
    log::info!("installer_cancel called: id={id}");
    state.installer.cancel(&id).await;
}
