//! Install notification view-model.
//!
//! Maps each stage of an install session to the notification the view shows
//! for it. `notice_callbacks` builds an `InstallCallbacks` that publishes
//! those notices on a channel, plus a refresh request for the installed
//! versions list whenever the session ends.

use tokio::sync::mpsc;

use crate::api::types::ApiError;
use crate::runtime::selector::human_file_size;
use crate::runtime::session_registry::InstallCallbacks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    Starting,
    Downloading { downloaded: u64, total: u64 },
    Unpacking,
    Finished,
    Canceled,
    Failed(ApiError),
}

impl InstallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallStatus::Finished | InstallStatus::Canceled | InstallStatus::Failed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallNotice {
    /// `installing-<tag>`
    pub notification_id: String,
    pub title: String,
    pub message: Option<String>,
    pub loading: bool,
    /// Terminal notices close themselves; in-flight ones cannot be dismissed
    pub auto_close: bool,
    /// Whether the view offers a cancel action
    pub cancelable: bool,
}

pub fn notice_for(tag: &str, name: &str, status: &InstallStatus) -> InstallNotice {
    let notification_id = format!("installing-{tag}");
    let (title, message, cancelable) = match status {
        InstallStatus::Starting => (
            format!("Installing {name}"),
            Some("Starting...".to_string()),
            false,
        ),
        InstallStatus::Downloading { downloaded, total } => (
            format!("Installing {name}"),
            Some(format!(
                "Downloaded {} / {}",
                human_file_size(*downloaded, true, 2),
                human_file_size(*total, true, 2)
            )),
            true,
        ),
        InstallStatus::Unpacking => (
            format!("Installing {name}"),
            Some("Unpacking...".to_string()),
            false,
        ),
        InstallStatus::Finished => (format!("Finished installing {name}"), None, false),
        InstallStatus::Canceled => (format!("Canceled {name}"), None, false),
        InstallStatus::Failed(error) => (
            format!("Error installing {name}"),
            Some(error.to_string()),
            false,
        ),
    };

    let terminal = status.is_terminal();
    InstallNotice {
        notification_id,
        title,
        message,
        loading: !terminal,
        auto_close: terminal,
        cancelable,
    }
}

/// Update published to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    Notice(InstallNotice),
    /// The installed versions list may have changed
    RefreshInstalled,
}

/// Build callbacks that publish notices for one install of `tag`.
///
/// The `Starting` notice is published immediately.
pub fn notice_callbacks(
    tag: &str,
    name: &str,
    updates: mpsc::UnboundedSender<ViewUpdate>,
) -> InstallCallbacks {
    let publisher = NoticePublisher {
        tag: tag.to_string(),
        name: name.to_string(),
        updates,
    };
    publisher.publish(&InstallStatus::Starting);

    let on_progress = publisher.clone();
    let on_unpacking = publisher.clone();
    let on_finish = publisher.clone();
    let on_error = publisher.clone();
    let on_cancel = publisher;

    InstallCallbacks {
        on_progress: Box::new(move |downloaded, total| {
            on_progress.publish(&InstallStatus::Downloading { downloaded, total })
        }),
        on_unpacking: Box::new(move || on_unpacking.publish(&InstallStatus::Unpacking)),
        on_finish: Box::new(move || on_finish.finish(InstallStatus::Finished)),
        on_error: Box::new(move |error| on_error.finish(InstallStatus::Failed(error))),
        on_cancel: Box::new(move || on_cancel.finish(InstallStatus::Canceled)),
    }
}

#[derive(Clone)]
struct NoticePublisher {
    tag: String,
    name: String,
    updates: mpsc::UnboundedSender<ViewUpdate>,
}

impl NoticePublisher {
    fn publish(&self, status: &InstallStatus) {
        let notice = notice_for(&self.tag, &self.name, status);
        if self.updates.send(ViewUpdate::Notice(notice)).is_err() {
            log::debug!("View update receiver dropped: tag={}", self.tag);
        }
    }

    fn finish(&self, status: InstallStatus) {
        self.publish(&status);
        let _ = self.updates.send(ViewUpdate::RefreshInstalled);
    }
}
