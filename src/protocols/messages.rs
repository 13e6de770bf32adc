//! Message contract between the UI process and the privileged worker.
//!
//! Outbound: `Request` wrapping a `Command`. Awaited commands carry a
//! `call_id` and are answered by exactly one `Reply`; fire-and-forget
//! commands (`install_version`, `installer_cancel`) carry none and are
//! acknowledged only through `InstallerEvent`s tagged with the session ID.

use serde::{Deserialize, Serialize};

use crate::api::types::{ApiError, InstalledVersion, SessionId, VersionList, VersionTag};

/// Channel names, as seen on the wire.
pub const CMD_GET_VERSIONS: &str = "get_versions";
pub const CMD_GET_LAUNCHER_INFO: &str = "get_launcher_info";
pub const CMD_INSTALL_VERSION: &str = "install_version";
pub const CMD_INSTALLER_CANCEL: &str = "installer_cancel";
pub const CMD_IS_VERSION_INSTALLED: &str = "is_version_installed";
pub const CMD_GET_INSTALLED_VERSIONS: &str = "get_installed_versions";
pub const CMD_UNINSTALL_VERSION: &str = "uninstall_version";
pub const CMD_RUN_VERSION: &str = "run_version";

pub const EVENT_INSTALLER_PROGRESS: &str = "installer_progress";
pub const EVENT_INSTALLER_UNPACKING: &str = "installer_unpacking";
pub const EVENT_INSTALLER_FINISH: &str = "installer_finish";
pub const EVENT_INSTALLER_CANCELED: &str = "installer_canceled";
pub const EVENT_INSTALLER_ERROR: &str = "installer_error";

/// Correlation key for awaited commands.
pub type CallId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Command {
    GetVersions,
    GetLauncherInfo,
    InstallVersion { id: SessionId, tag: VersionTag },
    InstallerCancel { id: SessionId },
    IsVersionInstalled { tag: VersionTag },
    GetInstalledVersions,
    UninstallVersion { tag: VersionTag },
    RunVersion { tag: VersionTag },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetVersions => CMD_GET_VERSIONS,
            Command::GetLauncherInfo => CMD_GET_LAUNCHER_INFO,
            Command::InstallVersion { .. } => CMD_INSTALL_VERSION,
            Command::InstallerCancel { .. } => CMD_INSTALLER_CANCEL,
            Command::IsVersionInstalled { .. } => CMD_IS_VERSION_INSTALLED,
            Command::GetInstalledVersions => CMD_GET_INSTALLED_VERSIONS,
            Command::UninstallVersion { .. } => CMD_UNINSTALL_VERSION,
            Command::RunVersion { .. } => CMD_RUN_VERSION,
        }
    }

    /// Whether the command is answered through the event stream only.
    pub fn is_fire_and_forget(&self) -> bool {
        matches!(
            self,
            Command::InstallVersion { .. } | Command::InstallerCancel { .. }
        )
    }
}

/// UI → worker envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    pub command: Command,
}

/// Successful result of an awaited command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReplyValue {
    Versions(VersionList),
    LauncherInfo(String),
    Installed(bool),
    InstalledVersions(Vec<InstalledVersion>),
    Done,
}

/// Lifecycle event of one install session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum InstallerEvent {
    #[serde(rename = "installer_progress")]
    Progress {
        id: SessionId,
        downloaded: u64,
        total: u64,
    },
    #[serde(rename = "installer_unpacking")]
    Unpacking { id: SessionId },
    #[serde(rename = "installer_finish")]
    Finish { id: SessionId },
    #[serde(rename = "installer_canceled")]
    Canceled { id: SessionId },
    #[serde(rename = "installer_error")]
    Error { id: SessionId, error: ApiError },
}

impl InstallerEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            InstallerEvent::Progress { id, .. }
            | InstallerEvent::Unpacking { id }
            | InstallerEvent::Finish { id }
            | InstallerEvent::Canceled { id }
            | InstallerEvent::Error { id, .. } => id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InstallerEvent::Progress { .. } => EVENT_INSTALLER_PROGRESS,
            InstallerEvent::Unpacking { .. } => EVENT_INSTALLER_UNPACKING,
            InstallerEvent::Finish { .. } => EVENT_INSTALLER_FINISH,
            InstallerEvent::Canceled { .. } => EVENT_INSTALLER_CANCELED,
            InstallerEvent::Error { .. } => EVENT_INSTALLER_ERROR,
        }
    }

    /// Finish, cancel and error end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallerEvent::Finish { .. }
                | InstallerEvent::Canceled { .. }
                | InstallerEvent::Error { .. }
        )
    }
}

/// Worker → UI envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Reply {
        call_id: CallId,
        result: Result<ReplyValue, ApiError>,
    },
    Event {
        #[serde(flatten)]
        event: InstallerEvent,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_command_wire_shape() {
        let request = Request {
            call_id: None,
            command: Command::InstallVersion {
                id: "abc".to_string(),
                tag: "v1.2".to_string(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("call_id").is_none());
        assert_eq!(json["command"]["method"], CMD_INSTALL_VERSION);
        assert_eq!(json["command"]["id"], "abc");
        assert_eq!(json["command"]["tag"], "v1.2");
        assert!(request.command.is_fire_and_forget());
    }

    #[test]
    fn test_event_message_wire_shape() {
        let message = WorkerMessage::Event {
            event: InstallerEvent::Progress {
                id: "abc".to_string(),
                downloaded: 50,
                total: 100,
            },
        };
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "event");
        assert_eq!(json["event"], EVENT_INSTALLER_PROGRESS);
        assert_eq!(json["downloaded"], 50);

        let parsed: WorkerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_reply_carries_error() {
        let message = WorkerMessage::Reply {
            call_id: 7,
            result: Err(ApiError::VersionNotInstalled {
                tag: "v1.0".to_string(),
            }),
        };
        let line = serde_json::to_string(&message).unwrap();
        let parsed: WorkerMessage = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed, message);
    }

    #[test]
    fn test_terminal_classification() {
        let id = "s".to_string();
        assert!(!InstallerEvent::Unpacking { id: id.clone() }.is_terminal());
        assert!(InstallerEvent::Canceled { id: id.clone() }.is_terminal());
        assert!(InstallerEvent::Error {
            id,
            error: ApiError::Disconnected
        }
        .is_terminal());
    }
}
