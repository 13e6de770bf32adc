//! Command Dispatcher - translates UI intent into outbound requests.
//!
//! `request_install` and `request_cancel` are fire-and-forget: their outcome
//! arrives later as installer events. Every other command is awaited through
//! a oneshot channel stored in a pending map keyed by call ID, and resolved
//! by the inbound router when the matching reply arrives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::api::types::{ApiError, InstalledVersion, SessionId, VersionList};
use crate::protocols::messages::{CallId, Command, ReplyValue, Request};

type ReplySender = oneshot::Sender<Result<ReplyValue, ApiError>>;

/// Awaited calls keyed by call ID.
///
/// Held by the inbound router. It carries no outbound sender, so the router
/// never keeps the worker's request channel open.
#[derive(Clone, Default)]
pub struct PendingCalls {
    inner: Arc<Mutex<HashMap<CallId, ReplySender>>>,
}

impl PendingCalls {
    /// Deliver a reply to its waiting caller.
    pub async fn resolve(&self, call_id: CallId, result: Result<ReplyValue, ApiError>) {
        let waiter = {
            let mut pending = self.inner.lock().await;
            pending.remove(&call_id)
        };

        match waiter {
            Some(tx) => {
                if tx.send(result).is_err() {
                    log::debug!("Reply receiver dropped: call_id={call_id}");
                }
            }
            None => log::warn!("Reply for unknown call: call_id={call_id}"),
        }
    }

    /// Resolve every waiting call with `Disconnected`.
    pub async fn fail_all(&self) {
        let drained: Vec<(CallId, ReplySender)> = {
            let mut pending = self.inner.lock().await;
            pending.drain().collect()
        };

        if !drained.is_empty() {
            log::warn!("Failing {} pending calls: worker disconnected", drained.len());
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(ApiError::Disconnected));
        }
    }

    async fn insert(&self, call_id: CallId, tx: ReplySender) {
        self.inner.lock().await.insert(call_id, tx);
    }

    async fn remove(&self, call_id: CallId) {
        self.inner.lock().await.remove(&call_id);
    }
}

/// Cloneable handle for issuing commands to the worker.
#[derive(Clone)]
pub struct CommandDispatcher {
    outbound: mpsc::UnboundedSender<Request>,
    pending: PendingCalls,
    next_call_id: Arc<AtomicU64>,
}

impl CommandDispatcher {
    pub fn new(outbound: mpsc::UnboundedSender<Request>) -> Self {
        Self {
            outbound,
            pending: PendingCalls::default(),
            next_call_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The reply side of this dispatcher, for the inbound router.
    pub fn pending_calls(&self) -> PendingCalls {
        self.pending.clone()
    }

    /// Ask the worker to start installing `tag` under session `id`.
    pub fn request_install(&self, id: &SessionId, tag: &str) -> Result<(), ApiError> {
        log::debug!("request_install: session_id={id}, tag={tag}");
        self.notify(Command::InstallVersion {
            id: id.clone(),
            tag: tag.to_string(),
        })
    }

    /// Ask the worker to cancel session `id`. Advisory only: the session ends
    /// when its terminal event arrives.
    pub fn request_cancel(&self, id: &SessionId) -> Result<(), ApiError> {
        log::debug!("request_cancel: session_id={id}");
        self.notify(Command::InstallerCancel { id: id.clone() })
    }

    pub async fn query_versions(&self) -> Result<VersionList, ApiError> {
        match self.call(Command::GetVersions).await? {
            ReplyValue::Versions(list) => Ok(list),
            other => Err(unexpected_reply("get_versions", &other)),
        }
    }

    pub async fn query_launcher_info(&self) -> Result<String, ApiError> {
        match self.call(Command::GetLauncherInfo).await? {
            ReplyValue::LauncherInfo(text) => Ok(text),
            other => Err(unexpected_reply("get_launcher_info", &other)),
        }
    }

    pub async fn query_installed_versions(&self) -> Result<Vec<InstalledVersion>, ApiError> {
        match self.call(Command::GetInstalledVersions).await? {
            ReplyValue::InstalledVersions(versions) => Ok(versions),
            other => Err(unexpected_reply("get_installed_versions", &other)),
        }
    }

    pub async fn is_installed(&self, tag: &str) -> Result<bool, ApiError> {
        let command = Command::IsVersionInstalled {
            tag: tag.to_string(),
        };
        match self.call(command).await? {
            ReplyValue::Installed(installed) => Ok(installed),
            other => Err(unexpected_reply("is_version_installed", &other)),
        }
    }

    pub async fn uninstall(&self, tag: &str) -> Result<(), ApiError> {
        let command = Command::UninstallVersion {
            tag: tag.to_string(),
        };
        match self.call(command).await? {
            ReplyValue::Done => Ok(()),
            other => Err(unexpected_reply("uninstall_version", &other)),
        }
    }

    pub async fn run(&self, tag: &str) -> Result<(), ApiError> {
        let command = Command::RunVersion {
            tag: tag.to_string(),
        };
        match self.call(command).await? {
            ReplyValue::Done => Ok(()),
            other => Err(unexpected_reply("run_version", &other)),
        }
    }

    fn notify(&self, command: Command) -> Result<(), ApiError> {
        self.outbound
            .send(Request {
                call_id: None,
                command,
            })
            .map_err(|_| ApiError::Disconnected)
    }

    async fn call(&self, command: Command) -> Result<ReplyValue, ApiError> {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let name = command.name();
        let (tx, rx) = oneshot::channel();

        self.pending.insert(call_id, tx).await;

        let request = Request {
            call_id: Some(call_id),
            command,
        };
        if self.outbound.send(request).is_err() {
            self.pending.remove(call_id).await;
            return Err(ApiError::Disconnected);
        }

        log::debug!("Command sent: {name}, call_id={call_id}");

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Disconnected),
        }
    }
}

fn unexpected_reply(command: &str, reply: &ReplyValue) -> ApiError {
    ApiError::ProtocolError {
        message: format!("Unexpected reply to {command}: {reply:?}"),
    }
}
