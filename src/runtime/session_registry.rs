//! Session Registry - owns the mapping from session ID to callback set.
//!
//! The registry is a plain owned component: it lives inside the UI's single
//! event loop and is mutated only through `&mut self`, so every event is
//! handled atomically with respect to other events. Each session reaches
//! exactly one terminal callback, after which its entry is removed and any
//! later event for that ID is dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::api::types::{ApiError, SessionId, VersionTag};
use crate::protocols::messages::InstallerEvent;
use crate::runtime::dispatcher::CommandDispatcher;
use crate::runtime::throttle::{Progress, ProgressThrottle};

/// Caller-supplied handlers for one install session.
///
/// Terminal handlers are `FnOnce`: at most one of them is ever invoked.
pub struct InstallCallbacks {
    pub on_progress: Box<dyn FnMut(u64, u64) + Send>,
    pub on_unpacking: Box<dyn FnMut() + Send>,
    pub on_finish: Box<dyn FnOnce() + Send>,
    pub on_error: Box<dyn FnOnce(ApiError) + Send>,
    pub on_cancel: Box<dyn FnOnce() + Send>,
}

/// Handle returned by `create`; cancels the session it was issued for.
#[derive(Clone)]
pub struct CancelHandle {
    id: SessionId,
    dispatcher: CommandDispatcher,
}

impl CancelHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    /// Request cancellation. The session stays active until a terminal
    /// event arrives, which may still be `finish` or `error`.
    pub fn cancel(&self) -> Result<(), ApiError> {
        log::info!("Install cancel requested: session_id={}", self.id);
        self.dispatcher.request_cancel(&self.id)
    }
}

struct Session {
    tag: VersionTag,
    callbacks: InstallCallbacks,
    throttle: ProgressThrottle,
    last_downloaded: u64,
}

impl Session {
    fn forward_progress(&mut self, progress: Progress) {
        (self.callbacks.on_progress)(progress.downloaded, progress.total);
    }

    fn flush_progress(&mut self, now: Instant) {
        if let Some(progress) = self.throttle.flush(now) {
            self.forward_progress(progress);
        }
    }
}

pub struct SessionRegistry {
    dispatcher: CommandDispatcher,
    sessions: HashMap<SessionId, Session>,
    progress_interval: Duration,
}

impl SessionRegistry {
    pub fn new(dispatcher: CommandDispatcher, progress_interval: Duration) -> Self {
        Self {
            dispatcher,
            sessions: HashMap::new(),
            progress_interval,
        }
    }

    /// Start an install session for `tag`.
    ///
    /// Allocates a fresh session ID, stores the callbacks and sends the start
    /// command. If the command cannot be sent the session fails right away
    /// with `Disconnected` and is never registered.
    pub fn create(
        &mut self,
        tag: impl Into<VersionTag>,
        callbacks: InstallCallbacks,
    ) -> (SessionId, CancelHandle) {
        let tag = tag.into();
        let mut id = Uuid::new_v4().to_string();
        while self.sessions.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let handle = CancelHandle {
            id: id.clone(),
            dispatcher: self.dispatcher.clone(),
        };

        if let Err(e) = self.dispatcher.request_install(&id, &tag) {
            log::warn!("Failed to send install command: session_id={id}, tag={tag}, error={e}");
            (callbacks.on_error)(e);
            return (id, handle);
        }

        log::info!("Install session created: session_id={id}, tag={tag}");
        self.sessions.insert(
            id.clone(),
            Session {
                tag,
                callbacks,
                throttle: ProgressThrottle::new(self.progress_interval),
                last_downloaded: 0,
            },
        );

        (id, handle)
    }

    pub fn dispatch_event(&mut self, event: InstallerEvent) {
        self.dispatch_event_at(event, Instant::now());
    }

    /// Route one inbound event to its session, using `now` for throttling.
    ///
    /// Events for unknown or retired sessions are dropped.
    pub fn dispatch_event_at(&mut self, event: InstallerEvent, now: Instant) {
        let id = event.session_id().clone();

        if event.is_terminal() {
            let Some(mut session) = self.sessions.remove(&id) else {
                log::debug!("Dropping {} for unknown session: session_id={id}", event.name());
                return;
            };
            session.flush_progress(now);

            log::info!(
                "Install session ended: session_id={id}, tag={}, outcome={}",
                session.tag,
                event.name()
            );
            match event {
                InstallerEvent::Finish { .. } => (session.callbacks.on_finish)(),
                InstallerEvent::Canceled { .. } => (session.callbacks.on_cancel)(),
                InstallerEvent::Error { error, .. } => (session.callbacks.on_error)(error),
                InstallerEvent::Progress { .. } | InstallerEvent::Unpacking { .. } => {}
            }
            return;
        }

        let Some(session) = self.sessions.get_mut(&id) else {
            log::debug!("Dropping {} for unknown session: session_id={id}", event.name());
            return;
        };

        match event {
            InstallerEvent::Progress {
                downloaded, total, ..
            } => {
                if downloaded < session.last_downloaded {
                    log::debug!(
                        "Progress went backwards: session_id={id}, previous={}, downloaded={downloaded}",
                        session.last_downloaded
                    );
                }
                session.last_downloaded = downloaded;

                if let Some(progress) = session.throttle.offer(Progress { downloaded, total }, now) {
                    session.forward_progress(progress);
                }
            }
            InstallerEvent::Unpacking { .. } => {
                session.flush_progress(now);
                (session.callbacks.on_unpacking)();
            }
            InstallerEvent::Finish { .. }
            | InstallerEvent::Canceled { .. }
            | InstallerEvent::Error { .. } => {}
        }
    }

    /// Deliver held progress values whose suppression window has elapsed.
    pub fn flush_due(&mut self, now: Instant) {
        for session in self.sessions.values_mut() {
            if let Some(progress) = session.throttle.poll(now) {
                session.forward_progress(progress);
            }
        }
    }

    /// Earliest instant at which `flush_due` has something to deliver.
    pub fn next_flush_deadline(&self) -> Option<Instant> {
        self.sessions
            .values()
            .filter_map(|session| session.throttle.deadline())
            .min()
    }

    /// Fail and retire every open session, e.g. when the worker goes away.
    pub fn fail_all(&mut self, error: ApiError) {
        let now = Instant::now();
        let drained: Vec<(SessionId, Session)> = self.sessions.drain().collect();
        if !drained.is_empty() {
            log::warn!("Failing {} open install sessions: {error}", drained.len());
        }
        for (id, mut session) in drained {
            log::debug!("Install session failed: session_id={id}, tag={}", session.tag);
            session.flush_progress(now);
            (session.callbacks.on_error)(error.clone());
        }
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn tag_of(&self, id: &str) -> Option<&str> {
        self.sessions.get(id).map(|session| session.tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    use crate::protocols::messages::{Command, Request};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Progress(u64, u64),
        Unpacking,
        Finish,
        Error(ApiError),
        Cancel,
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    fn recording_callbacks() -> (InstallCallbacks, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let (p, u, f, e, c) = (
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
        );
        let callbacks = InstallCallbacks {
            on_progress: Box::new(move |d, t| p.lock().unwrap().push(Call::Progress(d, t))),
            on_unpacking: Box::new(move || u.lock().unwrap().push(Call::Unpacking)),
            on_finish: Box::new(move || f.lock().unwrap().push(Call::Finish)),
            on_error: Box::new(move |err| e.lock().unwrap().push(Call::Error(err))),
            on_cancel: Box::new(move || c.lock().unwrap().push(Call::Cancel)),
        };
        (callbacks, log)
    }

    fn registry(interval: Duration) -> (SessionRegistry, mpsc::UnboundedReceiver<Request>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionRegistry::new(CommandDispatcher::new(tx), interval), rx)
    }

    fn calls(log: &Log) -> Vec<Call> {
        log.lock().unwrap().clone()
    }

    fn progress(id: &str, downloaded: u64, total: u64) -> InstallerEvent {
        InstallerEvent::Progress {
            id: id.to_string(),
            downloaded,
            total,
        }
    }

    fn finish(id: &str) -> InstallerEvent {
        InstallerEvent::Finish { id: id.to_string() }
    }

    #[tokio::test]
    async fn test_create_sends_install_command() {
        let (mut registry, mut rx) = registry(Duration::ZERO);
        let (callbacks, _) = recording_callbacks();

        let (id, handle) = registry.create("v1.2", callbacks);

        assert_eq!(handle.session_id(), &id);
        assert!(registry.is_active(&id));
        assert_eq!(registry.tag_of(&id), Some("v1.2"));
        let request = rx.recv().await.unwrap();
        assert_eq!(
            request.command,
            Command::InstallVersion {
                id: id.clone(),
                tag: "v1.2".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_progress_then_finish_retires_session() {
        let (mut registry, _rx) = registry(Duration::ZERO);
        let (callbacks, log) = recording_callbacks();
        let (id, _) = registry.create("v1.2", callbacks);

        registry.dispatch_event(progress(&id, 50, 100));
        assert_eq!(calls(&log), vec![Call::Progress(50, 100)]);

        registry.dispatch_event(finish(&id));
        assert_eq!(calls(&log), vec![Call::Progress(50, 100), Call::Finish]);
        assert!(!registry.is_active(&id));
        assert!(registry.is_empty());

        registry.dispatch_event(progress(&id, 60, 100));
        registry.dispatch_event(finish(&id));
        assert_eq!(calls(&log).len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_session_is_ignored() {
        let (mut registry, _rx) = registry(Duration::ZERO);
        let (callbacks, log) = recording_callbacks();
        registry.create("v1.0", callbacks);

        registry.dispatch_event(progress("nope", 1, 2));
        registry.dispatch_event(InstallerEvent::Error {
            id: "nope".to_string(),
            error: ApiError::Disconnected,
        });

        assert!(calls(&log).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_interleaved_sessions_are_demultiplexed() {
        let (mut registry, _rx) = registry(Duration::ZERO);
        let (cb_a, log_a) = recording_callbacks();
        let (cb_b, log_b) = recording_callbacks();
        let (a, _) = registry.create("v1.0", cb_a);
        let (b, _) = registry.create("v2.0", cb_b);
        assert_ne!(a, b);

        registry.dispatch_event(progress(&b, 5, 10));
        registry.dispatch_event(progress(&a, 1, 10));
        registry.dispatch_event(finish(&b));
        registry.dispatch_event(finish(&a));

        assert_eq!(calls(&log_a), vec![Call::Progress(1, 10), Call::Finish]);
        assert_eq!(calls(&log_b), vec![Call::Progress(5, 10), Call::Finish]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_race_first_terminal_wins() {
        let (mut registry, mut rx) = registry(Duration::ZERO);
        let (callbacks, log) = recording_callbacks();
        let (id, handle) = registry.create("v1.0", callbacks);

        handle.cancel().unwrap();
        let _install = rx.recv().await.unwrap();
        let cancel = rx.recv().await.unwrap();
        assert_eq!(cancel.command, Command::InstallerCancel { id: id.clone() });
        assert!(registry.is_active(&id));

        registry.dispatch_event(finish(&id));
        registry.dispatch_event(InstallerEvent::Canceled { id: id.clone() });

        assert_eq!(calls(&log), vec![Call::Finish]);
        assert!(!registry.is_active(&id));
    }

    #[tokio::test]
    async fn test_error_is_passed_verbatim() {
        let (mut registry, _rx) = registry(Duration::ZERO);
        let (callbacks, log) = recording_callbacks();
        let (id, _) = registry.create("v1.0", callbacks);
        let error = ApiError::NetworkError {
            message: "connection reset".to_string(),
        };

        registry.dispatch_event(InstallerEvent::Error {
            id: id.clone(),
            error: error.clone(),
        });

        assert_eq!(calls(&log), vec![Call::Error(error)]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_burst_is_throttled_and_flushed_on_finish() {
        let (mut registry, _rx) = registry(Duration::from_millis(150));
        let (callbacks, log) = recording_callbacks();
        let (id, _) = registry.create("v1.0", callbacks);
        let start = Instant::now();

        for i in 1..=20u64 {
            registry.dispatch_event_at(progress(&id, i * 5, 100), start + Duration::from_millis(i));
        }
        registry.dispatch_event_at(finish(&id), start + Duration::from_millis(30));

        let calls = calls(&log);
        let progress_calls: Vec<&Call> = calls
            .iter()
            .filter(|c| matches!(c, Call::Progress(..)))
            .collect();
        assert!(progress_calls.len() < 20);
        assert_eq!(calls[calls.len() - 2], Call::Progress(100, 100));
        assert_eq!(calls[calls.len() - 1], Call::Finish);
    }

    #[tokio::test]
    async fn test_unpacking_flushes_held_progress() {
        let (mut registry, _rx) = registry(Duration::from_millis(150));
        let (callbacks, log) = recording_callbacks();
        let (id, _) = registry.create("v1.0", callbacks);
        let start = Instant::now();

        registry.dispatch_event_at(progress(&id, 10, 100), start);
        registry.dispatch_event_at(progress(&id, 100, 100), start + Duration::from_millis(5));
        registry.dispatch_event_at(
            InstallerEvent::Unpacking { id: id.clone() },
            start + Duration::from_millis(6),
        );
        registry.dispatch_event_at(
            InstallerEvent::Unpacking { id: id.clone() },
            start + Duration::from_millis(7),
        );

        assert_eq!(
            calls(&log),
            vec![
                Call::Progress(10, 100),
                Call::Progress(100, 100),
                Call::Unpacking,
                Call::Unpacking
            ]
        );
    }

    #[tokio::test]
    async fn test_flush_due_delivers_trailing_value() {
        let (mut registry, _rx) = registry(Duration::from_millis(100));
        let (callbacks, log) = recording_callbacks();
        let (id, _) = registry.create("v1.0", callbacks);
        let start = Instant::now();

        registry.dispatch_event_at(progress(&id, 1, 10), start);
        registry.dispatch_event_at(progress(&id, 2, 10), start + Duration::from_millis(10));
        assert_eq!(
            registry.next_flush_deadline(),
            Some(start + Duration::from_millis(100))
        );

        registry.flush_due(start + Duration::from_millis(50));
        assert_eq!(calls(&log).len(), 1);

        registry.flush_due(start + Duration::from_millis(100));
        assert_eq!(calls(&log), vec![Call::Progress(1, 10), Call::Progress(2, 10)]);
        assert!(registry.next_flush_deadline().is_none());
    }

    #[tokio::test]
    async fn test_fail_all_errors_every_session() {
        let (mut registry, _rx) = registry(Duration::ZERO);
        let (cb_a, log_a) = recording_callbacks();
        let (cb_b, log_b) = recording_callbacks();
        registry.create("v1.0", cb_a);
        registry.create("v2.0", cb_b);

        registry.fail_all(ApiError::Disconnected);

        assert_eq!(calls(&log_a), vec![Call::Error(ApiError::Disconnected)]);
        assert_eq!(calls(&log_b), vec![Call::Error(ApiError::Disconnected)]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_create_on_closed_channel_fails_immediately() {
        let (mut registry, rx) = registry(Duration::ZERO);
        drop(rx);
        let (callbacks, log) = recording_callbacks();

        let (id, _) = registry.create("v1.0", callbacks);

        assert_eq!(calls(&log), vec![Call::Error(ApiError::Disconnected)]);
        assert!(!registry.is_active(&id));
    }
}
