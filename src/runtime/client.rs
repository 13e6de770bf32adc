//! LauncherClient - composition root for the UI side.
//!
//! Owns the session registry and the inbound event stream, and drives the
//! single cooperative event loop: each `pump` handles one inbound item or
//! one throttle deadline, never blocking on the worker.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use crate::api::types::{ApiError, SessionId, VersionTag};
use crate::config::ClientConfig;
use crate::protocols::channel::UiEndpoint;
use crate::runtime::connection::{self, EventStream, Inbound};
use crate::runtime::dispatcher::CommandDispatcher;
use crate::runtime::session_registry::{CancelHandle, InstallCallbacks, SessionRegistry};

pub struct LauncherClient {
    dispatcher: CommandDispatcher,
    registry: SessionRegistry,
    events: EventStream,
    disconnected: bool,
}

impl LauncherClient {
    /// Connect over `endpoint`. Must be called inside a tokio runtime.
    pub fn connect(endpoint: UiEndpoint, config: &ClientConfig) -> Self {
        let (dispatcher, events) = connection::open(endpoint);
        let registry = SessionRegistry::new(dispatcher.clone(), config.progress_interval());
        log::debug!(
            "Launcher client connected: progress_interval_ms={}",
            config.progress_interval_ms
        );

        Self {
            dispatcher,
            registry,
            events,
            disconnected: false,
        }
    }

    /// Handle for awaited commands (versions, launcher info, uninstall, run).
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn install(
        &mut self,
        tag: impl Into<VersionTag>,
        callbacks: InstallCallbacks,
    ) -> (SessionId, CancelHandle) {
        self.registry.create(tag, callbacks)
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Process one inbound item or one due progress flush.
    ///
    /// Returns `false` once the worker has disconnected and nothing is left
    /// to deliver.
    pub async fn pump(&mut self) -> bool {
        if self.disconnected {
            return false;
        }

        let deadline = self.registry.next_flush_deadline();
        let flush_timer = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            inbound = self.events.next() => {
                match inbound {
                    Some(Inbound::Event(event)) => self.registry.dispatch_event(event),
                    Some(Inbound::Disconnected) | None => self.handle_disconnect(),
                }
            }
            _ = flush_timer => self.registry.flush_due(Instant::now()),
        }

        !self.disconnected
    }

    /// Drain everything that is already queued without waiting.
    pub fn pump_ready(&mut self) {
        while !self.disconnected {
            match self.events.try_next() {
                Some(Inbound::Event(event)) => self.registry.dispatch_event(event),
                Some(Inbound::Disconnected) => self.handle_disconnect(),
                None => break,
            }
        }
        self.registry.flush_due(Instant::now());
    }

    /// Pump until every open session has reached its terminal event.
    pub async fn run_until_idle(&mut self) {
        while !self.registry.is_empty() && self.pump().await {}
    }

    /// Like `run_until_idle`, giving up after `limit`.
    pub async fn run_until_idle_for(&mut self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.run_until_idle()).await.is_ok()
    }

    fn handle_disconnect(&mut self) {
        log::warn!("Worker disconnected; failing open install sessions");
        self.disconnected = true;
        self.registry.fail_all(ApiError::Disconnected);
    }
}
