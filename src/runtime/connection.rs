//! Inbound router for the UI side of the channel.
//!
//! A background task owns the inbound half of the endpoint. Replies are
//! resolved straight into the pending call map, so awaited commands
//! complete even while the event loop is busy. Installer events are queued
//! in arrival order for the event loop to feed into the session registry.

use tokio::sync::mpsc;

use crate::protocols::channel::UiEndpoint;
use crate::protocols::messages::{InstallerEvent, WorkerMessage};
use crate::runtime::dispatcher::{CommandDispatcher, PendingCalls};

/// Item delivered to the UI event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Event(InstallerEvent),
    /// The worker side closed; nothing else will arrive.
    Disconnected,
}

/// Installer events in the order the worker emitted them.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

impl EventStream {
    /// Next inbound item. `None` once the disconnect has been delivered.
    pub async fn next(&mut self) -> Option<Inbound> {
        self.rx.recv().await
    }

    /// Next item if one is already queued.
    pub fn try_next(&mut self) -> Option<Inbound> {
        self.rx.try_recv().ok()
    }
}

/// Open a UI-side connection over `endpoint`.
///
/// Must be called inside a tokio runtime; spawns the router task.
pub fn open(endpoint: UiEndpoint) -> (CommandDispatcher, EventStream) {
    let UiEndpoint { outbound, inbound } = endpoint;
    let dispatcher = CommandDispatcher::new(outbound);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(route_inbound(inbound, dispatcher.pending_calls(), events_tx));

    (dispatcher, EventStream { rx: events_rx })
}

async fn route_inbound(
    mut inbound: mpsc::UnboundedReceiver<WorkerMessage>,
    pending: PendingCalls,
    events_tx: mpsc::UnboundedSender<Inbound>,
) {
    while let Some(message) = inbound.recv().await {
        match message {
            WorkerMessage::Reply { call_id, result } => {
                log::debug!("Reply received: call_id={call_id}");
                pending.resolve(call_id, result).await;
            }
            WorkerMessage::Event { event } => {
                log::debug!(
                    "Event received: {}, session_id={}",
                    event.name(),
                    event.session_id()
                );
                if events_tx.send(Inbound::Event(event)).is_err() {
                    log::debug!("Event stream dropped; discarding installer event");
                }
            }
        }
    }

    log::warn!("Worker channel closed");
    pending.fail_all().await;
    let _ = events_tx.send(Inbound::Disconnected);
}
