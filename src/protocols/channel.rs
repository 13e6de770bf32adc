//! In-process bidirectional channel between the UI side and the worker side.
//!
//! Each direction is an unbounded tokio mpsc queue, so per-direction ordering
//! is preserved and sending never suspends the caller's event loop.

use tokio::sync::mpsc;

use crate::protocols::messages::{Request, WorkerMessage};

/// UI-process end: sends requests, receives replies and events.
pub struct UiEndpoint {
    pub outbound: mpsc::UnboundedSender<Request>,
    pub inbound: mpsc::UnboundedReceiver<WorkerMessage>,
}

/// Worker-process end: receives requests, sends replies and events.
pub struct WorkerEndpoint {
    pub inbound: mpsc::UnboundedReceiver<Request>,
    pub outbound: mpsc::UnboundedSender<WorkerMessage>,
}

/// Create a connected endpoint pair.
pub fn pair() -> (UiEndpoint, WorkerEndpoint) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = mpsc::unbounded_channel();

    (
        UiEndpoint {
            outbound: request_tx,
            inbound: message_rx,
        },
        WorkerEndpoint {
            inbound: request_rx,
            outbound: message_tx,
        },
    )
}
