//! Protocol layer between the UI process and the privileged worker.
//!
//! This module provides:
//! - `messages`: command, reply and installer event types (the wire format)
//! - `channel`: the in-process bidirectional channel and its two endpoints
//! - `stdio`: line-delimited JSON bridges over a child process's stdio
//!
//! The protocol layer does NOT hold session state. Sessions and callbacks
//! live in the runtime layer; installs live in the worker.

pub mod channel;
pub mod messages;
pub mod stdio;
