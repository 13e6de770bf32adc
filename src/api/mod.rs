//! API types for the UI-worker bridge.
//!
//! This module defines stable types for commands and events,
//! shared verbatim by both processes.

pub mod types;
