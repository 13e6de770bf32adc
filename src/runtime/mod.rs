//! UI-side runtime for install sessions.
//!
//! The runtime domain owns the product-level concepts of the launcher UI:
//! install sessions with their callbacks, throttled progress, the version
//! selector and the notice view-model. It talks to the worker only through
//! the command dispatcher and the inbound event stream.

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod notice;
pub mod selector;
pub mod session_registry;
pub mod throttle;

pub use client::LauncherClient;
pub use session_registry::{CancelHandle, InstallCallbacks};
