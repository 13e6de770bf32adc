//! Version launcher: install-session protocol between a launcher UI and a
//! privileged worker that downloads, unpacks, removes and runs versions.

pub mod api;
pub mod commands;
pub mod config;
pub mod protocols;
pub mod runtime;
pub mod versions;
