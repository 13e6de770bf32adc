//! Version management domain (privileged worker side).
//!
//! Handles the installed-version store, version sources, downloads with
//! cancellation, archive extraction and launching installed versions.
//! Versions are stored in `install_dir/<tag>/`.

pub mod installer;
pub mod launch;
pub mod manager;
pub mod source;
pub mod unpack;
