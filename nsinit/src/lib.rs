//! Container init: turns a freshly cloned process into the container command
//! and attaches it to its networks.

#![deny(missing_docs)]
#![deny(
    clippy::all,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::unwrap_used
)]

/// Common types.
pub mod common;

/// Init and network configuration.
pub mod config;

/// The init sequence executed inside the container process.
pub mod init;

/// Network strategies and their registry.
pub mod network;

/// Kernel access.
pub mod sys;
