//! SSH transport for network devices
//!
//! This module provides the russh-backed session provider, per-device-kind
//! dialects (enable mode, prompts, paging) and the command-list sanitizer.

pub mod command;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod handler;
pub mod sanitize;

// Re-exports
pub use command::{ShellChannel, ShellTransport};
pub use config::{SshConfig, SshSettings};
pub use connection::{SshDeviceSession, SshSessionProvider};
pub use dialect::{Dialect, Elevation};
pub use handler::SshHandler;
pub use sanitize::{CommandSanitizer, DEFAULT_DENY_LIST};
