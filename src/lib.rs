//! net-multicom - run read-only commands across a fleet of network devices
//!
//! This crate logs into every device of an inventory over SSH, runs the same
//! list of show-style commands on each one and collects the output per device
//! and per command. It is meant for repeatable, auditable data gathering, not
//! for configuration changes.
//!
//! # Features
//!
//! - Deny-list sanitization of the command list before any device is touched
//! - Per-device-kind dialects (Cisco IOS/XE/ASA/NX-OS, Arista EOS, Junos, Linux)
//! - Enable-mode elevation where the device kind needs it, undone afterwards
//! - Per-device failure isolation: one unreachable device never aborts the run
//! - Optional bounded concurrency across devices, Ctrl-C safe
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! NET_MULTICOM_PASSWORD=secret net-multicom \
//!   --infile=inventory.yaml --outpath=./out --username=admin
//! ```

pub mod collector;
pub mod config;
pub mod credentials;
pub mod error;
pub mod inventory;
pub mod orchestrator;
pub mod output;
pub mod session;
pub mod ssh;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports for convenience
pub use collector::{DeviceOutcome, DeviceResult, FleetResult, ResultCollector};
pub use config::{Args, Config};
pub use credentials::Credentials;
pub use error::{MulticomError, Result};
pub use inventory::{DeviceDescriptor, DeviceKind, Inventory};
pub use orchestrator::FleetOrchestrator;
pub use session::{CommandResult, DeviceSession, SessionProvider, SessionState};
pub use ssh::{CommandSanitizer, SshSessionProvider, SshSettings};
