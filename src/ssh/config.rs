//! SSH configuration types
//!
//! Run-wide defaults ([`SshSettings`]) and the resolved per-device
//! connection parameters ([`SshConfig`]).

use std::time::Duration;

use crate::inventory::{DeviceDescriptor, DeviceKind};

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Connection (TCP + handshake + auth) timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Per-command timeout in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Prompt probe / elevation timeout in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Run-wide SSH defaults shared by every device
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub port: u16,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }
}

impl SshSettings {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// Connection parameters for one device
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote hostname or IP address
    pub host: String,

    pub port: u16,

    pub kind: DeviceKind,

    pub connect_timeout: Duration,

    pub command_timeout: Duration,

    pub probe_timeout: Duration,
}

impl SshConfig {
    /// Resolve a device against the run defaults
    pub fn for_device(device: &DeviceDescriptor, settings: &SshSettings) -> Self {
        Self {
            host: device.host.clone(),
            port: device.port.unwrap_or(settings.port),
            kind: device.kind,
            connect_timeout: settings.connect_timeout,
            command_timeout: settings.command_timeout,
            probe_timeout: settings.probe_timeout,
        }
    }

    /// `host:port` address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
