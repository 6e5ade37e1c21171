//! Fleet result aggregation
//!
//! [`ResultCollector`] reserves one slot per inventory entry before any
//! device is processed. Each device's task fills exactly its own slot, so the
//! finished [`FleetResult`] is in inventory order no matter in which order
//! devices complete.

use serde::{Deserialize, Serialize};

use crate::inventory::DeviceDescriptor;
use crate::session::CommandResult;

/// How processing of one device ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOutcome {
    Success,
    ConnectionFailed,
    LivenessFailed,
    ElevationFailed,
    /// The run was cancelled before this device was started
    Cancelled,
    /// Processing of the device panicked; its results are lost
    Aborted,
}

impl DeviceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeviceOutcome::Success)
    }
}

/// Result for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResult {
    pub device: DeviceDescriptor,
    pub outcome: DeviceOutcome,

    /// Human-readable cause for a failed outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,

    /// Per-command results in command-list order; empty unless `Success`
    pub results: Vec<CommandResult>,
}

impl DeviceResult {
    pub fn success(device: DeviceDescriptor, results: Vec<CommandResult>) -> Self {
        Self {
            device,
            outcome: DeviceOutcome::Success,
            cause: None,
            results,
        }
    }

    /// A failed device; always carries an empty result list
    pub fn failed(device: DeviceDescriptor, outcome: DeviceOutcome, cause: impl Into<String>) -> Self {
        debug_assert!(!outcome.is_success());
        Self {
            device,
            outcome,
            cause: Some(cause.into()),
            results: Vec::new(),
        }
    }

    /// Output for a command, if it ran successfully
    pub fn output_of(&self, command: &str) -> Option<&str> {
        self.results
            .iter()
            .find(|r| r.command == command && r.succeeded())
            .map(|r| r.output.as_str())
    }
}

/// Results for a whole fleet run, in inventory order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetResult {
    pub devices: Vec<DeviceResult>,
}

impl FleetResult {
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceResult> {
        self.devices.iter()
    }

    /// Look up a device by host
    pub fn get(&self, host: &str) -> Option<&DeviceResult> {
        self.devices.iter().find(|d| d.device.host == host)
    }

    pub fn succeeded(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| d.outcome.is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

/// Slot-per-device accumulator for a [`FleetResult`]
#[derive(Debug)]
pub struct ResultCollector {
    slots: Vec<Option<DeviceResult>>,
}

impl ResultCollector {
    /// Reserve one slot per inventory entry
    pub fn new(devices: usize) -> Self {
        Self {
            slots: vec![None; devices],
        }
    }

    /// Store the result for the device at inventory position `index`
    ///
    /// A slot is written once; later writes for the same slot are ignored.
    pub fn insert(&mut self, index: usize, result: DeviceResult) {
        match self.slots.get_mut(index) {
            Some(slot @ None) => *slot = Some(result),
            Some(Some(_)) => {
                tracing::warn!(index, host = %result.device.host, "Result slot already filled");
            }
            None => {
                tracing::warn!(index, host = %result.device.host, "Result slot out of range");
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Finish the run; unfilled slots are dropped
    pub fn finish(self) -> FleetResult {
        FleetResult {
            devices: self.slots.into_iter().flatten().collect(),
        }
    }
}
