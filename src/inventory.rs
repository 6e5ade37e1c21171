//! Device inventory: targets, their kinds and the shared command list
//!
//! The inventory file is the YAML document the operator maintains:
//!
//! ```yaml
//! nodes:
//!   - host: r1.example.net
//!     type: cisco_ios
//!   - host: fw1.example.net
//!     type: cisco_asa
//!     port: 2222
//! command_list:
//!   - show version
//!   - show ip interface brief
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MulticomError, Result};

/// Vendor/OS family of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceKind {
    CiscoIos,
    CiscoXe,
    CiscoAsa,
    CiscoNxos,
    AristaEos,
    JuniperJunos,
    Linux,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 7] = [
        DeviceKind::CiscoIos,
        DeviceKind::CiscoXe,
        DeviceKind::CiscoAsa,
        DeviceKind::CiscoNxos,
        DeviceKind::AristaEos,
        DeviceKind::JuniperJunos,
        DeviceKind::Linux,
    ];

    /// Canonical name as written in inventories
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::CiscoIos => "cisco_ios",
            DeviceKind::CiscoXe => "cisco_xe",
            DeviceKind::CiscoAsa => "cisco_asa",
            DeviceKind::CiscoNxos => "cisco_nxos",
            DeviceKind::AristaEos => "arista_eos",
            DeviceKind::JuniperJunos => "juniper_junos",
            DeviceKind::Linux => "linux",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = MulticomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cisco_ios" | "ios" => Ok(DeviceKind::CiscoIos),
            "cisco_xe" | "iosxe" | "ios_xe" => Ok(DeviceKind::CiscoXe),
            "cisco_asa" | "asa" => Ok(DeviceKind::CiscoAsa),
            "cisco_nxos" | "nxos" => Ok(DeviceKind::CiscoNxos),
            "arista_eos" | "eos" => Ok(DeviceKind::AristaEos),
            "juniper_junos" | "juniper" | "junos" => Ok(DeviceKind::JuniperJunos),
            "linux" => Ok(DeviceKind::Linux),
            other => Err(MulticomError::inventory(format!(
                "Unknown device type: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for DeviceKind {
    type Error = MulticomError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeviceKind> for String {
    fn from(kind: DeviceKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One target device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub host: String,

    #[serde(rename = "type")]
    pub kind: DeviceKind,

    /// Per-device SSH port; falls back to the run default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl DeviceDescriptor {
    pub fn new(host: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            host: host.into(),
            kind,
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.host, self.kind)
    }
}

/// Parsed inventory file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub nodes: Vec<DeviceDescriptor>,
    pub command_list: Vec<String>,
}

impl Inventory {
    /// Load and validate an inventory file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MulticomError::inventory(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let inventory: Inventory = serde_yaml::from_str(content)
            .map_err(|e| MulticomError::inventory(e.to_string()))?;
        inventory.validate()?;
        Ok(inventory)
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.nodes.is_empty() {
            errors.push("no nodes defined".to_string());
        }
        if self.command_list.is_empty() {
            errors.push("no commands entered".to_string());
        }
        if let Some(node) = self.nodes.iter().find(|n| n.host.trim().is_empty()) {
            errors.push(format!("node of type {} has an empty host", node.kind));
        }

        if !errors.is_empty() {
            return Err(MulticomError::inventory(errors.join("; ")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
nodes:
  - host: r1
    type: cisco_ios
  - host: fw1
    type: asa
    port: 2222
command_list:
  - show version
  - show ip interface brief
"#;

    #[test]
    fn test_parse_inventory() {
        let inventory = Inventory::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(inventory.nodes.len(), 2);
        assert_eq!(inventory.nodes[0], DeviceDescriptor::new("r1", DeviceKind::CiscoIos));
        assert_eq!(
            inventory.nodes[1],
            DeviceDescriptor::new("fw1", DeviceKind::CiscoAsa).with_port(2222)
        );
        assert_eq!(
            inventory.command_list,
            vec!["show version", "show ip interface brief"]
        );
    }

    #[test]
    fn test_device_kind_aliases() {
        assert_eq!("ios".parse::<DeviceKind>().unwrap(), DeviceKind::CiscoIos);
        assert_eq!("EOS".parse::<DeviceKind>().unwrap(), DeviceKind::AristaEos);
        assert_eq!("junos".parse::<DeviceKind>().unwrap(), DeviceKind::JuniperJunos);
        assert!("vyos".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn test_device_kind_canonical_round_trip() {
        for kind in DeviceKind::ALL {
            assert_eq!(kind.as_str().parse::<DeviceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let yaml = "nodes:\n  - host: r1\n    type: toaster\ncommand_list:\n  - show version\n";
        let err = Inventory::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("toaster"));
    }

    #[test]
    fn test_empty_command_list_rejected() {
        let yaml = "nodes:\n  - host: r1\n    type: ios\ncommand_list: []\n";
        let err = Inventory::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("no commands entered"));
    }

    #[test]
    fn test_empty_nodes_rejected() {
        let yaml = "nodes: []\ncommand_list:\n  - show version\n";
        let err = Inventory::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("no nodes defined"));
    }
}
