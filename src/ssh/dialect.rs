//! Per-device-kind behaviour
//!
//! Each [`DeviceKind`] maps to one static [`Dialect`]: how to enter and leave
//! the privileged mode (if the platform has one), which characters terminate
//! its prompt, and the session preparation it needs before command output can
//! be read back reliably.

use crate::inventory::DeviceKind;

/// Commands entering and leaving privileged mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elevation {
    pub enter: &'static str,
    pub exit: &'static str,
    /// Prompt terminator shown once elevated
    pub elevated_terminator: char,
}

/// Capability table for one device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub kind: DeviceKind,

    /// `None` when the platform has no separate privileged mode
    pub elevation: Option<Elevation>,

    /// Characters a prompt may end with, in any mode
    pub terminators: &'static [char],

    /// Sent once after login to disable output paging
    pub paging_off: Option<&'static str>,

    /// Output lines starting with one of these report a rejected command
    pub error_markers: &'static [&'static str],
}

const CISCO_ERRORS: &[&str] = &[
    "% Invalid input",
    "% Incomplete command",
    "% Ambiguous command",
    "% Unknown command",
];

const CISCO_ENABLE: Elevation = Elevation {
    enter: "enable",
    exit: "disable",
    elevated_terminator: '#',
};

const CISCO_IOS: Dialect = Dialect {
    kind: DeviceKind::CiscoIos,
    elevation: Some(CISCO_ENABLE),
    terminators: &['>', '#'],
    paging_off: Some("terminal length 0"),
    error_markers: CISCO_ERRORS,
};

const CISCO_XE: Dialect = Dialect {
    kind: DeviceKind::CiscoXe,
    elevation: Some(CISCO_ENABLE),
    terminators: &['>', '#'],
    paging_off: Some("terminal length 0"),
    error_markers: CISCO_ERRORS,
};

const CISCO_ASA: Dialect = Dialect {
    kind: DeviceKind::CiscoAsa,
    elevation: Some(CISCO_ENABLE),
    terminators: &['>', '#'],
    paging_off: Some("terminal pager 0"),
    error_markers: &["ERROR: %", "% Invalid input", "% Incomplete command"],
};

const CISCO_NXOS: Dialect = Dialect {
    kind: DeviceKind::CiscoNxos,
    elevation: None,
    terminators: &['#'],
    paging_off: Some("terminal length 0"),
    error_markers: &[
        "% Invalid command",
        "% Incomplete command",
        "% Invalid parameter",
        "% Ambiguous command",
    ],
};

const ARISTA_EOS: Dialect = Dialect {
    kind: DeviceKind::AristaEos,
    elevation: Some(CISCO_ENABLE),
    terminators: &['>', '#'],
    paging_off: Some("terminal length 0"),
    error_markers: &[
        "% Invalid input",
        "% Incomplete command",
        "% Ambiguous command",
        "% Unavailable command",
    ],
};

// Show commands run from operational mode, no elevation
const JUNIPER_JUNOS: Dialect = Dialect {
    kind: DeviceKind::JuniperJunos,
    elevation: None,
    terminators: &['>', '#', '%'],
    paging_off: Some("set cli screen-length 0"),
    error_markers: &["syntax error", "unknown command", "error:"],
};

const LINUX: Dialect = Dialect {
    kind: DeviceKind::Linux,
    elevation: None,
    terminators: &['$', '#'],
    paging_off: None,
    error_markers: &[],
};

impl DeviceKind {
    /// Capability table for this kind
    pub fn dialect(&self) -> &'static Dialect {
        match self {
            DeviceKind::CiscoIos => &CISCO_IOS,
            DeviceKind::CiscoXe => &CISCO_XE,
            DeviceKind::CiscoAsa => &CISCO_ASA,
            DeviceKind::CiscoNxos => &CISCO_NXOS,
            DeviceKind::AristaEos => &ARISTA_EOS,
            DeviceKind::JuniperJunos => &JUNIPER_JUNOS,
            DeviceKind::Linux => &LINUX,
        }
    }

    /// Whether read commands need privileged mode on this kind
    pub fn requires_elevation(&self) -> bool {
        self.dialect().elevation.is_some()
    }
}

impl Dialect {
    /// Whether `line` looks like a prompt for this dialect
    pub fn is_prompt(&self, line: &str) -> bool {
        let line = line.trim_end();
        line.chars()
            .last()
            .is_some_and(|c| self.terminators.contains(&c))
    }

    /// Prompt with its terminator and any mode suffix removed
    ///
    /// `R1#` and `R1(config)#` both give `R1`; `admin@mx1> ` gives `admin@mx1`.
    pub fn base_prompt<'a>(&self, prompt: &'a str) -> &'a str {
        let trimmed = prompt.trim();
        let without_term = trimmed
            .strip_suffix(|c: char| self.terminators.contains(&c))
            .unwrap_or(trimmed);
        let base = match without_term.find('(') {
            Some(idx) if idx > 0 => &without_term[..idx],
            _ => without_term,
        };
        base.trim_end()
    }

    /// First output line reporting that the device rejected the command
    pub fn command_error<'a>(&self, output: &'a str) -> Option<&'a str> {
        output
            .lines()
            .map(str::trim)
            .find(|line| self.error_markers.iter().any(|m| line.starts_with(m)))
    }

    /// Whether `prompt` shows privileged mode
    pub fn is_elevated_prompt(&self, prompt: &str) -> bool {
        match self.elevation {
            Some(elevation) => prompt.trim_end().ends_with(elevation.elevated_terminator),
            None => false,
        }
    }
}

/// Whether device output is asking for a password
pub fn is_password_prompt(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered
        .lines()
        .last()
        .is_some_and(|line| line.trim_end().ends_with("password:"))
}

/// Whether device output reports a rejected elevation attempt
pub fn is_elevation_denied(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ["access denied", "bad secrets", "% bad passwords", "invalid password"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_per_kind() {
        assert!(DeviceKind::CiscoIos.requires_elevation());
        assert!(DeviceKind::CiscoAsa.requires_elevation());
        assert!(DeviceKind::AristaEos.requires_elevation());
        assert!(!DeviceKind::JuniperJunos.requires_elevation());
        assert!(!DeviceKind::CiscoNxos.requires_elevation());
        assert!(!DeviceKind::Linux.requires_elevation());
    }

    #[test]
    fn test_every_kind_has_its_own_dialect() {
        for kind in DeviceKind::ALL {
            assert_eq!(kind.dialect().kind, kind);
        }
    }

    #[test]
    fn test_is_prompt() {
        let ios = DeviceKind::CiscoIos.dialect();
        assert!(ios.is_prompt("R1>"));
        assert!(ios.is_prompt("R1#  "));
        assert!(!ios.is_prompt("Cisco IOS Software, Version 15.1"));

        let linux = DeviceKind::Linux.dialect();
        assert!(linux.is_prompt("admin@box:~$ "));
    }

    #[test]
    fn test_base_prompt() {
        let ios = DeviceKind::CiscoIos.dialect();
        assert_eq!(ios.base_prompt("R1#"), "R1");
        assert_eq!(ios.base_prompt("R1>"), "R1");
        assert_eq!(ios.base_prompt("R1(config)#"), "R1");

        let junos = DeviceKind::JuniperJunos.dialect();
        assert_eq!(junos.base_prompt("admin@mx1> "), "admin@mx1");
    }

    #[test]
    fn test_is_elevated_prompt() {
        let ios = DeviceKind::CiscoIos.dialect();
        assert!(ios.is_elevated_prompt("R1#"));
        assert!(!ios.is_elevated_prompt("R1>"));
        assert!(!DeviceKind::Linux.dialect().is_elevated_prompt("root@box:~#"));
    }

    #[test]
    fn test_command_error_markers() {
        let ios = DeviceKind::CiscoIos.dialect();
        assert_eq!(
            ios.command_error("   ^\n% Invalid input detected at '^' marker."),
            Some("% Invalid input detected at '^' marker.")
        );
        assert_eq!(ios.command_error("% Incomplete command."), Some("% Incomplete command."));
        assert_eq!(ios.command_error("Cisco IOS Software, Version 15.1"), None);

        let asa = DeviceKind::CiscoAsa.dialect();
        assert!(asa.command_error("ERROR: % Invalid input detected at '^' marker.").is_some());

        let nxos = DeviceKind::CiscoNxos.dialect();
        assert!(nxos.command_error("% Invalid command at '^' marker.").is_some());

        let eos = DeviceKind::AristaEos.dialect();
        assert!(eos.command_error("% Invalid input").is_some());

        let junos = DeviceKind::JuniperJunos.dialect();
        assert_eq!(
            junos.command_error("              ^\nsyntax error, expecting <command>."),
            Some("syntax error, expecting <command>.")
        );
        assert!(junos.command_error("error: unknown command: bogus").is_some());
        assert_eq!(junos.command_error("Hostname: mx1\nModel: mx480"), None);

        // Plain shells have no reliable marker; their output is taken as is
        let linux = DeviceKind::Linux.dialect();
        assert_eq!(linux.command_error("bash: bogus: command not found"), None);
    }

    #[test]
    fn test_password_prompt_detection() {
        assert!(is_password_prompt("enable\r\nPassword: "));
        assert!(!is_password_prompt("R1#"));
        assert!(!is_password_prompt("password recovery is enabled\nR1>"));
    }

    #[test]
    fn test_elevation_denied_detection() {
        assert!(is_elevation_denied("% Access denied\r\nR1>"));
        assert!(is_elevation_denied("% Bad secrets\r\n"));
        assert!(!is_elevation_denied("R1#"));
    }
}
