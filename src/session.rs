//! Session capability interface
//!
//! The orchestrator never talks to a transport directly. It asks a
//! [`SessionProvider`] for one [`DeviceSession`] per device and drives it
//! through `verify_live → elevate → send_command* → de_elevate → close`.
//! The russh-backed implementation lives in [`crate::ssh`]; tests use an
//! in-memory provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::Result;
use crate::inventory::DeviceDescriptor;

/// Output of one command on one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// The literal command string from the command list
    pub command: String,

    /// Text returned by the device (empty when the command failed)
    pub output: String,

    /// Why the command produced no output, if it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn success(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(command: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Lifecycle of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    PrivilegeElevated,
    Executing,
    PrivilegeNormal,
    Closed,
}

/// One live, authenticated session to one device
///
/// Implementations bound every network round-trip by a timeout. Sessions are
/// not reentrant: the orchestrator issues one call at a time.
#[async_trait]
pub trait DeviceSession: Send {
    fn device(&self) -> &DeviceDescriptor;

    fn state(&self) -> SessionState;

    /// Probe the prompt; `false` on any failure
    async fn verify_live(&mut self) -> bool;

    /// Enter privileged mode; a no-op when already elevated or unsupported
    async fn elevate(&mut self) -> Result<()>;

    /// Leave privileged mode if this session entered it
    async fn de_elevate(&mut self) -> Result<()>;

    fn is_elevated(&self) -> bool;

    /// Send one command and return its output
    async fn send_command(&mut self, command: &str) -> Result<String>;

    /// Terminate the session; safe to call on a half-broken session
    async fn close(&mut self);
}

/// Factory for device sessions, selected per device kind
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Connect and authenticate; every failure becomes `MulticomError::Connection`
    /// or `MulticomError::Authentication`
    async fn open(
        &self,
        device: &DeviceDescriptor,
        credentials: &Credentials,
    ) -> Result<Box<dyn DeviceSession>>;
}

/// Cause recorded for commands skipped after the run was cancelled
pub const CANCELLED: &str = "cancelled";

/// Cause recorded for commands skipped after the session stopped responding
pub const SESSION_LOST: &str = "session lost";

/// Run `commands` in order on a session that has just passed `verify_live`
///
/// A failing command is recorded and the list continues. After a timeout or
/// transport error the session is probed again; if it no longer answers,
/// the remaining commands are recorded as failed without being sent. Once
/// `cancel` fires, the in-flight command is abandoned and the rest are
/// recorded as cancelled. The returned list always has one entry per command.
pub async fn execute(
    session: &mut dyn DeviceSession,
    commands: &[String],
    cancel: &CancellationToken,
) -> Vec<CommandResult> {
    let host = session.device().host.clone();
    let mut results = Vec::with_capacity(commands.len());
    let mut abandoned: Option<&'static str> = None;

    for command in commands {
        if let Some(reason) = abandoned {
            results.push(CommandResult::failure(command, reason));
            continue;
        }
        if cancel.is_cancelled() {
            abandoned = Some(CANCELLED);
            results.push(CommandResult::failure(command, CANCELLED));
            continue;
        }

        debug!(host = %host, "Executing command: {}", command);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = session.send_command(command) => Some(r),
        };

        match outcome {
            Some(Ok(output)) => results.push(CommandResult::success(command, output)),
            Some(Err(e)) => {
                warn!(host = %host, command = %command, "Command failed: {}", e);
                results.push(CommandResult::failure(command, e.to_string()));
                if e.is_session_fatal() && !session.verify_live().await {
                    warn!(host = %host, "Session lost, skipping remaining commands");
                    abandoned = Some(SESSION_LOST);
                }
            }
            None => {
                warn!(host = %host, command = %command, "Run cancelled mid-command");
                abandoned = Some(CANCELLED);
                results.push(CommandResult::failure(command, CANCELLED));
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_result_constructors() {
        let ok = CommandResult::success("show version", "IOS 15.1");
        assert!(ok.succeeded());
        assert_eq!(ok.output, "IOS 15.1");

        let failed = CommandResult::failure("show clock", "Timeout after 1000ms");
        assert!(!failed.succeeded());
        assert!(failed.output.is_empty());
    }

    #[test]
    fn test_command_result_serialization_skips_empty_error() {
        let ok = CommandResult::success("show version", "IOS 15.1");
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("error"));
    }

    use crate::inventory::DeviceKind;
    use crate::mock::{Event, MockDevice, MockProvider};

    async fn open(provider: &MockProvider) -> Box<dyn DeviceSession> {
        provider
            .open(
                &DeviceDescriptor::new("r1", DeviceKind::CiscoIos),
                &Credentials::new("admin", "secret".to_string()),
            )
            .await
            .unwrap()
    }

    fn commands(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_execute_records_failures_inline() {
        let provider =
            MockProvider::new().device("r1", MockDevice::ok().failing("show bogus", "% Invalid input"));
        let mut session = open(&provider).await;

        let results = execute(
            session.as_mut(),
            &commands(&["show version", "show bogus", "show clock"]),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].succeeded());
        assert!(results[1].error.as_deref().unwrap().contains("% Invalid input"));
        assert_eq!(results[2].output, "output of show clock");
    }

    #[tokio::test]
    async fn test_execute_after_cancel_sends_nothing() {
        let provider = MockProvider::new();
        let mut session = open(&provider).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = execute(
            session.as_mut(),
            &commands(&["show version", "show clock"]),
            &cancel,
        )
        .await;

        assert!(results.iter().all(|r| r.error.as_deref() == Some(CANCELLED)));
        assert!(!provider
            .events()
            .iter()
            .any(|e| matches!(e, Event::Command(..))));
    }
}
