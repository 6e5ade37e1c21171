//! Scripted in-memory sessions for tests
//!
//! [`MockProvider`] answers `open` from a per-host script and records every
//! call it sees, so tests can assert how sessions were driven.
//! [`ScriptedShell`] sits one layer lower and plays a device terminal to a
//! real [`crate::ssh::ShellChannel`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use russh::{ChannelMsg, CryptoVec};

use crate::credentials::Credentials;
use crate::error::{MulticomError, Result};
use crate::inventory::DeviceDescriptor;
use crate::session::{DeviceSession, SessionProvider, SessionState};
use crate::ssh::ShellTransport;

/// Something the provider or one of its sessions was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(String),
    Probe(String),
    Elevate(String),
    DeElevate(String),
    Command(String, String),
    Close(String),
}

/// Behaviour of one scripted device
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    pub connect_error: Option<String>,
    pub not_live: bool,
    pub elevation_error: Option<String>,
    /// Enable is accepted but the privileged prompt never shows
    pub elevation_unverified: Option<String>,
    /// Responses by command; unknown commands echo `output of <cmd>`
    pub outputs: HashMap<String, std::result::Result<String, String>>,
    /// Commands that time out and leave the session dead
    pub lost_on: Option<String>,
    /// Command whose execution panics the device task
    pub panics_on: Option<String>,
    pub delay: Option<Duration>,
}

impl MockDevice {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn unreachable(cause: &str) -> Self {
        Self {
            connect_error: Some(cause.to_string()),
            ..Self::default()
        }
    }

    pub fn not_live() -> Self {
        Self {
            not_live: true,
            ..Self::default()
        }
    }

    pub fn output(mut self, command: &str, output: &str) -> Self {
        self.outputs
            .insert(command.to_string(), Ok(output.to_string()));
        self
    }

    pub fn failing(mut self, command: &str, error: &str) -> Self {
        self.outputs
            .insert(command.to_string(), Err(error.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
pub struct MockProvider {
    devices: HashMap<String, MockDevice>,
    events: Arc<Mutex<Vec<Event>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, host: &str, device: MockDevice) -> Self {
        self.devices.insert(host.to_string(), device);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    pub fn opens(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Open(_)))
            .count()
    }

    /// Highest number of sessions that were open at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for MockProvider {
    async fn open(
        &self,
        device: &DeviceDescriptor,
        _credentials: &Credentials,
    ) -> Result<Box<dyn DeviceSession>> {
        let host = device.host.clone();
        self.events.lock().unwrap().push(Event::Open(host.clone()));
        let script = self.devices.get(&host).cloned().unwrap_or_default();

        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(cause) = script.connect_error.clone() {
            return Err(MulticomError::connection(host, cause));
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(MockSession {
            device: device.clone(),
            script,
            events: Arc::clone(&self.events),
            active: Arc::clone(&self.active),
            state: SessionState::Connected,
            privileged: false,
            entered: false,
            dead: false,
        }))
    }
}

pub struct MockSession {
    device: DeviceDescriptor,
    script: MockDevice,
    events: Arc<Mutex<Vec<Event>>>,
    active: Arc<AtomicUsize>,
    state: SessionState,
    privileged: bool,
    entered: bool,
    dead: bool,
}

impl MockSession {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl DeviceSession for MockSession {
    fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    fn state(&self) -> SessionState {
        self.state
    }

    async fn verify_live(&mut self) -> bool {
        self.record(Event::Probe(self.device.host.clone()));
        !self.script.not_live && !self.dead
    }

    async fn elevate(&mut self) -> Result<()> {
        if self.privileged {
            return Ok(());
        }
        self.record(Event::Elevate(self.device.host.clone()));
        if let Some(cause) = &self.script.elevation_error {
            return Err(MulticomError::elevation(cause.clone()));
        }
        self.entered = true;
        if let Some(cause) = &self.script.elevation_unverified {
            return Err(MulticomError::elevation(cause.clone()));
        }
        self.privileged = true;
        self.state = SessionState::PrivilegeElevated;
        Ok(())
    }

    async fn de_elevate(&mut self) -> Result<()> {
        if !self.entered {
            return Ok(());
        }
        self.record(Event::DeElevate(self.device.host.clone()));
        self.privileged = false;
        self.entered = false;
        self.state = SessionState::PrivilegeNormal;
        Ok(())
    }

    fn is_elevated(&self) -> bool {
        self.privileged
    }

    async fn send_command(&mut self, command: &str) -> Result<String> {
        self.record(Event::Command(
            self.device.host.clone(),
            command.to_string(),
        ));
        self.state = SessionState::Executing;

        if let Some(delay) = self.script.delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.panics_on.as_deref() == Some(command) {
            panic!("scripted panic on {}", command);
        }
        if self.script.lost_on.as_deref() == Some(command) {
            self.dead = true;
            return Err(MulticomError::Timeout(1000));
        }

        match self.script.outputs.get(command) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(e)) => Err(MulticomError::command(e.clone())),
            None => Ok(format!("output of {}", command)),
        }
    }

    async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.record(Event::Close(self.device.host.clone()));
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.privileged = false;
        self.entered = false;
        self.state = SessionState::Closed;
    }
}

/// What a [`ScriptedShell`] does after the next line written to it
#[derive(Debug, Clone)]
pub enum Reply {
    /// Print on stdout
    Text(String),
    /// Print on stderr
    Stderr(String),
    /// Print nothing
    Silence,
    /// Drop the channel
    Hangup,
}

/// Terminal stand-in answering each written line with the next scripted reply
///
/// Once the script runs out the device stays silent.
#[derive(Debug, Default)]
pub struct ScriptedShell {
    replies: VecDeque<Reply>,
    pending: VecDeque<Reply>,
    sent: Arc<Mutex<Vec<String>>>,
    hung_up: bool,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.then(Reply::Text(text.to_string()))
    }

    pub fn then(mut self, reply: Reply) -> Self {
        self.replies.push_back(reply);
        self
    }

    /// Lines written to the shell so far, without their newline
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl ShellTransport for ScriptedShell {
    async fn send(&mut self, data: &[u8]) -> std::result::Result<(), russh::Error> {
        if self.hung_up {
            return Err(russh::Error::SendError);
        }
        let line = String::from_utf8_lossy(data);
        self.sent
            .lock()
            .unwrap()
            .push(line.trim_end_matches('\n').to_string());

        match self.replies.pop_front() {
            Some(Reply::Hangup) => self.hung_up = true,
            Some(Reply::Silence) | None => {}
            Some(reply) => self.pending.push_back(reply),
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<ChannelMsg> {
        match self.pending.pop_front() {
            Some(Reply::Text(text)) => Some(ChannelMsg::Data {
                data: CryptoVec::from(text),
            }),
            Some(Reply::Stderr(text)) => Some(ChannelMsg::ExtendedData {
                data: CryptoVec::from(text),
                ext: 1,
            }),
            _ if self.hung_up => None,
            _ => std::future::pending::<Option<ChannelMsg>>().await,
        }
    }

    async fn shutdown(&mut self) {
        self.hung_up = true;
    }
}
