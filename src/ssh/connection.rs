//! SSH device sessions
//!
//! [`SshSessionProvider`] opens one [`SshDeviceSession`] per device: TCP
//! connect, authentication, an interactive PTY shell, prompt discovery and
//! paging setup, all bounded by the connect timeout. The session then serves
//! liveness probes, enable-mode elevation and prompt-delimited commands until
//! it is closed.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle, KeyboardInteractiveAuthResponse};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::command::{ends_with_prompt, ShellChannel};
use super::config::{SshConfig, SshSettings};
use super::dialect::{is_elevation_denied, is_password_prompt, Dialect};
use super::handler::SshHandler;
use crate::credentials::Credentials;
use crate::error::{MulticomError, Result};
use crate::inventory::DeviceDescriptor;
use crate::session::{DeviceSession, SessionProvider, SessionState};

/// Upper bound on keyboard-interactive challenge rounds
const MAX_KBD_INTERACTIVE_ROUNDS: usize = 3;

/// Opens russh-backed sessions using run-wide settings
#[derive(Debug, Clone, Default)]
pub struct SshSessionProvider {
    settings: SshSettings,
}

impl SshSessionProvider {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SshSettings {
        &self.settings
    }
}

#[async_trait]
impl SessionProvider for SshSessionProvider {
    async fn open(
        &self,
        device: &DeviceDescriptor,
        credentials: &Credentials,
    ) -> Result<Box<dyn DeviceSession>> {
        let config = SshConfig::for_device(device, &self.settings);
        let session = SshDeviceSession::connect(device.clone(), config, credentials.clone()).await?;
        Ok(Box::new(session))
    }
}

/// One authenticated interactive session to a network device
pub struct SshDeviceSession {
    device: DeviceDescriptor,
    config: SshConfig,
    credentials: Credentials,
    dialect: &'static Dialect,
    session: Option<Handle<SshHandler>>,
    shell: Option<ShellChannel>,
    base_prompt: String,
    state: SessionState,
    /// Currently in privileged mode
    privileged: bool,
    /// Privileged mode was entered by this session and must be left again
    entered_privileged: bool,
}

impl SshDeviceSession {
    /// Connect, authenticate and prepare the shell
    pub async fn connect(
        device: DeviceDescriptor,
        config: SshConfig,
        credentials: Credentials,
    ) -> Result<Self> {
        info!(host = %config.host, port = config.port, kind = %config.kind, "Connecting");

        let connect_timeout = config.connect_timeout;
        let host = config.host.clone();

        let (session, shell) = match timeout(
            connect_timeout,
            Self::establish(&config, &credentials),
        )
        .await
        {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => {
                error!(host = %host, "Connection failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                error!(host = %host, "Connection timeout after {}s", connect_timeout.as_secs());
                return Err(MulticomError::connection(
                    host,
                    format!("Connection timeout after {}s", connect_timeout.as_secs()),
                ));
            }
        };

        let mut this = Self {
            dialect: config.kind.dialect(),
            device,
            config,
            credentials,
            session: Some(session),
            shell: Some(shell),
            base_prompt: String::new(),
            state: SessionState::Connecting,
            privileged: false,
            entered_privileged: false,
        };

        if let Err(e) = this.prepare().await {
            this.close().await;
            return Err(MulticomError::connection(
                &this.config.host,
                format!("Session preparation failed: {}", e),
            ));
        }

        this.state = SessionState::Connected;
        info!(
            host = %this.config.host,
            prompt = %this.base_prompt,
            "Connected as {}",
            this.credentials.username()
        );
        Ok(this)
    }

    /// Session over an already prepared shell, with no SSH connection behind it
    #[cfg(test)]
    pub(crate) fn over_shell(
        device: DeviceDescriptor,
        settings: &SshSettings,
        shell: ShellChannel,
        base_prompt: &str,
    ) -> Self {
        let config = SshConfig::for_device(&device, settings);
        Self {
            dialect: config.kind.dialect(),
            device,
            config,
            credentials: Credentials::new("admin", "s3cret"),
            session: None,
            shell: Some(shell),
            base_prompt: base_prompt.to_string(),
            state: SessionState::Connected,
            privileged: false,
            entered_privileged: false,
        }
    }

    /// TCP + handshake + auth + PTY shell
    async fn establish(
        config: &SshConfig,
        credentials: &Credentials,
    ) -> Result<(Handle<SshHandler>, ShellChannel)> {
        let ssh_config = Arc::new(client::Config::default());

        let mut session = client::connect(
            ssh_config,
            config.addr().as_str(),
            SshHandler::new(&config.host),
        )
        .await
        .map_err(|e| MulticomError::connection(&config.host, e.to_string()))?;

        Self::authenticate(&config.host, &mut session, credentials).await?;

        let channel = session.channel_open_session().await.map_err(|e| {
            MulticomError::connection(&config.host, format!("Failed to open channel: {}", e))
        })?;

        channel
            .request_pty(true, "vt100", 200, 24, 0, 0, &[])
            .await
            .map_err(|e| {
                MulticomError::connection(&config.host, format!("Failed to request PTY: {}", e))
            })?;

        channel.request_shell(true).await.map_err(|e| {
            MulticomError::connection(&config.host, format!("Failed to request shell: {}", e))
        })?;

        Ok((session, ShellChannel::new(&config.host, channel)))
    }

    /// Password auth, falling back to keyboard-interactive with the same secret
    async fn authenticate(
        host: &str,
        session: &mut Handle<SshHandler>,
        credentials: &Credentials,
    ) -> Result<()> {
        let username = credentials.username();
        debug!("Attempting password authentication for user '{}'", username);

        let auth_result = session
            .authenticate_password(username, credentials.expose_secret())
            .await
            .map_err(|e| MulticomError::auth(host, e.to_string()))?;

        if auth_result.success() {
            debug!("Password authentication successful");
            return Ok(());
        }

        debug!("Password rejected, trying keyboard-interactive");
        let mut response = session
            .authenticate_keyboard_interactive_start(username, None::<String>)
            .await
            .map_err(|e| MulticomError::auth(host, e.to_string()))?;

        let mut rounds = 0;
        loop {
            match response {
                KeyboardInteractiveAuthResponse::Success => {
                    debug!("Keyboard-interactive authentication successful");
                    return Ok(());
                }
                KeyboardInteractiveAuthResponse::Failure { .. } => break,
                KeyboardInteractiveAuthResponse::InfoRequest { .. }
                    if rounds == MAX_KBD_INTERACTIVE_ROUNDS =>
                {
                    break
                }
                KeyboardInteractiveAuthResponse::InfoRequest { ref prompts, .. } => {
                    rounds += 1;
                    let answers = prompts
                        .iter()
                        .map(|_| credentials.expose_secret().to_string())
                        .collect();
                    response = session
                        .authenticate_keyboard_interactive_respond(answers)
                        .await
                        .map_err(|e| MulticomError::auth(host, e.to_string()))?;
                }
            }
        }

        Err(MulticomError::auth(
            host,
            format!("Authentication rejected for user '{}'", username),
        ))
    }

    /// Discover the prompt and disable paging
    async fn prepare(&mut self) -> Result<()> {
        let probe_timeout = self.config.probe_timeout;
        let dialect = self.dialect;
        let shell = self.shell_mut()?;

        let prompt = shell.find_prompt(dialect, probe_timeout).await?;
        self.base_prompt = dialect.base_prompt(&prompt).to_string();
        debug!(host = %self.config.host, "Found prompt {:?}", prompt);

        if let Some(paging_off) = dialect.paging_off {
            let base = self.base_prompt.clone();
            match self
                .shell_mut()?
                .run_command(paging_off, dialect, &base, probe_timeout)
                .await
            {
                Ok(_) => {}
                Err(MulticomError::Command(line)) => {
                    warn!(host = %self.config.host, "'{}' not accepted: {}", paging_off, line);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    fn shell_mut(&mut self) -> Result<&mut ShellChannel> {
        let host = &self.config.host;
        self.shell
            .as_mut()
            .ok_or_else(|| MulticomError::connection(host, "Shell channel not open"))
    }

    async fn current_prompt(&mut self) -> Result<String> {
        let probe_timeout = self.config.probe_timeout;
        let dialect = self.dialect;
        self.shell_mut()?.find_prompt(dialect, probe_timeout).await
    }

    /// Interactive enable: send the enter command, answer the password prompt
    async fn enter_privileged(&mut self, enter: &str) -> Result<()> {
        let probe_timeout = self.config.probe_timeout;
        let dialect = self.dialect;
        let base = self.base_prompt.clone();
        let secret = self.credentials.expose_secret().to_string();
        let shell = self.shell_mut()?;

        shell.write_line(enter).await?;
        let reply = shell
            .read_until(probe_timeout, |buf| {
                is_password_prompt(buf) || ends_with_prompt(buf, dialect, &base)
            })
            .await?;

        if is_password_prompt(&reply) {
            debug!("Enable password prompt detected, sending secret");
            shell.write_line(&secret).await?;
            let reply = shell
                .read_until(probe_timeout, |buf| {
                    is_password_prompt(buf)
                        || is_elevation_denied(buf)
                        || ends_with_prompt(buf, dialect, &base)
                })
                .await?;
            if is_password_prompt(&reply) || is_elevation_denied(&reply) {
                // Leave the password prompt before reporting
                let _ = shell.write_line("").await;
                return Err(MulticomError::elevation("enable secret rejected"));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DeviceSession for SshDeviceSession {
    fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    fn state(&self) -> SessionState {
        self.state
    }

    async fn verify_live(&mut self) -> bool {
        match self.current_prompt().await {
            Ok(prompt) => {
                let live = self.dialect.base_prompt(&prompt) == self.base_prompt;
                if !live {
                    warn!(host = %self.config.host, "Unexpected prompt {:?}", prompt);
                }
                live
            }
            Err(e) => {
                warn!(host = %self.config.host, "Liveness probe failed: {}", e);
                false
            }
        }
    }

    async fn elevate(&mut self) -> Result<()> {
        let Some(elevation) = self.dialect.elevation else {
            return Ok(());
        };
        if self.privileged {
            return Ok(());
        }

        let prompt = self
            .current_prompt()
            .await
            .map_err(|e| MulticomError::elevation(e.to_string()))?;
        if self.dialect.is_elevated_prompt(&prompt) {
            debug!(host = %self.config.host, "Already in privileged mode");
            self.privileged = true;
            self.state = SessionState::PrivilegeElevated;
            return Ok(());
        }

        match self.enter_privileged(elevation.enter).await {
            Ok(()) => {}
            Err(e @ MulticomError::Elevation(_)) => return Err(e),
            Err(e) => {
                // Exchange broke off midway, the mode is unknown
                self.entered_privileged = true;
                return Err(MulticomError::elevation(e.to_string()));
            }
        }
        // Accepted; de_elevate must undo it even if verification fails
        self.entered_privileged = true;

        let prompt = self
            .current_prompt()
            .await
            .map_err(|e| MulticomError::elevation(e.to_string()))?;
        if !self.dialect.is_elevated_prompt(&prompt) {
            return Err(MulticomError::elevation(format!(
                "prompt {:?} is not privileged after '{}'",
                prompt, elevation.enter
            )));
        }

        self.privileged = true;
        self.state = SessionState::PrivilegeElevated;
        info!(host = %self.config.host, "Entered privileged mode");
        Ok(())
    }

    async fn de_elevate(&mut self) -> Result<()> {
        let Some(elevation) = self.dialect.elevation else {
            return Ok(());
        };
        if !self.entered_privileged {
            return Ok(());
        }

        let probe_timeout = self.config.probe_timeout;
        let dialect = self.dialect;
        let base = self.base_prompt.clone();
        self.shell_mut()?
            .run_command(elevation.exit, dialect, &base, probe_timeout)
            .await
            .map_err(|e| MulticomError::elevation(format!("'{}' failed: {}", elevation.exit, e)))?;

        self.privileged = false;
        self.entered_privileged = false;
        self.state = SessionState::PrivilegeNormal;
        debug!(host = %self.config.host, "Left privileged mode");
        Ok(())
    }

    fn is_elevated(&self) -> bool {
        self.privileged
    }

    async fn send_command(&mut self, command: &str) -> Result<String> {
        let command_timeout = self.config.command_timeout;
        let dialect = self.dialect;
        let base = self.base_prompt.clone();
        self.state = SessionState::Executing;

        debug!(host = %self.config.host, "Executing command: {}", command);
        self.shell_mut()?
            .run_command(command, dialect, &base, command_timeout)
            .await
    }

    async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        if let Some(shell) = self.shell.take() {
            shell.close().await;
        }
        if let Some(session) = self.session.take() {
            let _ = session
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await;
        }

        self.privileged = false;
        self.entered_privileged = false;
        self.state = SessionState::Closed;
        info!(host = %self.config.host, "SSH session closed");
    }
}

impl std::fmt::Debug for SshDeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshDeviceSession")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("kind", &self.config.kind)
            .field("state", &self.state)
            .field("privileged", &self.privileged)
            .finish()
    }
}
