//! Prompt-delimited command execution over an interactive shell
//!
//! Network devices are driven through a PTY shell rather than `exec`
//! channels: a command is written followed by a newline, and its output is
//! everything the device prints until the prompt comes back.

use std::time::Duration;

use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::time::{timeout, Instant};
use tracing::{debug, trace};

use super::dialect::Dialect;
use crate::error::{MulticomError, Result};

/// How long the channel must stay quiet before a prompt is considered final
const PROMPT_SETTLE: Duration = Duration::from_millis(250);

/// Byte pipe underneath a [`ShellChannel`]
#[async_trait]
pub trait ShellTransport: Send {
    async fn send(&mut self, data: &[u8]) -> std::result::Result<(), russh::Error>;

    /// Next message from the device; `None` once the channel is gone
    async fn recv(&mut self) -> Option<ChannelMsg>;

    async fn shutdown(&mut self);
}

#[async_trait]
impl ShellTransport for Channel<Msg> {
    async fn send(&mut self, data: &[u8]) -> std::result::Result<(), russh::Error> {
        self.data(data).await
    }

    async fn recv(&mut self) -> Option<ChannelMsg> {
        self.wait().await
    }

    async fn shutdown(&mut self) {
        let _ = self.eof().await;
        let _ = self.close().await;
    }
}

/// Interactive shell channel with a read buffer
pub struct ShellChannel {
    host: String,
    transport: Box<dyn ShellTransport>,
}

impl ShellChannel {
    pub fn new(host: impl Into<String>, transport: impl ShellTransport + 'static) -> Self {
        Self {
            host: host.into(),
            transport: Box::new(transport),
        }
    }

    /// Write `line` followed by a newline
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.transport
            .send(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| MulticomError::connection(&self.host, format!("Failed to send: {}", e)))
    }

    /// Next chunk of terminal output, ANSI sequences removed
    ///
    /// stdout and stderr are merged the way a terminal shows them.
    async fn next_output(&mut self) -> Result<Option<String>> {
        match self.transport.recv().await {
            Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                Ok(Some(strip_ansi(&String::from_utf8_lossy(&data))))
            }
            Some(ChannelMsg::Close) | Some(ChannelMsg::Eof) | None => Err(
                MulticomError::connection(&self.host, "Channel closed by device"),
            ),
            // Window adjustments, exit status etc.
            Some(_) => Ok(None),
        }
    }

    /// Read until `done` accepts the (cleaned) buffer or `limit` elapses
    pub async fn read_until<F>(&mut self, limit: Duration, mut done: F) -> Result<String>
    where
        F: FnMut(&str) -> bool,
    {
        let deadline = Instant::now() + limit;
        let mut buffer = String::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(host = %self.host, "Read timed out, buffer: {:?}", tail(&buffer));
                return Err(MulticomError::timeout(limit));
            }

            match timeout(remaining, self.next_output()).await {
                Ok(Ok(Some(chunk))) => {
                    buffer.push_str(&chunk);
                    trace!(host = %self.host, "buffer tail: {:?}", tail(&buffer));
                    if done(&buffer) {
                        return Ok(buffer);
                    }
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(host = %self.host, "Read timed out, buffer: {:?}", tail(&buffer));
                    return Err(MulticomError::timeout(limit));
                }
            }
        }
    }

    /// Collect whatever arrives until the channel has been quiet for `quiet`
    async fn drain(&mut self, quiet: Duration) -> Result<String> {
        let mut buffer = String::new();
        loop {
            match timeout(quiet, self.next_output()).await {
                Ok(Ok(Some(chunk))) => buffer.push_str(&chunk),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(buffer),
            }
        }
    }

    /// Send an empty line and return the prompt the device answers with
    pub async fn find_prompt(&mut self, dialect: &Dialect, limit: Duration) -> Result<String> {
        self.write_line("").await?;
        let mut buffer = self
            .read_until(limit, |buf| last_line(buf).is_some_and(|l| dialect.is_prompt(l)))
            .await?;
        // Banners and repeated prompts can trail the first match
        buffer.push_str(&self.drain(PROMPT_SETTLE).await?);

        last_line(&buffer)
            .filter(|l| dialect.is_prompt(l))
            .map(|l| l.trim().to_string())
            .ok_or_else(|| MulticomError::connection(&self.host, "No prompt received"))
    }

    /// Run one command and return its cleaned output
    ///
    /// Output carrying one of the dialect's error markers becomes
    /// `MulticomError::Command` with the offending line.
    pub async fn run_command(
        &mut self,
        command: &str,
        dialect: &Dialect,
        base_prompt: &str,
        limit: Duration,
    ) -> Result<String> {
        self.write_line(command).await?;
        let raw = self
            .read_until(limit, |buf| ends_with_prompt(buf, dialect, base_prompt))
            .await?;
        let output = clean_output(&raw, command, dialect, base_prompt);

        if let Some(line) = dialect.command_error(&output) {
            debug!(host = %self.host, "Device rejected '{}': {}", command, line);
            return Err(MulticomError::command(line));
        }
        Ok(output)
    }

    pub async fn close(mut self) {
        self.transport.shutdown().await;
    }
}

/// Last non-blank line of `buffer`
fn last_line(buffer: &str) -> Option<&str> {
    buffer.lines().rev().find(|l| !l.trim().is_empty())
}

/// Whether the buffer ends in this device's prompt
pub fn ends_with_prompt(buffer: &str, dialect: &Dialect, base_prompt: &str) -> bool {
    last_line(buffer)
        .map(str::trim)
        .is_some_and(|l| l.starts_with(base_prompt) && dialect.is_prompt(l))
}

/// Strip the command echo and trailing prompt from raw shell output
pub fn clean_output(raw: &str, command: &str, dialect: &Dialect, base_prompt: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "");
    let mut lines: Vec<&str> = normalized.lines().collect();

    if let Some(first) = lines.first() {
        if !command.is_empty() && first.contains(command) {
            lines.remove(0);
        }
    }

    while let Some(last) = lines.last() {
        let trimmed = last.trim();
        if trimmed.is_empty() || (trimmed.starts_with(base_prompt) && dialect.is_prompt(trimmed)) {
            lines.pop();
        } else {
            break;
        }
    }

    lines.join("\n")
}

/// Remove ANSI CSI escape sequences (`ESC [ ... final-byte`)
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for n in chars.by_ref() {
                    if ('@'..='~').contains(&n) {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }

    out
}

fn tail(buffer: &str) -> &str {
    let start = buffer
        .char_indices()
        .rev()
        .nth(79)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &buffer[start..]
}
