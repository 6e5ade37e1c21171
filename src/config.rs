//! Configuration and CLI argument parsing for net-multicom

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{MulticomError, Result};
use crate::ssh::config::{
    SshSettings, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PORT,
};

/// net-multicom CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "net-multicom")]
#[command(version)]
#[command(
    about = "Run a list of read-only commands on every device of a YAML inventory over SSH"
)]
pub struct Args {
    /// Inventory YAML file with `nodes` and `command_list`
    #[arg(long, env = "NET_MULTICOM_INFILE")]
    pub infile: PathBuf,

    /// Directory receiving per-device output files
    #[arg(long, env = "NET_MULTICOM_OUTPATH")]
    pub outpath: PathBuf,

    /// Username to log into devices
    #[arg(long, env = "NET_MULTICOM_USERNAME")]
    pub username: String,

    /// Login (and enable) secret; prefer the environment variable
    #[arg(long, env = "NET_MULTICOM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Read the secret from the first line of stdin
    #[arg(long, default_value = "false", conflicts_with = "password")]
    pub password_stdin: bool,

    /// Default SSH port (a node's `port` overrides it)
    #[arg(long, default_value_t = DEFAULT_PORT, env = "NET_MULTICOM_PORT")]
    pub port: u16,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "NET_MULTICOM_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Per-command timeout in seconds
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS, env = "NET_MULTICOM_COMMAND_TIMEOUT")]
    pub command_timeout: u64,

    /// Number of devices processed at once (1 = one after another)
    #[arg(long, default_value = "1", env = "NET_MULTICOM_WORKERS")]
    pub workers: usize,

    /// Extra deny-list token (repeatable)
    #[arg(long = "deny", value_name = "TOKEN")]
    pub deny: Vec<String>,

    /// Also write summary.json
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

/// Where the secret comes from
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordSource {
    Value(String),
    Stdin,
}

impl std::fmt::Debug for PasswordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordSource::Value(_) => f.write_str("Value([REDACTED])"),
            PasswordSource::Stdin => f.write_str("Stdin"),
        }
    }
}

/// Parsed and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub infile: PathBuf,

    pub outpath: PathBuf,

    pub username: String,

    pub password: PasswordSource,

    pub ssh: SshSettings,

    pub workers: usize,

    /// Extra deny-list tokens on top of the defaults
    pub deny: Vec<String>,

    pub json: bool,

    pub verbose: bool,
}

impl Config {
    /// Create Config from CLI Args
    pub fn from_args(args: Args) -> Result<Self> {
        validate_args(&args)?;

        let password = match args.password.filter(|p| !p.is_empty()) {
            Some(value) => PasswordSource::Value(value),
            None => PasswordSource::Stdin,
        };

        let ssh = SshSettings::default()
            .with_port(args.port)
            .with_connect_timeout(Duration::from_secs(args.connect_timeout))
            .with_command_timeout(Duration::from_secs(args.command_timeout));

        Ok(Config {
            infile: args.infile,
            outpath: args.outpath,
            username: args.username.trim().to_string(),
            password,
            ssh,
            workers: args.workers,
            deny: args.deny,
            json: args.json,
            verbose: args.verbose,
        })
    }
}

/// Validate CLI arguments
fn validate_args(args: &Args) -> Result<()> {
    let mut errors = Vec::new();

    if args.username.trim().is_empty() {
        errors.push("Missing required --username".to_string());
    }

    let has_password = args.password.as_deref().is_some_and(|p| !p.is_empty());
    if !has_password && !args.password_stdin {
        errors.push("Must provide NET_MULTICOM_PASSWORD, --password or --password-stdin".to_string());
    }

    if args.workers == 0 {
        errors.push("--workers must be at least 1".to_string());
    }

    if args.connect_timeout == 0 {
        errors.push("--connect-timeout must be positive".to_string());
    }

    if args.command_timeout == 0 {
        errors.push("--command-timeout must be positive".to_string());
    }

    if !args.infile.exists() {
        errors.push(format!("Inventory file not found: {}", args.infile.display()));
    }

    if !errors.is_empty() {
        return Err(MulticomError::config(errors.join("\n")));
    }

    Ok(())
}

/// Read a secret from the first line of `reader`, without its line ending
pub fn read_secret_line<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();

    if secret.is_empty() {
        return Err(MulticomError::config("Empty password on stdin"));
    }
    Ok(secret)
}
