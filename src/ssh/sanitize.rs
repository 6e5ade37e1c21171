//! Command-list sanitization
//!
//! Every run is a read-only run. Before any device is contacted the whole
//! command list is checked against a deny-list of substrings that denote
//! mutating or privileged operations; a single hit aborts the run.

use crate::error::{MulticomError, Result};

/// Tokens rejected by default
pub const DEFAULT_DENY_LIST: [&str; 4] = ["conf", "set", "delete", "modify"];

/// Deny-list gate for the command list
///
/// Matching is a case-insensitive substring test, so `"show running-config"`
/// is rejected by `"conf"` just like `"conf t"`.
///
/// # Examples
/// ```
/// use net_multicom::ssh::sanitize::CommandSanitizer;
///
/// let sanitizer = CommandSanitizer::default();
/// assert!(sanitizer.sanitize(&["show version".to_string()]).is_ok());
/// assert!(sanitizer.sanitize(&["conf t".to_string()]).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct CommandSanitizer {
    deny_list: Vec<String>,
}

impl Default for CommandSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_DENY_LIST.iter().map(|t| t.to_string()))
    }
}

impl CommandSanitizer {
    /// Build a sanitizer from an explicit deny-list
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        let deny_list = tokens
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { deny_list }
    }

    /// Default deny-list plus additional tokens
    pub fn with_extra_tokens(mut self, tokens: impl IntoIterator<Item = String>) -> Self {
        for token in tokens {
            let token = token.trim().to_lowercase();
            if !token.is_empty() && !self.deny_list.contains(&token) {
                self.deny_list.push(token);
            }
        }
        self
    }

    pub fn deny_list(&self) -> &[String] {
        &self.deny_list
    }

    /// Check every command against the deny-list
    ///
    /// Returns `MulticomError::RejectedCommand` for the first match, scanning
    /// deny-list tokens in order and, for each token, commands in list order.
    pub fn sanitize(&self, commands: &[String]) -> Result<()> {
        let lowered: Vec<String> = commands.iter().map(|c| c.to_lowercase()).collect();

        for token in &self.deny_list {
            if let Some(pos) = lowered.iter().position(|c| c.contains(token.as_str())) {
                return Err(MulticomError::RejectedCommand {
                    command: commands[pos].clone(),
                    matched_token: token.clone(),
                });
            }
        }

        Ok(())
    }
}
