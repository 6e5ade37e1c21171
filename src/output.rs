//! Result sink: writes a finished run to disk
//!
//! Layout under the output directory:
//!
//! ```text
//! <outpath>/<host>/01.txt      "Output of command <cmd>:" + blank line + output
//! <outpath>/<host>/02.txt
//! <outpath>/<host>/ERROR.txt   only for devices that did not succeed
//! <outpath>/summary.json       optional, the whole FleetResult
//! ```
//!
//! A device whose directory name is already taken (listed twice, or two
//! hosts sanitizing to the same name) gets `_<position>` appended, its
//! 1-based position in the inventory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::collector::{DeviceResult, FleetResult};
use crate::error::{MulticomError, Result};
use crate::session::CommandResult;

/// Write every device's results below `outpath`; returns the files written
pub async fn write_fleet_result(
    outpath: &Path,
    fleet: &FleetResult,
    json_summary: bool,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(outpath).await?;
    let mut written = Vec::new();

    let mut taken = HashSet::new();
    for (index, device) in fleet.iter().enumerate() {
        let mut name = safe_file_name(&device.device.host);
        if !taken.insert(name.clone()) {
            name = format!("{}_{}", name, index + 1);
            while !taken.insert(name.clone()) {
                name.push('_');
            }
            warn!(host = %device.device.host, "Directory name taken, writing to {}", name);
        }
        written.extend(write_device_result(&outpath.join(name), device).await?);
    }

    if json_summary {
        let path = outpath.join("summary.json");
        let json = serde_json::to_string_pretty(fleet)
            .map_err(|e| MulticomError::Io(std::io::Error::other(e)))?;
        fs::write(&path, json).await?;
        written.push(path);
    }

    info!(
        files = written.len(),
        "Results written to {}",
        outpath.display()
    );
    Ok(written)
}

async fn write_device_result(dir: &Path, device: &DeviceResult) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).await?;

    if !device.outcome.is_success() {
        let path = dir.join("ERROR.txt");
        let body = format!(
            "Device {} ({}): {:?}\n{}\n",
            device.device.host,
            device.device.kind,
            device.outcome,
            device.cause.as_deref().unwrap_or("")
        );
        fs::write(&path, body).await?;
        return Ok(vec![path]);
    }

    let mut written = Vec::with_capacity(device.results.len());
    for (index, result) in device.results.iter().enumerate() {
        let path = dir.join(format!("{:02}.txt", index + 1));
        fs::write(&path, render_command(result)).await?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn render_command(result: &CommandResult) -> String {
    match &result.error {
        None => format!("Output of command {}:\n\n{}\n", result.command, result.output),
        Some(error) => format!("Output of command {}:\n\nFAILED: {}\n", result.command, error),
    }
}

/// Host names and addresses as directory names (IPv6 colons, slashes)
fn safe_file_name(host: &str) -> String {
    if host == "." || host == ".." {
        return "_".to_string();
    }
    host.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}
