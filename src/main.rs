//! net-multicom - Entry point
//!
//! Parses CLI arguments, loads the inventory, runs the command list across
//! the fleet and writes the results. Exit status is 0 when the run completes
//! (even if some devices failed), 2 when the command list is rejected and 1
//! for any other error.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use net_multicom::config::{read_secret_line, Args, Config, PasswordSource};
use net_multicom::error::{MulticomError, Result};
use net_multicom::inventory::Inventory;
use net_multicom::orchestrator::FleetOrchestrator;
use net_multicom::output::write_fleet_result;
use net_multicom::ssh::{CommandSanitizer, SshSessionProvider};
use net_multicom::{Credentials, DeviceOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr; stdout only carries the final summary line
    let default_level = if args.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ MulticomError::RejectedCommand { .. }) => {
            error!("{}", e);
            eprintln!("BAD commands, exiting: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_args(args)?;

    info!("net-multicom v{} starting...", env!("CARGO_PKG_VERSION"));

    let secret = match &config.password {
        PasswordSource::Value(value) => value.clone(),
        PasswordSource::Stdin => read_secret_line(std::io::stdin().lock())?,
    };
    let credentials = Credentials::new(&config.username, secret);

    let inventory = Inventory::load(&config.infile).await?;
    info!(
        "Loaded {} nodes and {} commands from {}",
        inventory.nodes.len(),
        inventory.command_list.len(),
        config.infile.display()
    );

    let cancel = CancellationToken::new();
    let shutdown_handle = tokio::spawn(watch_signals(cancel.clone()));

    let provider = Arc::new(SshSessionProvider::new(config.ssh.clone()));
    let orchestrator = FleetOrchestrator::new(provider)
        .with_sanitizer(CommandSanitizer::default().with_extra_tokens(config.deny.clone()))
        .with_workers(config.workers)
        .with_cancellation(cancel);

    let result = orchestrator
        .run(&inventory.nodes, &inventory.command_list, &credentials)
        .await;
    shutdown_handle.abort();
    let fleet = result?;

    for device in fleet.iter() {
        match device.outcome {
            DeviceOutcome::Success => {}
            outcome => warn!(
                host = %device.device.host,
                "Skipped: {:?} ({})",
                outcome,
                device.cause.as_deref().unwrap_or("no cause")
            ),
        }
    }

    write_fleet_result(&config.outpath, &fleet, config.json).await?;

    println!(
        "{} of {} devices completed, results in {}",
        fleet.succeeded(),
        fleet.len(),
        config.outpath.display()
    );
    Ok(())
}

/// Cancel the run on Ctrl+C or SIGTERM
async fn watch_signals(cancel: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), closing open sessions...");
        }
        _ = sigterm() => {
            info!("Received SIGTERM, closing open sessions...");
        }
    }
    cancel.cancel();
}

#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
