//! Fleet orchestration
//!
//! A run sanitizes the command list once, then processes every device in
//! the inventory: open a session, check it answers, elevate where the device
//! kind needs it, execute the command list, de-elevate and close. Failures
//! below the device boundary become a [`DeviceResult`] outcome and never
//! affect sibling devices; only a rejected command list aborts the run.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collector::{DeviceOutcome, DeviceResult, FleetResult, ResultCollector};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::inventory::DeviceDescriptor;
use crate::session::{execute, DeviceSession, SessionProvider};
use crate::ssh::CommandSanitizer;

/// Drives one fleet run over a [`SessionProvider`]
pub struct FleetOrchestrator {
    provider: Arc<dyn SessionProvider>,
    sanitizer: CommandSanitizer,
    workers: usize,
    cancel: CancellationToken,
}

impl FleetOrchestrator {
    /// Sequential orchestrator with the default deny-list
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            provider,
            sanitizer: CommandSanitizer::default(),
            workers: 1,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: CommandSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Process up to `workers` devices at once; 1 keeps the run strictly sequential
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Token that cancels the run when triggered
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `commands` on every device in `inventory`
    ///
    /// Fails only with `MulticomError::RejectedCommand`, before any device is
    /// contacted. Otherwise the returned [`FleetResult`] has one entry per
    /// inventory device, in inventory order.
    pub async fn run(
        &self,
        inventory: &[DeviceDescriptor],
        commands: &[String],
        credentials: &Credentials,
    ) -> Result<FleetResult> {
        if let Err(e) = self.sanitizer.sanitize(commands) {
            error!("{}; no device contacted", e);
            return Err(e);
        }

        info!(
            devices = inventory.len(),
            commands = commands.len(),
            workers = self.workers,
            "Starting fleet run"
        );

        let fleet = if self.workers == 1 {
            self.run_sequential(inventory, commands, credentials).await
        } else {
            self.run_concurrent(inventory, commands, credentials).await
        };

        info!(
            succeeded = fleet.succeeded(),
            failed = fleet.failed(),
            "Fleet run completed"
        );
        Ok(fleet)
    }

    async fn run_sequential(
        &self,
        inventory: &[DeviceDescriptor],
        commands: &[String],
        credentials: &Credentials,
    ) -> FleetResult {
        let mut collector = ResultCollector::new(inventory.len());

        for (index, device) in inventory.iter().enumerate() {
            let result = if self.cancel.is_cancelled() {
                cancelled(device)
            } else {
                process_device(
                    self.provider.as_ref(),
                    device,
                    commands,
                    credentials,
                    &self.cancel,
                )
                .await
            };
            collector.insert(index, result);
        }

        collector.finish()
    }

    async fn run_concurrent(
        &self,
        inventory: &[DeviceDescriptor],
        commands: &[String],
        credentials: &Credentials,
    ) -> FleetResult {
        let mut collector = ResultCollector::new(inventory.len());
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let commands: Arc<[String]> = commands.into();
        let credentials = Arc::new(credentials.clone());

        let mut handles = Vec::with_capacity(inventory.len());
        for (index, device) in inventory.iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let commands = Arc::clone(&commands);
            let credentials = Arc::clone(&credentials);
            let cancel = self.cancel.clone();
            let task_device = device.clone();

            let handle = tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return cancelled(&task_device),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return cancelled(&task_device),
                    },
                };
                process_device(
                    provider.as_ref(),
                    &task_device,
                    &commands,
                    &credentials,
                    &cancel,
                )
                .await
            });
            handles.push((index, device, handle));
        }

        for (index, device, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(host = %device.host, "Device task failed: {}", e);
                    DeviceResult::failed(
                        device.clone(),
                        DeviceOutcome::Aborted,
                        format!("device task failed: {}", e),
                    )
                }
            };
            collector.insert(index, result);
        }

        collector.finish()
    }
}

fn cancelled(device: &DeviceDescriptor) -> DeviceResult {
    DeviceResult::failed(device.clone(), DeviceOutcome::Cancelled, "run cancelled")
}

/// Process one device end to end
///
/// Once `open` succeeds the session is closed exactly once, whatever happens
/// afterwards, including a panic or this future being dropped.
pub async fn process_device(
    provider: &dyn SessionProvider,
    device: &DeviceDescriptor,
    commands: &[String],
    credentials: &Credentials,
    cancel: &CancellationToken,
) -> DeviceResult {
    let session = match provider.open(device, credentials).await {
        Ok(session) => session,
        Err(e) => {
            warn!(host = %device.host, "Skipping device, no connection established: {}", e);
            return DeviceResult::failed(device.clone(), DeviceOutcome::ConnectionFailed, e.to_string());
        }
    };

    let mut guard = OpenSession::new(session);
    let result = match guard.session() {
        Some(session) => drive_session(session, device, commands, cancel).await,
        None => DeviceResult::failed(
            device.clone(),
            DeviceOutcome::ConnectionFailed,
            "session closed before use",
        ),
    };
    guard.close().await;
    result
}

/// Owns an open session until it is closed
///
/// If the owning future is dropped or unwinds first, the session is closed
/// on a background task instead.
struct OpenSession {
    session: Option<Box<dyn DeviceSession>>,
}

impl OpenSession {
    fn new(session: Box<dyn DeviceSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn session(&mut self) -> Option<&mut (dyn DeviceSession + 'static)> {
        self.session.as_deref_mut()
    }

    async fn close(mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let host = session.device().host.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(host = %host, "Device processing interrupted, closing session");
                runtime.spawn(async move { session.close().await });
            }
            Err(_) => warn!(host = %host, "No runtime left to close session"),
        }
    }
}

async fn drive_session(
    session: &mut dyn DeviceSession,
    device: &DeviceDescriptor,
    commands: &[String],
    cancel: &CancellationToken,
) -> DeviceResult {
    if !session.verify_live().await {
        warn!(host = %device.host, "Connection failed to node, no prompt");
        return DeviceResult::failed(
            device.clone(),
            DeviceOutcome::LivenessFailed,
            "device did not answer the prompt probe",
        );
    }

    if device.kind.requires_elevation() {
        if let Err(e) = session.elevate().await {
            warn!(host = %device.host, "Elevation failed: {}", e);
            leave_privileged(session, device).await;
            return DeviceResult::failed(device.clone(), DeviceOutcome::ElevationFailed, e.to_string());
        }
    }

    info!(host = %device.host, "Executing commands");
    let results = execute(session, commands, cancel).await;
    leave_privileged(session, device).await;

    let failed = results.iter().filter(|r| !r.succeeded()).count();
    if failed > 0 {
        warn!(host = %device.host, failed, "Some commands failed");
    }
    DeviceResult::success(device.clone(), results)
}

async fn leave_privileged(session: &mut dyn DeviceSession, device: &DeviceDescriptor) {
    if let Err(e) = session.de_elevate().await {
        warn!(host = %device.host, "Failed to leave privileged mode: {}", e);
    }
}
