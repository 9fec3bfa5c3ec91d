//! Async entry point for running plans
//!
//! Plans are blocking. [`AsyncUpdateRunner`] moves each one onto tokio's
//! blocking pool and enforces one active plan per physical device, using a
//! [`DeviceRegistry`] to resolve proxied devices to the device they are
//! reached through.

use std::sync::Arc;

use anyhow::{Context, Result};
use fwkit_errors::ValidationError;
use fwkit_firmware::Firmware;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::backend::DeviceBackend;
use crate::cancel::CancelToken;
use crate::config::UpdateConfig;
use crate::error::UpdateResult;
use crate::locker::{DeviceLock, DeviceLocker};
use crate::plan::{UpdateOutcome, UpdatePlan};
use crate::progress::ProgressSink;
use crate::registry::DeviceRegistry;

/// Runs plans on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct AsyncUpdateRunner {
    config: Arc<UpdateConfig>,
    locker: DeviceLocker,
    registry: Arc<RwLock<DeviceRegistry>>,
}

impl AsyncUpdateRunner {
    /// A runner with an empty registry.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if `config` is invalid.
    pub fn new(config: UpdateConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            locker: DeviceLocker::new(),
            registry: Arc::new(RwLock::new(DeviceRegistry::new())),
        })
    }

    /// Use `registry` for proxy resolution.
    pub fn with_registry(self, registry: DeviceRegistry) -> Self {
        *self.registry.write() = registry;
        self
    }

    /// Register a directly reachable device.
    pub fn register_device(&self, device: impl Into<String>) {
        self.registry.write().register(device);
    }

    /// Register a device reached through `proxy`.
    ///
    /// # Errors
    ///
    /// See [`DeviceRegistry::register_proxied`].
    pub fn register_proxied(&self, device: impl Into<String>, proxy: &str) -> UpdateResult<()> {
        self.registry.write().register_proxied(device, proxy)
    }

    /// The locker shared by every plan this runner starts.
    pub fn locker(&self) -> &DeviceLocker {
        &self.locker
    }

    /// The configuration applied to every plan.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Lock the physical device behind `device`. Unregistered devices are
    /// their own physical device.
    fn lock(&self, device: &str) -> UpdateResult<DeviceLock> {
        let physical = {
            let registry = self.registry.read();
            if registry.contains(device) {
                registry.resolve(device)?
            } else {
                device.to_string()
            }
        };
        self.locker.try_lock(&physical)
    }

    /// Run a plan on the current thread.
    pub fn run_blocking(
        &self,
        backend: &mut dyn DeviceBackend,
        firmware: &Firmware,
        progress: &mut dyn ProgressSink,
        cancel: CancelToken,
    ) -> UpdateOutcome {
        let device = backend.id().to_string();
        let _lock = match self.lock(&device) {
            Ok(lock) => lock,
            Err(e) => {
                warn!(device = %device, error = %e, "update refused");
                return UpdateOutcome::rejected(device, e);
            }
        };
        UpdatePlan::new(backend, firmware, &self.config)
            .with_cancel(cancel)
            .execute(progress)
    }

    /// Run a plan on the blocking pool and hand the backend back.
    ///
    /// # Errors
    ///
    /// Fails only if the blocking task panicked or was aborted; plan
    /// failures are reported in the [`UpdateOutcome`].
    pub async fn run<B>(
        &self,
        mut backend: B,
        firmware: Arc<Firmware>,
        mut progress: Box<dyn ProgressSink>,
        cancel: CancelToken,
    ) -> Result<(UpdateOutcome, B)>
    where
        B: DeviceBackend + Send + 'static,
    {
        let runner = self.clone();
        let device = backend.id().to_string();
        info!(device = %device, "scheduling device update");
        tokio::task::spawn_blocking(move || {
            let outcome = runner.run_blocking(&mut backend, &firmware, progress.as_mut(), cancel);
            (outcome, backend)
        })
        .await
        .with_context(|| format!("update task for device {device} did not complete"))
    }

    /// Run a plan and treat any plan failure as an error.
    ///
    /// # Errors
    ///
    /// Returns the plan error, with the device and failing phase as context.
    pub async fn run_checked<B>(
        &self,
        backend: B,
        firmware: Arc<Firmware>,
        progress: Box<dyn ProgressSink>,
        cancel: CancelToken,
    ) -> Result<B>
    where
        B: DeviceBackend + Send + 'static,
    {
        let (outcome, backend) = self.run(backend, firmware, progress, cancel).await?;
        let device = outcome.device_id.clone();
        let phase = outcome.phase_reached;
        outcome
            .into_result()
            .with_context(|| format!("update of device {device} failed while {phase}"))?;
        Ok(backend)
    }
}
