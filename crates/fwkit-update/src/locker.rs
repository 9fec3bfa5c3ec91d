//! Per-physical-device exclusion
//!
//! At most one plan may drive a physical device at a time. A second request
//! for a held device fails with [`UpdateError::Busy`] instead of waiting.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{UpdateError, UpdateResult};

/// Set of physical devices currently being updated.
#[derive(Debug, Clone, Default)]
pub struct DeviceLocker {
    held: Arc<Mutex<HashSet<String>>>,
}

impl DeviceLocker {
    /// An empty locker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `device` until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Busy`] if the device is already held.
    pub fn try_lock(&self, device: &str) -> UpdateResult<DeviceLock> {
        let mut held = self.held.lock();
        if !held.insert(device.to_string()) {
            return Err(UpdateError::Busy(device.to_string()));
        }
        debug!(device, "device locked for update");
        Ok(DeviceLock {
            device: device.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    /// Whether `device` is held.
    pub fn is_locked(&self, device: &str) -> bool {
        self.held.lock().contains(device)
    }

    /// Number of held devices.
    pub fn active(&self) -> usize {
        self.held.lock().len()
    }
}

/// Releases its device on drop.
#[derive(Debug)]
pub struct DeviceLock {
    device: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl DeviceLock {
    /// The held device.
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Drop for DeviceLock {
    fn drop(&mut self) {
        self.held.lock().remove(&self.device);
        debug!(device = %self.device, "device lock released");
    }
}
