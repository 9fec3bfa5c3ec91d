//! Device registry with proxy relationships
//!
//! Some devices are only reachable through another one, e.g. a
//! coprocessor flashed over its host's bus. Updates lock the physical
//! device at the end of the proxy chain, so a host and its proxied devices
//! are never written concurrently.

use std::collections::HashMap;

use fwkit_errors::ValidationError;
use tracing::debug;

use crate::error::{UpdateError, UpdateResult};

/// Known devices and the proxy each one is reached through.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, Option<String>>,
}

impl DeviceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directly reachable device. Re-registering clears its proxy.
    pub fn register(&mut self, device: impl Into<String>) {
        let device = device.into();
        debug!(device = %device, "device registered");
        self.devices.insert(device, None);
    }

    /// Add `device`, reached through the already registered `proxy`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::UnknownDevice`] if `proxy` is not registered,
    /// or a constraint violation if the link would form a cycle.
    pub fn register_proxied(&mut self, device: impl Into<String>, proxy: &str) -> UpdateResult<()> {
        let device = device.into();
        if !self.devices.contains_key(proxy) {
            return Err(UpdateError::UnknownDevice(proxy.to_string()));
        }
        if self.reaches(proxy, &device)? {
            return Err(ValidationError::constraint(format!(
                "proxy link {device} -> {proxy} forms a cycle"
            ))
            .into());
        }
        debug!(device = %device, proxy, "proxied device registered");
        self.devices.insert(device, Some(proxy.to_string()));
        Ok(())
    }

    /// Whether the chain starting at `from` passes through `target`.
    fn reaches(&self, from: &str, target: &str) -> UpdateResult<bool> {
        let mut current = from;
        for _ in 0..=self.devices.len() {
            if current == target {
                return Ok(true);
            }
            match self.devices.get(current) {
                None => return Err(UpdateError::UnknownDevice(current.to_string())),
                Some(None) => return Ok(false),
                Some(Some(proxy)) => current = proxy,
            }
        }
        Err(ValidationError::constraint(format!("proxy chain from {from} does not terminate")).into())
    }

    /// Drop `device`. Devices proxied through it become direct.
    pub fn remove(&mut self, device: &str) -> bool {
        let existed = self.devices.remove(device).is_some();
        for proxy in self.devices.values_mut() {
            if proxy.as_deref() == Some(device) {
                *proxy = None;
            }
        }
        existed
    }

    /// Whether `device` is registered.
    pub fn contains(&self, device: &str) -> bool {
        self.devices.contains_key(device)
    }

    /// The proxy `device` is reached through, if any.
    pub fn proxy_of(&self, device: &str) -> Option<&str> {
        self.devices.get(device)?.as_deref()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Follow proxy links from `device` to the physical device.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::UnknownDevice`] if `device` is not registered,
    /// or a constraint violation if the chain does not terminate.
    pub fn resolve(&self, device: &str) -> UpdateResult<String> {
        let mut current = device;
        for _ in 0..=self.devices.len() {
            match self.devices.get(current) {
                None => return Err(UpdateError::UnknownDevice(current.to_string())),
                Some(None) => return Ok(current.to_string()),
                Some(Some(proxy)) => current = proxy,
            }
        }
        Err(ValidationError::constraint(format!("proxy chain from {device} does not terminate")).into())
    }
}
