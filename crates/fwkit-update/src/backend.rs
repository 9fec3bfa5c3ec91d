//! Device I/O backend interface
//!
//! The update engine drives a device only through [`DeviceBackend`]. A
//! backend hides its transport (USB, HID, I2C, sysfs) and reports failures
//! as [`DeviceError`]. Every call blocks until the device answers or the
//! backend's own timeout expires.

use bytes::Bytes;
use fwkit_errors::DeviceError;
use serde::{Deserialize, Serialize};

/// Per-device-kind parameters reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Size of the updatable flash range in bytes
    pub max_firmware_size: usize,
    /// Erase page size; chunks never cross a page edge. Zero for none.
    pub page_size: u32,
    /// Largest single transfer; zero for unbounded
    pub transfer_size: usize,
    /// First address of the flash range
    pub erase_address: u64,
    /// Detach needs an out-of-band user confirmation
    pub needs_user_unlock: bool,
}

impl DeviceInfo {
    /// Info for a flash range of `max_firmware_size` bytes at address zero.
    pub fn new(max_firmware_size: usize) -> Self {
        Self {
            max_firmware_size,
            page_size: 0,
            transfer_size: 0,
            erase_address: 0,
            needs_user_unlock: false,
        }
    }

    /// Set the erase page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the transfer size.
    pub fn with_transfer_size(mut self, transfer_size: usize) -> Self {
        self.transfer_size = transfer_size;
        self
    }

    /// Set the first flash address.
    pub fn with_erase_address(mut self, erase_address: u64) -> Self {
        self.erase_address = erase_address;
        self
    }

    /// Require a user unlock after detach.
    pub fn with_user_unlock(mut self) -> Self {
        self.needs_user_unlock = true;
        self
    }

    /// One past the last flash address.
    pub fn end_address(&self) -> u64 {
        self.erase_address.saturating_add(self.max_firmware_size as u64)
    }
}

/// Blocking operations a device must support to be updated.
pub trait DeviceBackend {
    /// Stable device identifier, used for locking.
    fn id(&self) -> &str;

    /// Device parameters.
    fn info(&self) -> DeviceInfo;

    /// Switch into bootloader mode.
    fn detach(&mut self) -> Result<(), DeviceError>;

    /// Whether the user has confirmed the unlock. Only polled when
    /// [`DeviceInfo::needs_user_unlock`] is set.
    fn is_unlocked(&mut self) -> Result<bool, DeviceError> {
        Ok(true)
    }

    /// Blank `len` bytes at `address` with `fill`.
    fn erase(&mut self, address: u64, len: usize, fill: u8) -> Result<(), DeviceError> {
        self.write(address, &vec![fill; len])
    }

    /// Write `data` at `address`.
    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), DeviceError>;

    /// Read `len` bytes at `address`.
    fn read(&mut self, address: u64, len: usize) -> Result<Bytes, DeviceError>;

    /// Return to runtime mode.
    fn attach(&mut self) -> Result<(), DeviceError>;

    /// Let new firmware take effect and refresh metadata.
    fn reload(&mut self) -> Result<(), DeviceError>;

    /// Device-specific recovery, run between retries of a failed operation.
    fn recover(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

impl<B: DeviceBackend + ?Sized> DeviceBackend for Box<B> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn info(&self) -> DeviceInfo {
        (**self).info()
    }

    fn detach(&mut self) -> Result<(), DeviceError> {
        (**self).detach()
    }

    fn is_unlocked(&mut self) -> Result<bool, DeviceError> {
        (**self).is_unlocked()
    }

    fn erase(&mut self, address: u64, len: usize, fill: u8) -> Result<(), DeviceError> {
        (**self).erase(address, len, fill)
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), DeviceError> {
        (**self).write(address, data)
    }

    fn read(&mut self, address: u64, len: usize) -> Result<Bytes, DeviceError> {
        (**self).read(address, len)
    }

    fn attach(&mut self) -> Result<(), DeviceError> {
        (**self).attach()
    }

    fn reload(&mut self) -> Result<(), DeviceError> {
        (**self).reload()
    }

    fn recover(&mut self) -> Result<(), DeviceError> {
        (**self).recover()
    }
}
