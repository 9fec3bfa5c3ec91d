//! In-memory flash device with failure injection
//!
//! Useful for exercising update plans without hardware. Flash starts
//! zeroed so an erase is observable.

use bytes::Bytes;
use fwkit_errors::DeviceError;
use tracing::trace;

use crate::backend::{DeviceBackend, DeviceInfo};
use crate::phase::UpdatePhase;

/// Backend operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `detach`
    Detach,
    /// `is_unlocked`
    Unlock,
    /// `erase`
    Erase,
    /// `write`
    Write,
    /// `read`
    Read,
    /// `attach`
    Attach,
    /// `reload`
    Reload,
    /// `recover`
    Recover,
}

impl MockOp {
    /// The operation that dominates `phase`.
    pub fn for_phase(phase: UpdatePhase) -> Option<MockOp> {
        match phase {
            UpdatePhase::Detaching => Some(MockOp::Detach),
            UpdatePhase::Erasing => Some(MockOp::Erase),
            UpdatePhase::Writing => Some(MockOp::Write),
            UpdatePhase::Verifying => Some(MockOp::Read),
            UpdatePhase::Attaching => Some(MockOp::Attach),
            UpdatePhase::Reloading => Some(MockOp::Reload),
            UpdatePhase::Idle | UpdatePhase::Done | UpdatePhase::Failed => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Failure {
    op: MockOp,
    /// Fail only this call (zero-based); every call when `None`
    nth: Option<u32>,
    error: DeviceError,
}

/// A simulated device.
#[derive(Debug, Clone)]
pub struct MockBackend {
    id: String,
    info: DeviceInfo,
    flash: Vec<u8>,
    failures: Vec<Failure>,
    transient_write_failures: u32,
    corrupt_readback: bool,
    unlock_after_polls: u32,
    detached: bool,
    calls: Vec<MockOp>,
}

impl MockBackend {
    /// A device with zeroed flash.
    pub fn new(id: impl Into<String>, info: DeviceInfo) -> Self {
        Self {
            id: id.into(),
            info,
            flash: vec![0; info.max_firmware_size],
            failures: Vec::new(),
            transient_write_failures: 0,
            corrupt_readback: false,
            unlock_after_polls: 0,
            detached: false,
            calls: Vec::new(),
        }
    }

    /// Fail every call of `op`.
    pub fn with_failure(mut self, op: MockOp, error: DeviceError) -> Self {
        self.failures.push(Failure { op, nth: None, error });
        self
    }

    /// Fail only the `nth` call (zero-based) of `op`.
    pub fn with_failure_at(mut self, op: MockOp, nth: u32, error: DeviceError) -> Self {
        self.failures.push(Failure {
            op,
            nth: Some(nth),
            error,
        });
        self
    }

    /// Fail every call of the operation behind `phase`.
    pub fn with_phase_failure(self, phase: UpdatePhase, error: DeviceError) -> Self {
        match MockOp::for_phase(phase) {
            Some(op) => self.with_failure(op, error),
            None => self,
        }
    }

    /// Fail the first `count` writes with a retryable I/O error.
    pub fn with_transient_write_failures(mut self, count: u32) -> Self {
        self.transient_write_failures = count;
        self
    }

    /// Flip the first byte of every read.
    pub fn with_corrupt_readback(mut self) -> Self {
        self.corrupt_readback = true;
        self
    }

    /// Report locked for the first `polls` unlock polls.
    pub fn with_unlock_after(mut self, polls: u32) -> Self {
        self.unlock_after_polls = polls;
        self
    }

    /// Current flash contents.
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Every backend call, in order.
    pub fn calls(&self) -> &[MockOp] {
        &self.calls
    }

    /// Number of calls of `op`.
    pub fn count(&self, op: MockOp) -> usize {
        self.calls.iter().filter(|c| **c == op).count()
    }

    /// Whether the device is in bootloader mode.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    fn call(&mut self, op: MockOp) -> Result<(), DeviceError> {
        let nth = u32::try_from(self.count(op)).unwrap_or(u32::MAX);
        self.calls.push(op);
        let injected = self
            .failures
            .iter()
            .find(|f| f.op == op && f.nth.is_none_or(|n| n == nth));
        match injected {
            Some(f) => Err(f.error.clone()),
            None => Ok(()),
        }
    }

    fn range(&self, address: u64, len: usize) -> Result<core::ops::Range<usize>, DeviceError> {
        let invalid = || DeviceError::InvalidAddress {
            device: self.id.clone(),
            address,
            len,
        };
        let start = address
            .checked_sub(self.info.erase_address)
            .and_then(|o| usize::try_from(o).ok())
            .ok_or_else(invalid)?;
        let end = start.checked_add(len).ok_or_else(invalid)?;
        if end > self.flash.len() {
            return Err(invalid());
        }
        Ok(start..end)
    }

    fn store(&mut self, address: u64, data: &[u8]) -> Result<(), DeviceError> {
        let range = self.range(address, data.len())?;
        let slot = self.flash.get_mut(range).ok_or(DeviceError::InvalidAddress {
            device: self.id.clone(),
            address,
            len: data.len(),
        })?;
        slot.copy_from_slice(data);
        Ok(())
    }
}

impl DeviceBackend for MockBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> DeviceInfo {
        self.info
    }

    fn detach(&mut self) -> Result<(), DeviceError> {
        self.call(MockOp::Detach)?;
        self.detached = true;
        Ok(())
    }

    fn is_unlocked(&mut self) -> Result<bool, DeviceError> {
        self.call(MockOp::Unlock)?;
        let polls = u32::try_from(self.count(MockOp::Unlock)).unwrap_or(u32::MAX);
        Ok(polls > self.unlock_after_polls)
    }

    fn erase(&mut self, address: u64, len: usize, fill: u8) -> Result<(), DeviceError> {
        self.call(MockOp::Erase)?;
        trace!(address, len, "mock erase");
        self.store(address, &vec![fill; len])
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), DeviceError> {
        self.call(MockOp::Write)?;
        if self.transient_write_failures > 0 {
            self.transient_write_failures = self.transient_write_failures.saturating_sub(1);
            return Err(DeviceError::io(self.id.clone(), "transient write stall"));
        }
        trace!(address, len = data.len(), "mock write");
        self.store(address, data)
    }

    fn read(&mut self, address: u64, len: usize) -> Result<Bytes, DeviceError> {
        self.call(MockOp::Read)?;
        let range = self.range(address, len)?;
        let mut out = self.flash.get(range).unwrap_or_default().to_vec();
        if self.corrupt_readback
            && let Some(first) = out.first_mut()
        {
            *first = !*first;
        }
        Ok(Bytes::from(out))
    }

    fn attach(&mut self) -> Result<(), DeviceError> {
        self.call(MockOp::Attach)?;
        self.detached = false;
        Ok(())
    }

    fn reload(&mut self) -> Result<(), DeviceError> {
        self.call(MockOp::Reload)
    }

    fn recover(&mut self) -> Result<(), DeviceError> {
        self.call(MockOp::Recover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> MockBackend {
        MockBackend::new("mock0", DeviceInfo::new(16).with_erase_address(0x100))
    }

    #[test]
    fn test_write_then_read() -> Result<(), DeviceError> {
        let mut dev = device();
        dev.write(0x104, b"abcd")?;
        assert_eq!(dev.read(0x104, 4)?.as_ref(), b"abcd");
        assert_eq!(dev.flash().get(..4), Some(&[0u8; 4][..]));
        Ok(())
    }

    #[test]
    fn test_out_of_range_is_invalid_address() {
        let mut dev = device();
        assert!(matches!(
            dev.write(0x10E, b"abcd"),
            Err(DeviceError::InvalidAddress { .. })
        ));
        assert!(matches!(dev.read(0xFF, 1), Err(DeviceError::InvalidAddress { .. })));
    }

    #[test]
    fn test_failure_at_nth_call() -> Result<(), DeviceError> {
        let mut dev = device().with_failure_at(MockOp::Write, 1, DeviceError::io("mock0", "nak"));
        dev.write(0x100, b"a")?;
        assert!(dev.write(0x101, b"b").is_err());
        dev.write(0x101, b"b")?;
        assert_eq!(dev.count(MockOp::Write), 3);
        Ok(())
    }

    #[test]
    fn test_transient_failures_then_success() -> Result<(), DeviceError> {
        let mut dev = device().with_transient_write_failures(2);
        assert!(dev.write(0x100, b"a").is_err());
        assert!(dev.write(0x100, b"a").is_err());
        dev.write(0x100, b"a")?;
        Ok(())
    }

    #[test]
    fn test_unlock_after_polls() -> Result<(), DeviceError> {
        let mut dev = device().with_unlock_after(2);
        assert!(!dev.is_unlocked()?);
        assert!(!dev.is_unlocked()?);
        assert!(dev.is_unlocked()?);
        Ok(())
    }

    #[test]
    fn test_corrupt_readback_flips_first_byte() -> Result<(), DeviceError> {
        let mut dev = device().with_corrupt_readback();
        dev.write(0x100, &[0x0F, 0x0F])?;
        assert_eq!(dev.read(0x100, 2)?.as_ref(), &[0xF0, 0x0F]);
        Ok(())
    }
}
