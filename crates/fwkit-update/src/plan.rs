//! Device update plan
//!
//! A plan drives one device through detach, erase, write, verify, attach
//! and reload, in that order and without overlap. Any failure moves the plan
//! to [`UpdatePhase::Failed`] and stops it. Flash content is never rolled
//! back: an outcome whose [`DeviceState`] is `Unsafe` means the device may
//! be in an indeterminate state and must stay powered.

use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use fwkit_errors::DeviceError;
use fwkit_firmware::{ChunkSequence, Firmware, split};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::backend::{DeviceBackend, DeviceInfo};
use crate::cancel::CancelToken;
use crate::config::UpdateConfig;
use crate::error::{UpdateError, UpdateResult};
use crate::phase::{PhaseMachine, UpdatePhase};
use crate::progress::{ProgressSink, ProgressTracker};
use crate::retry::{retry, retry_with};

/// Condition of the device after a plan ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Flash untouched, or the update completed
    Safe,
    /// Flash may be partially erased or written
    Unsafe,
}

/// Result of executing a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Device that was updated
    pub device_id: String,
    /// Last phase entered before the plan ended: `Done` on success, the
    /// failing phase otherwise
    pub phase_reached: UpdatePhase,
    /// Why the plan stopped, or `Ok`
    pub result: UpdateResult<()>,
    /// Condition of the device
    pub device_state: DeviceState,
    /// Every phase entered, starting with `Idle` and ending terminal
    pub trace: Vec<UpdatePhase>,
    /// Firmware bytes written to the device
    pub bytes_written: u64,
}

impl UpdateOutcome {
    /// Outcome for a plan that was refused before touching the device.
    pub fn rejected(device_id: impl Into<String>, error: UpdateError) -> Self {
        Self {
            device_id: device_id.into(),
            phase_reached: UpdatePhase::Idle,
            result: Err(error),
            device_state: DeviceState::Safe,
            trace: vec![UpdatePhase::Idle, UpdatePhase::Failed],
            bytes_written: 0,
        }
    }

    /// Whether the plan reached `Done`.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether the plan failed because the device went away, as opposed to
    /// rejecting an operation.
    pub fn device_lost(&self) -> bool {
        self.result
            .as_ref()
            .err()
            .and_then(UpdateError::device_error)
            .is_some_and(DeviceError::is_device_unavailable)
    }

    /// Terminal phase of the plan.
    pub fn final_phase(&self) -> UpdatePhase {
        self.trace.last().copied().unwrap_or_default()
    }

    /// Convert into the plan's result.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the plan.
    pub fn into_result(self) -> UpdateResult<()> {
        self.result
    }
}

/// One update of one device.
pub struct UpdatePlan<'a> {
    backend: &'a mut dyn DeviceBackend,
    firmware: &'a Firmware,
    config: &'a UpdateConfig,
    cancel: CancelToken,
    machine: PhaseMachine,
    bytes_written: u64,
}

impl<'a> UpdatePlan<'a> {
    /// Plan writing `firmware` to `backend`.
    ///
    /// The firmware is placed at [`Firmware::address`], or at the device's
    /// erase address when that is zero.
    pub fn new(backend: &'a mut dyn DeviceBackend, firmware: &'a Firmware, config: &'a UpdateConfig) -> Self {
        Self {
            backend,
            firmware,
            config,
            cancel: CancelToken::new(),
            machine: PhaseMachine::new(),
            bytes_written: 0,
        }
    }

    /// Observe `cancel` at phase boundaries and between chunks.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> UpdatePhase {
        self.machine.phase()
    }

    /// Run the plan to a terminal phase.
    pub fn execute(mut self, progress: &mut dyn ProgressSink) -> UpdateOutcome {
        let device_id = self.backend.id().to_string();
        let info = self.backend.info();
        let mut tracker = ProgressTracker::new(self.config.weights, progress);
        info!(
            device = %device_id,
            size = self.firmware.size(),
            max_firmware_size = info.max_firmware_size,
            "starting device update"
        );

        let result = self.run(&info, &mut tracker);
        let phase_reached = match &result {
            Ok(()) => {
                info!(device = %device_id, bytes = self.bytes_written, "device update complete");
                self.machine.phase()
            }
            Err(e) => {
                let phase = self.machine.phase();
                self.machine.fail();
                let unavailable = e.device_error().is_some_and(DeviceError::is_device_unavailable);
                error!(device = %device_id, phase = %phase, error = %e, unavailable, "device update failed");
                phase
            }
        };
        let device_state = match self.machine.failed_in() {
            Some(phase) if phase.modifies_device() => DeviceState::Unsafe,
            _ => DeviceState::Safe,
        };
        UpdateOutcome {
            device_id,
            phase_reached,
            result,
            device_state,
            trace: self.machine.trace().to_vec(),
            bytes_written: self.bytes_written,
        }
    }

    fn run(&mut self, info: &DeviceInfo, tracker: &mut ProgressTracker<'_>) -> UpdateResult<()> {
        self.config.validate()?;
        let chunks = self.prepare(info)?;

        self.enter(UpdatePhase::Detaching, tracker)?;
        self.detach(info)?;
        tracker.report(UpdatePhase::Detaching, 1, 1);

        self.enter(UpdatePhase::Erasing, tracker)?;
        self.erase(info, tracker)?;

        self.enter(UpdatePhase::Writing, tracker)?;
        self.write(&chunks, tracker)?;

        self.enter(UpdatePhase::Verifying, tracker)?;
        self.verify(&chunks, tracker)?;

        let policy = self.config.retry;
        self.enter(UpdatePhase::Attaching, tracker)?;
        retry_with(&policy, "attach", &mut *self.backend, |b| b.attach(), |b| b.recover())?;
        tracker.report(UpdatePhase::Attaching, 1, 1);

        self.enter(UpdatePhase::Reloading, tracker)?;
        retry_with(&policy, "reload", &mut *self.backend, |b| b.reload(), |b| b.recover())?;
        tracker.report(UpdatePhase::Reloading, 1, 1);

        self.machine.advance(UpdatePhase::Done)?;
        tracker.report(UpdatePhase::Done, 1, 1);
        Ok(())
    }

    fn enter(&mut self, phase: UpdatePhase, tracker: &mut ProgressTracker<'_>) -> UpdateResult<()> {
        self.cancel.check()?;
        self.machine.advance(phase)?;
        tracker.report(phase, 0, 1);
        Ok(())
    }

    /// Chunk the image, rejecting one that does not lie within the flash range.
    fn prepare(&self, info: &DeviceInfo) -> UpdateResult<ChunkSequence> {
        let data = self.firmware.bytes();
        let base = match self.firmware.address() {
            0 => info.erase_address,
            address => address,
        };
        if base < info.erase_address || base > info.end_address() {
            return Err(UpdateError::AddressOutOfRange {
                address: base,
                start: info.erase_address,
                end: info.end_address(),
            });
        }
        let fits = base
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= info.end_address());
        if !fits {
            return Err(UpdateError::FirmwareTooLarge {
                address: base,
                size: data.len(),
                max: info.max_firmware_size,
            });
        }
        let chunks = split(data, base, info.page_size, self.chunk_size(info));
        debug!(base, chunks = chunks.len(), "firmware chunked");
        Ok(chunks)
    }

    fn chunk_size(&self, info: &DeviceInfo) -> usize {
        self.config.max_chunk_size.unwrap_or(info.transfer_size)
    }

    fn detach(&mut self, info: &DeviceInfo) -> UpdateResult<()> {
        let policy = self.config.retry;
        retry_with(&policy, "detach", &mut *self.backend, |b| b.detach(), |b| b.recover())?;
        if info.needs_user_unlock {
            self.wait_for_unlock()?;
        }
        Ok(())
    }

    fn wait_for_unlock(&mut self) -> UpdateResult<()> {
        let policy = self.config.user_action;
        let timeout = Duration::from_millis(policy.timeout_ms);
        let started = Instant::now();
        info!(device = %self.backend.id(), timeout_ms = policy.timeout_ms, "waiting for user to unlock device");
        loop {
            if self.backend.is_unlocked()? {
                debug!(device = %self.backend.id(), "device unlocked");
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(UpdateError::UserActionTimeout {
                    device: self.backend.id().to_string(),
                    timeout_ms: policy.timeout_ms,
                });
            }
            self.cancel.check()?;
            thread::sleep(Duration::from_millis(policy.poll_interval_ms));
        }
    }

    /// Blank-fill the whole flash range.
    fn erase(&mut self, info: &DeviceInfo, tracker: &mut ProgressTracker<'_>) -> UpdateResult<()> {
        let policy = self.config.retry;
        let fill = self.config.blank_fill;
        let blank = Bytes::from(vec![fill; info.max_firmware_size]);
        let ranges = split(blank, info.erase_address, info.page_size, self.chunk_size(info));
        let total = ranges.total_len() as u64;
        let mut done = 0u64;
        for range in ranges.iter() {
            self.cancel.check()?;
            let (address, len) = (range.address(), range.len());
            trace!(address, len, "erasing");
            retry_with(
                &policy,
                "erase",
                &mut *self.backend,
                |b| b.erase(address, len, fill),
                |b| b.recover(),
            )?;
            done = done.saturating_add(len as u64);
            tracker.report(UpdatePhase::Erasing, done, total);
        }
        if ranges.is_empty() {
            tracker.report(UpdatePhase::Erasing, 0, 0);
        }
        Ok(())
    }

    fn write(&mut self, chunks: &ChunkSequence, tracker: &mut ProgressTracker<'_>) -> UpdateResult<()> {
        let policy = self.config.retry;
        let total = chunks.total_len() as u64;
        for chunk in chunks.iter() {
            self.cancel.check()?;
            trace!(idx = chunk.idx(), address = chunk.address(), len = chunk.len(), "writing chunk");
            retry_with(
                &policy,
                "write",
                &mut *self.backend,
                |b| b.write(chunk.address(), chunk.data()),
                |b| b.recover(),
            )?;
            self.bytes_written = self.bytes_written.saturating_add(chunk.len() as u64);
            tracker.report(UpdatePhase::Writing, self.bytes_written, total);
        }
        if chunks.is_empty() {
            tracker.report(UpdatePhase::Writing, 0, 0);
        }
        Ok(())
    }

    /// Read every chunk back and compare.
    fn verify(&mut self, chunks: &ChunkSequence, tracker: &mut ProgressTracker<'_>) -> UpdateResult<()> {
        if !self.config.verify || chunks.is_empty() {
            debug!("skipping read-back verification");
            tracker.report(UpdatePhase::Verifying, 0, 0);
            return Ok(());
        }
        let policy = self.config.retry;
        let total = chunks.total_len() as u64;
        let mut done = 0u64;
        for chunk in chunks.iter() {
            self.cancel.check()?;
            trace!(idx = chunk.idx(), address = chunk.address(), "verifying chunk");
            let readback = retry(&policy, "read", &mut *self.backend, |b| {
                b.read(chunk.address(), chunk.len())
            })?;
            if readback != *chunk.data() {
                return Err(UpdateError::VerifyMismatch {
                    address: chunk.address(),
                    len: chunk.len(),
                });
            }
            done = done.saturating_add(chunk.len() as u64);
            tracker.report(UpdatePhase::Verifying, done, total);
        }
        Ok(())
    }
}
