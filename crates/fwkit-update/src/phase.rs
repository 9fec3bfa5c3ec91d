//! Update phases and the strict transition machine

use core::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{UpdateError, UpdateResult};

/// Phases of a device update, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum UpdatePhase {
    /// Plan created, device untouched
    #[default]
    Idle,
    /// Switching the device into its bootloader
    Detaching,
    /// Blank-filling the flash range
    Erasing,
    /// Writing firmware chunks
    Writing,
    /// Reading chunks back and comparing
    Verifying,
    /// Returning the device to runtime mode
    Attaching,
    /// Letting the caller refresh device metadata
    Reloading,
    /// Update completed
    Done,
    /// Update stopped; terminal
    Failed,
}

impl UpdatePhase {
    /// The forward sequence from `Idle` to `Done`.
    pub const SEQUENCE: [UpdatePhase; 8] = [
        UpdatePhase::Idle,
        UpdatePhase::Detaching,
        UpdatePhase::Erasing,
        UpdatePhase::Writing,
        UpdatePhase::Verifying,
        UpdatePhase::Attaching,
        UpdatePhase::Reloading,
        UpdatePhase::Done,
    ];

    /// The phase that follows this one on success.
    pub fn next(self) -> Option<UpdatePhase> {
        match self {
            UpdatePhase::Idle => Some(UpdatePhase::Detaching),
            UpdatePhase::Detaching => Some(UpdatePhase::Erasing),
            UpdatePhase::Erasing => Some(UpdatePhase::Writing),
            UpdatePhase::Writing => Some(UpdatePhase::Verifying),
            UpdatePhase::Verifying => Some(UpdatePhase::Attaching),
            UpdatePhase::Attaching => Some(UpdatePhase::Reloading),
            UpdatePhase::Reloading => Some(UpdatePhase::Done),
            UpdatePhase::Done | UpdatePhase::Failed => None,
        }
    }

    /// Check if no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, UpdatePhase::Done | UpdatePhase::Failed)
    }

    /// Check if a failure in this phase may have left flash partially written.
    ///
    /// Erasing does not count; no image byte reaches flash before `Writing`.
    pub fn modifies_device(self) -> bool {
        matches!(
            self,
            UpdatePhase::Writing
                | UpdatePhase::Verifying
                | UpdatePhase::Attaching
                | UpdatePhase::Reloading
        )
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::Detaching => "detaching",
            UpdatePhase::Erasing => "erasing",
            UpdatePhase::Writing => "writing",
            UpdatePhase::Verifying => "verifying",
            UpdatePhase::Attaching => "attaching",
            UpdatePhase::Reloading => "reloading",
            UpdatePhase::Done => "done",
            UpdatePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current phase and every phase entered.
///
/// Only the next phase in [`UpdatePhase::SEQUENCE`] or `Failed` can be
/// entered, and nothing leaves a terminal phase.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: UpdatePhase,
    failed_in: Option<UpdatePhase>,
    trace: Vec<UpdatePhase>,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMachine {
    /// A machine in `Idle`.
    pub fn new() -> Self {
        Self {
            phase: UpdatePhase::Idle,
            failed_in: None,
            trace: vec![UpdatePhase::Idle],
        }
    }

    /// Current phase.
    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Phase that was active when the machine failed.
    pub fn failed_in(&self) -> Option<UpdatePhase> {
        self.failed_in
    }

    /// Every phase entered, starting with `Idle`.
    pub fn trace(&self) -> &[UpdatePhase] {
        &self.trace
    }

    /// Enter `to`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidTransition`] unless `to` is the next
    /// phase, or `Failed` from a non-terminal phase.
    pub fn advance(&mut self, to: UpdatePhase) -> UpdateResult<()> {
        let allowed = if to == UpdatePhase::Failed {
            !self.phase.is_terminal()
        } else {
            self.phase.next() == Some(to)
        };
        if !allowed {
            return Err(UpdateError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        info!(from = %self.phase, to = %to, "update phase transition");
        if to == UpdatePhase::Failed {
            self.failed_in = Some(self.phase);
        }
        self.phase = to;
        self.trace.push(to);
        Ok(())
    }

    /// Enter the next phase in sequence.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidTransition`] from a terminal phase.
    pub fn advance_next(&mut self) -> UpdateResult<UpdatePhase> {
        let to = self.phase.next().ok_or(UpdateError::InvalidTransition {
            from: self.phase,
            to: self.phase,
        })?;
        self.advance(to)?;
        Ok(to)
    }

    /// Enter `Failed`. Does nothing if the machine is already terminal.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.failed_in = Some(self.phase);
            info!(from = %self.phase, "update phase transition to failed");
            self.phase = UpdatePhase::Failed;
            self.trace.push(UpdatePhase::Failed);
        }
    }
}
