//! Progress reporting
//!
//! A plan reports per-phase progress to a [`ProgressSink`]. The overall
//! percentage is weighted by [`PhaseWeights`] and never decreases across
//! phase transitions.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::PhaseWeights;
use crate::phase::UpdatePhase;

/// Progress information for a device update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current phase
    pub phase: UpdatePhase,
    /// Progress within the phase (0-100)
    pub phase_percent: u8,
    /// Weighted progress across the whole update (0-100)
    pub overall_percent: u8,
    /// Bytes handled in this phase so far
    pub bytes_done: u64,
    /// Bytes this phase will handle
    pub bytes_total: u64,
}

/// Receives progress updates. Called from the thread running the plan.
pub trait ProgressSink: Send {
    /// Handle one update.
    fn report(&mut self, update: &ProgressUpdate);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _update: &ProgressUpdate) {}
}

/// Keeps every update, for inspection after the plan finishes.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    updates: Vec<ProgressUpdate>,
}

impl RecordingProgress {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates received so far.
    pub fn updates(&self) -> &[ProgressUpdate] {
        &self.updates
    }

    /// Last overall percentage reported, or 0.
    pub fn last_overall(&self) -> u8 {
        self.updates.last().map_or(0, |u| u.overall_percent)
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&mut self, update: &ProgressUpdate) {
        self.updates.push(*update);
    }
}

/// Forwards updates over a bounded channel without blocking the plan.
///
/// Updates are dropped while the channel is full; a consumer that falls
/// behind sees fewer, still monotonic, updates.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: Sender<ProgressUpdate>,
    dropped: u64,
}

impl ChannelProgress {
    /// A sink and its receiver, holding at most `capacity` updates.
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProgressUpdate>) {
        let (tx, rx) = channel::bounded(capacity);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Updates dropped because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&mut self, update: &ProgressUpdate) {
        match self.tx.try_send(*update) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped = self.dropped.saturating_add(1);
                trace!(phase = %update.phase, "progress update dropped");
            }
        }
    }
}

fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = done.min(total).saturating_mul(100).checked_div(total).unwrap_or(100);
    u8::try_from(pct).unwrap_or(100)
}

/// Turns per-phase byte counts into weighted, monotonic updates.
pub struct ProgressTracker<'a> {
    weights: PhaseWeights,
    sink: &'a mut dyn ProgressSink,
    last_overall: u8,
}

impl<'a> ProgressTracker<'a> {
    /// Track into `sink` with the given weights.
    pub fn new(weights: PhaseWeights, sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            weights,
            sink,
            last_overall: 0,
        }
    }

    fn weight(&self, phase: UpdatePhase) -> u64 {
        let w = match phase {
            UpdatePhase::Detaching => self.weights.detach,
            UpdatePhase::Erasing => self.weights.erase,
            UpdatePhase::Writing => self.weights.write,
            UpdatePhase::Verifying => self.weights.verify,
            UpdatePhase::Attaching => self.weights.attach,
            UpdatePhase::Reloading => self.weights.reload,
            UpdatePhase::Idle | UpdatePhase::Done | UpdatePhase::Failed => 0,
        };
        u64::from(w)
    }

    /// Overall percentage for `done` of `total` bytes in `phase`.
    pub fn overall(&self, phase: UpdatePhase, done: u64, total: u64) -> u8 {
        if phase == UpdatePhase::Done {
            return 100;
        }
        let before: u64 = UpdatePhase::SEQUENCE
            .iter()
            .take_while(|p| **p < phase)
            .map(|p| self.weight(*p))
            .sum();
        let within = self
            .weight(phase)
            .saturating_mul(u64::from(percent(done, total)))
            .checked_div(100)
            .unwrap_or(0);
        u8::try_from(before.saturating_add(within).min(100)).unwrap_or(100)
    }

    /// Report `done` of `total` bytes in `phase`.
    pub fn report(&mut self, phase: UpdatePhase, done: u64, total: u64) {
        let overall = self.overall(phase, done, total).max(self.last_overall);
        self.last_overall = overall;
        self.sink.report(&ProgressUpdate {
            phase,
            phase_percent: percent(done, total),
            overall_percent: overall,
            bytes_done: done,
            bytes_total: total,
        });
    }

    /// Highest overall percentage reported.
    pub fn last_overall(&self) -> u8 {
        self.last_overall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_is_weighted() {
        let mut sink = NullProgress;
        let tracker = ProgressTracker::new(PhaseWeights::default(), &mut sink);
        assert_eq!(tracker.overall(UpdatePhase::Detaching, 0, 0), 2);
        assert_eq!(tracker.overall(UpdatePhase::Erasing, 0, 10), 2);
        assert_eq!(tracker.overall(UpdatePhase::Erasing, 10, 10), 22);
        assert_eq!(tracker.overall(UpdatePhase::Writing, 5, 10), 48);
        assert_eq!(tracker.overall(UpdatePhase::Done, 0, 0), 100);
    }

    #[test]
    fn test_report_never_decreases() {
        let mut sink = RecordingProgress::new();
        {
            let mut tracker = ProgressTracker::new(PhaseWeights::default(), &mut sink);
            tracker.report(UpdatePhase::Writing, 10, 10);
            tracker.report(UpdatePhase::Writing, 0, 10);
        }
        let overall: Vec<u8> = sink.updates().iter().map(|u| u.overall_percent).collect();
        assert_eq!(overall, vec![74, 74]);
        assert_eq!(sink.updates().get(1).map(|u| u.phase_percent), Some(0));
    }

    #[test]
    fn test_channel_drops_when_full() {
        let (mut sink, rx) = ChannelProgress::bounded(1);
        let update = ProgressUpdate {
            phase: UpdatePhase::Writing,
            phase_percent: 0,
            overall_percent: 0,
            bytes_done: 0,
            bytes_total: 0,
        };
        sink.report(&update);
        sink.report(&update);
        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.try_iter().count(), 1);
    }
}
