//! Device update orchestration
//!
//! Drives a device through detach, erase, write, verify, attach and reload
//! behind a [`DeviceBackend`], with bounded retry, per-device locking,
//! cooperative cancellation and weighted progress reporting.
//!
//! # Architecture
//!
//! - [`backend`]: The blocking [`DeviceBackend`] interface and [`DeviceInfo`]
//! - [`phase`]: [`UpdatePhase`] and the strict [`PhaseMachine`]
//! - [`plan`]: [`UpdatePlan`], which runs one update to a terminal phase
//! - [`retry`]: Bounded retry with a recovery step between attempts
//! - [`locker`]: At most one plan per physical device
//! - [`registry`]: Proxy relationships between devices
//! - [`progress`]: [`ProgressSink`] implementations and weighting
//! - [`runner`]: [`AsyncUpdateRunner`] for tokio callers
//! - [`mock`]: An in-memory device with failure injection
//!
//! # Example
//!
//! ```
//! use fwkit_update::prelude::*;
//! use fwkit_firmware::Firmware;
//!
//! let mut device = MockBackend::new("mock0", DeviceInfo::new(64).with_transfer_size(16));
//! let firmware = Firmware::from_bytes(&b"new application image"[..]);
//! let config = UpdateConfig::default();
//!
//! let outcome = UpdatePlan::new(&mut device, &firmware, &config).execute(&mut NullProgress);
//! assert!(outcome.is_success());
//! assert_eq!(outcome.final_phase(), UpdatePhase::Done);
//! assert_eq!(device.flash().get(..21), Some(&b"new application image"[..]));
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod locker;
pub mod mock;
pub mod phase;
pub mod plan;
pub mod prelude;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod runner;

pub use backend::{DeviceBackend, DeviceInfo};
pub use cancel::CancelToken;
pub use config::{PhaseWeights, RetryPolicy, UpdateConfig, UserActionPolicy};
pub use error::{UpdateError, UpdateResult};
pub use locker::{DeviceLock, DeviceLocker};
pub use phase::{PhaseMachine, UpdatePhase};
pub use plan::{DeviceState, UpdateOutcome, UpdatePlan};
pub use progress::{
    ChannelProgress, NullProgress, ProgressSink, ProgressTracker, ProgressUpdate,
    RecordingProgress,
};
pub use registry::DeviceRegistry;
pub use retry::{retry, retry_with};
pub use runner::AsyncUpdateRunner;
