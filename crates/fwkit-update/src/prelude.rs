//! Convenience re-exports for running device updates

pub use crate::backend::{DeviceBackend, DeviceInfo};
pub use crate::cancel::CancelToken;
pub use crate::config::{PhaseWeights, RetryPolicy, UpdateConfig, UserActionPolicy};
pub use crate::error::{UpdateError, UpdateResult};
pub use crate::locker::{DeviceLock, DeviceLocker};
pub use crate::mock::{MockBackend, MockOp};
pub use crate::phase::{PhaseMachine, UpdatePhase};
pub use crate::plan::{DeviceState, UpdateOutcome, UpdatePlan};
pub use crate::progress::{
    ChannelProgress, NullProgress, ProgressSink, ProgressTracker, ProgressUpdate,
    RecordingProgress,
};
pub use crate::registry::DeviceRegistry;
pub use crate::retry::{retry, retry_with};
pub use crate::runner::AsyncUpdateRunner;
pub use fwkit_errors::DeviceError;
