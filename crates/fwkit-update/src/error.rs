//! Error types for device update operations

use fwkit_errors::{CipherError, DeviceError, ErrorSeverity, FormatError, ValidationError};
use thiserror::Error;

use crate::phase::UpdatePhase;

/// Errors that can end a device update
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Backend I/O failure
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Firmware could not be parsed or chunked
    #[error("Firmware format error: {0}")]
    Format(#[from] FormatError),

    /// Payload decryption failed
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// Another plan holds the physical device
    #[error("Update already in progress for device: {0}")]
    Busy(String),

    /// Phase order violated
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition {
        /// Current phase
        from: UpdatePhase,
        /// Requested phase
        to: UpdatePhase,
    },

    /// Read-back differs from what was written
    #[error("Verification failed at {address:#x}: {len} bytes differ from the written chunk")]
    VerifyMismatch {
        /// Chunk address
        address: u64,
        /// Chunk length
        len: usize,
    },

    /// Image does not fit the device's flash
    #[error("Firmware of {size} bytes at {address:#x} exceeds device capacity of {max} bytes")]
    FirmwareTooLarge {
        /// Image base address
        address: u64,
        /// Image size
        size: usize,
        /// Device maximum firmware size
        max: usize,
    },

    /// Image base lies outside the device's flash window
    #[error("Firmware at {address:#x} is outside device flash {start:#x}..{end:#x}")]
    AddressOutOfRange {
        /// Image base address
        address: u64,
        /// First flash address
        start: u64,
        /// One past the last flash address
        end: u64,
    },

    /// The user never confirmed the detach unlock
    #[error("Device {device} needs user action: not unlocked within {timeout_ms}ms")]
    UserActionTimeout {
        /// Device identifier
        device: String,
        /// Poll deadline
        timeout_ms: u64,
    },

    /// Cancelled by the caller
    #[error("Update cancelled")]
    Cancelled,

    /// Every retry of an operation failed
    #[error("{operation} failed after {retries} retries: {source}")]
    RetriesExhausted {
        /// Operation name
        operation: String,
        /// Retries made after the first attempt
        retries: u32,
        /// Last failure
        source: DeviceError,
    },

    /// The recovery step between retries failed
    #[error("Recovery before retrying {operation} failed: {source}")]
    RecoveryFailed {
        /// Operation being retried
        operation: String,
        /// Recovery failure
        source: DeviceError,
    },

    /// Device id not present in the registry
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
}

impl UpdateError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            UpdateError::Device(e) => e.severity(),
            UpdateError::Format(e) => e.severity(),
            UpdateError::Cipher(e) => e.severity(),
            UpdateError::Validation(e) => e.severity(),
            UpdateError::Busy(_) | UpdateError::Cancelled => ErrorSeverity::Warning,
            UpdateError::UserActionTimeout { .. } => ErrorSeverity::Warning,
            UpdateError::VerifyMismatch { .. } | UpdateError::RecoveryFailed { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Underlying device error, if the failure came from the backend.
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            UpdateError::Device(e) => Some(e),
            UpdateError::RetriesExhausted { source, .. } | UpdateError::RecoveryFailed { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Result type for update operations.
pub type UpdateResult<T> = Result<T, UpdateError>;
