//! Device I/O backend errors.
//!
//! The update engine never inspects a transport; it only sees these errors,
//! surfaced opaquely from the backend collaborator, and treats every one of
//! them as fatal to the current phase once retries are exhausted.

use crate::common::ErrorSeverity;

/// Errors reported by a device I/O backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Device not found
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Device disconnected
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// Transfer failed
    #[error("I/O error on device {device}: {message}")]
    Io {
        /// Device identifier
        device: String,
        /// Error message
        message: String,
    },

    /// Short read or write
    #[error("Short transfer on device {device}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        /// Device identifier
        device: String,
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// Device timeout
    #[error("Device {device} timeout after {timeout_ms}ms")]
    Timeout {
        /// Device identifier
        device: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Device busy
    #[error("Device {0} is busy")]
    Busy(String),

    /// Permission denied
    #[error("Permission denied for device: {0}")]
    PermissionDenied(String),

    /// Operation not supported by this device
    #[error("Operation '{operation}' not supported by device {device}")]
    NotSupported {
        /// Device identifier
        device: String,
        /// Operation name
        operation: String,
    },

    /// Address range outside the device's flash
    #[error("Address range {address:#x}+{len:#x} outside device {device}")]
    InvalidAddress {
        /// Device identifier
        device: String,
        /// Start address
        address: u64,
        /// Length
        len: usize,
    },
}

impl DeviceError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeviceError::NotFound(_) => ErrorSeverity::Error,
            DeviceError::Disconnected(_) => ErrorSeverity::Critical,
            DeviceError::Io { .. } => ErrorSeverity::Error,
            DeviceError::ShortTransfer { .. } => ErrorSeverity::Error,
            DeviceError::Timeout { .. } => ErrorSeverity::Warning,
            DeviceError::Busy(_) => ErrorSeverity::Warning,
            DeviceError::PermissionDenied(_) => ErrorSeverity::Error,
            DeviceError::NotSupported { .. } => ErrorSeverity::Info,
            DeviceError::InvalidAddress { .. } => ErrorSeverity::Error,
        }
    }

    /// Check if this error indicates the device is unavailable.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            DeviceError::NotFound(_)
                | DeviceError::Disconnected(_)
                | DeviceError::PermissionDenied(_)
        )
    }

    /// Check if retrying the operation might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeviceError::Timeout { .. } | DeviceError::Busy(_) | DeviceError::Io { .. }
        )
    }

    /// Check if retries must stop immediately.
    ///
    /// Permission and capability errors cannot change between attempts.
    pub fn is_fatal_for_retry(&self) -> bool {
        matches!(
            self,
            DeviceError::PermissionDenied(_)
                | DeviceError::NotSupported { .. }
                | DeviceError::NotFound(_)
                | DeviceError::InvalidAddress { .. }
        )
    }

    /// Create a not found error.
    pub fn not_found(device: impl Into<String>) -> Self {
        DeviceError::NotFound(device.into())
    }

    /// Create a disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        DeviceError::Disconnected(device.into())
    }

    /// Create an I/O error.
    pub fn io(device: impl Into<String>, message: impl Into<String>) -> Self {
        DeviceError::Io {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(device: impl Into<String>, timeout_ms: u64) -> Self {
        DeviceError::Timeout {
            device: device.into(),
            timeout_ms,
        }
    }

    /// Create a not supported error.
    pub fn not_supported(device: impl Into<String>, operation: impl Into<String>) -> Self {
        DeviceError::NotSupported {
            device: device.into(),
            operation: operation.into(),
        }
    }
}
