//! Top-level error type and classification shared by all fwkit crates.

use core::fmt;

use crate::{CipherError, DeviceError, FormatError, OutOfBounds, ValidationError};

/// Top-level error type that can wrap every fwkit sub-error.
#[derive(Debug, thiserror::Error)]
pub enum FwkitError {
    /// Bounds-checked read failed
    #[error("Bounds error: {0}")]
    Bounds(#[from] OutOfBounds),

    /// Firmware parsing errors
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Cipher errors
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Device backend errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl FwkitError {
    /// Get the error category for classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FwkitError::Bounds(_) | FwkitError::Format(_) => ErrorCategory::Format,
            FwkitError::Cipher(_) => ErrorCategory::Cipher,
            FwkitError::Device(_) => ErrorCategory::Device,
            FwkitError::Validation(_) => ErrorCategory::Validation,
            FwkitError::Io(_) => ErrorCategory::IO,
            FwkitError::Other(_) => ErrorCategory::Other,
        }
    }

    /// Get the error severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FwkitError::Bounds(_) => ErrorSeverity::Warning,
            FwkitError::Format(e) => e.severity(),
            FwkitError::Cipher(e) => e.severity(),
            FwkitError::Device(e) => e.severity(),
            FwkitError::Validation(e) => e.severity(),
            FwkitError::Io(_) => ErrorSeverity::Error,
            FwkitError::Other(_) => ErrorSeverity::Error,
        }
    }

    /// Check if this error is recoverable.
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }

    /// Create a generic error with a message.
    pub fn other(msg: impl Into<String>) -> Self {
        FwkitError::Other(msg.into())
    }
}

impl From<std::io::Error> for FwkitError {
    fn from(e: std::io::Error) -> Self {
        FwkitError::Io(e)
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Firmware parsing and bounds errors
    Format = 0,
    /// Cipher errors
    Cipher = 1,
    /// Device backend errors
    Device = 2,
    /// Update orchestration errors
    Update = 3,
    /// Validation errors
    Validation = 4,
    /// I/O errors
    IO = 5,
    /// Other errors
    Other = 255,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Format => write!(f, "Format"),
            ErrorCategory::Cipher => write!(f, "Cipher"),
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Update => write!(f, "Update"),
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::IO => write!(f, "IO"),
            ErrorCategory::Other => write!(f, "Other"),
        }
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, no action required
    Info = 0,
    /// Warning, may require attention
    Warning = 1,
    /// Error, operation failed
    Error = 2,
    /// Critical, device may be in an indeterminate state
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Context information for errors.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// The operation that was being performed
    pub operation: String,
    /// Additional context key-value pairs
    pub context: Vec<(String, String)>,
}

impl ErrorContext {
    /// Create a new error context for an operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            context: Vec::new(),
        }
    }

    /// Add a context key-value pair.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        for (key, value) in &self.context {
            write!(f, ", {key}: {value}")?;
        }
        Ok(())
    }
}

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error, flattened into [`FwkitError::Other`] with
    /// the context prepended.
    fn context(self, ctx: ErrorContext) -> Result<T, FwkitError>;

    /// Add context with an operation name.
    ///
    /// # Errors
    ///
    /// Same as [`ResultExt::context`].
    fn with_context(self, operation: impl Into<String>) -> Result<T, FwkitError>;
}

impl<T, E: Into<FwkitError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, ctx: ErrorContext) -> Result<T, FwkitError> {
        self.map_err(|e| {
            let err: FwkitError = e.into();
            FwkitError::Other(format!("{ctx}: {err}"))
        })
    }

    fn with_context(self, operation: impl Into<String>) -> Result<T, FwkitError> {
        self.context(ErrorContext::new(operation))
    }
}
