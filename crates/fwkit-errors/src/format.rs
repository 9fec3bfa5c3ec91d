//! Structural firmware-parsing errors.
//!
//! These are always fatal to the current parse and never fatal to the
//! process. Every variant carries enough context (structure, field, offset,
//! expected vs. actual) to build an actionable message.

use core::fmt;

use crate::bounds::OutOfBounds;
use crate::common::ErrorSeverity;

/// Firmware container and struct-codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Magic or signature bytes do not match
    #[error("invalid {structure} signature: expected {expected:?}, got {actual:?}")]
    InvalidSignature {
        /// Structure being decoded
        structure: &'static str,
        /// Expected signature text
        expected: String,
        /// Printable rendering of the bytes found
        actual: String,
    },

    /// Not enough bytes for a fixed-layout structure field
    #[error(
        "{structure}.{field} at offset {offset:#x} needs {expected} bytes, {actual} available"
    )]
    Truncated {
        /// Structure being decoded
        structure: &'static str,
        /// Field that could not be read
        field: &'static str,
        /// Absolute offset of the field
        offset: usize,
        /// Bytes the field needs
        expected: usize,
        /// Bytes that were available
        actual: usize,
    },

    /// A size field holds a value outside its permitted range
    #[error("invalid {field}: expected {expected}, got {actual:#x}")]
    InvalidSize {
        /// Field name
        field: &'static str,
        /// Human readable description of the permitted values
        expected: String,
        /// Value found
        actual: u64,
    },

    /// A declared length does not match the bytes actually consumed
    #[error("{what} declares {declared:#x} bytes but {actual:#x} were found")]
    InconsistentLength {
        /// What the length describes
        what: String,
        /// Declared length
        declared: u64,
        /// Actual length
        actual: u64,
    },

    /// A container exceeded its per-format child quota
    #[error("too many images, limit is {limit}")]
    TooManyChildren {
        /// Maximum number of children
        limit: usize,
    },

    /// A version, type or record kind this parser does not handle
    #[error("unsupported {what}: {value}")]
    UnsupportedVariant {
        /// What kind of value was rejected
        what: &'static str,
        /// The rejected value
        value: String,
    },

    /// Serialization needs a child that was never added
    #[error("no image with id {0:?}")]
    MissingRequiredChild(String),

    /// A container has zero or several children where exactly one is required
    #[error("expected exactly one image, found {count}")]
    NoDefaultChild {
        /// Number of children present
        count: usize,
    },

    /// Stored checksum disagrees with the computed one
    #[error("{what} checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        /// What the checksum protects
        what: &'static str,
        /// Value stored in the file
        expected: u64,
        /// Value computed from the data
        actual: u64,
    },

    /// A string does not fit its fixed-size storage
    #[error("{field} is {actual} bytes, storage holds {max}")]
    StringTooLong {
        /// Field name
        field: &'static str,
        /// Capacity of the field
        max: usize,
        /// Length of the string
        actual: usize,
    },

    /// A text record (e.g. an Intel HEX line) is malformed
    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord {
        /// One-based line number
        line: usize,
        /// What is wrong with it
        reason: String,
    },

    /// Chunks leave a hole in the reassembled range
    #[error("chunk gap: expected address {expected:#x}, got {actual:#x}")]
    ChunkGap {
        /// Next address expected
        expected: u64,
        /// Address found
        actual: u64,
    },

    /// Chunks overlap in the reassembled range
    #[error("chunk overlap: expected address {expected:#x}, got {actual:#x}")]
    ChunkOverlap {
        /// Next address expected
        expected: u64,
        /// Address found
        actual: u64,
    },

    /// A bounds-checked read failed
    #[error(transparent)]
    OutOfBounds(#[from] OutOfBounds),
}

impl FormatError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FormatError::OutOfBounds(_) => ErrorSeverity::Warning,
            FormatError::UnsupportedVariant { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Check if this error comes from a cross-check that a forced load may skip.
    pub fn is_consistency_check(&self) -> bool {
        matches!(
            self,
            FormatError::InconsistentLength { .. } | FormatError::ChecksumMismatch { .. }
        )
    }

    /// Create an invalid signature error, rendering the found bytes printably.
    pub fn invalid_signature(
        structure: &'static str,
        expected: impl Into<String>,
        actual: &[u8],
    ) -> Self {
        FormatError::InvalidSignature {
            structure,
            expected: expected.into(),
            actual: printable(actual),
        }
    }

    /// Create an invalid size error.
    pub fn invalid_size(field: &'static str, expected: impl fmt::Display, actual: u64) -> Self {
        FormatError::InvalidSize {
            field,
            expected: expected.to_string(),
            actual,
        }
    }

    /// Create an inconsistent length error.
    pub fn inconsistent(what: impl Into<String>, declared: u64, actual: u64) -> Self {
        FormatError::InconsistentLength {
            what: what.into(),
            declared,
            actual,
        }
    }

    /// Create an unsupported variant error.
    pub fn unsupported(what: &'static str, value: impl fmt::Display) -> Self {
        FormatError::UnsupportedVariant {
            what,
            value: value.to_string(),
        }
    }

    /// Create an invalid record error.
    pub fn record(line: usize, reason: impl Into<String>) -> Self {
        FormatError::InvalidRecord {
            line,
            reason: reason.into(),
        }
    }
}

fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(16)
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                char::from(b).to_string()
            } else {
                format!("\\x{b:02x}")
            }
        })
        .collect()
}
