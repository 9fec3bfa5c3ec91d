//! Cipher precondition errors.

use crate::common::ErrorSeverity;

/// XTEA key and block errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// Passphrase or hex key longer than the cipher accepts
    #[error("key is {actual} characters, maximum is {max}")]
    KeyTooLong {
        /// Length supplied
        actual: usize,
        /// Maximum length
        max: usize,
    },

    /// A 32-character key that is not valid hex
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Buffer is not a whole number of cipher blocks
    #[error("buffer of {len} bytes is not a whole number of {block}-byte blocks")]
    InvalidBlockSize {
        /// Buffer length
        len: usize,
        /// Cipher block size
        block: usize,
    },
}

impl CipherError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}
