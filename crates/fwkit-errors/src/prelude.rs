//! Prelude module for convenient error handling imports.
//!
//! ```
//! use fwkit_errors::prelude::*;
//!
//! fn checked_len(len: u64) -> Result<u64> {
//!     if len > 0x10_0000 {
//!         return Err(FormatError::invalid_size("list_size", "<= 0x100000", len).into());
//!     }
//!     Ok(len)
//! }
//!
//! assert!(checked_len(0x20).is_ok());
//! ```

pub use crate::{
    FormatResult, Result,
    bounds::OutOfBounds,
    cipher::CipherError,
    common::{ErrorCategory, ErrorContext, ErrorSeverity, FwkitError, ResultExt},
    device::DeviceError,
    format::FormatError,
    validation::ValidationError,
};

/// Macro for creating an error with context.
///
/// ```
/// use fwkit_errors::error_context;
///
/// let ctx = error_context!("parse", "format" => "dfuse", "offset" => "0x1b");
/// assert_eq!(ctx.to_string(), "parse, format: dfuse, offset: 0x1b");
/// ```
#[macro_export]
macro_rules! error_context {
    ($operation:expr, $($key:expr => $value:expr),* $(,)?) => {
        {
            let mut ctx = $crate::ErrorContext::new($operation);
            $(
                ctx = ctx.with($key, $value);
            )*
            ctx
        }
    };
}

/// Return early with an error unless the condition holds.
#[macro_export]
macro_rules! ensure {
    ($condition:expr, $error:expr) => {
        if !$condition {
            return Err($error.into());
        }
    };
}
