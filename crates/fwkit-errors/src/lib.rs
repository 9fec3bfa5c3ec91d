//! Shared error taxonomy for fwkit
//!
//! Every crate in the workspace reports failures through the types defined
//! here, so a caller that drives parsing and device updates end-to-end can
//! classify any failure without knowing which layer produced it.
//!
//! # Architecture
//!
//! - [`common`]: Top-level [`FwkitError`], categories, severities and context helpers
//! - [`bounds`]: The [`OutOfBounds`] error returned by every bounds-checked read
//! - [`format`]: Structural firmware-parsing failures
//! - [`cipher`]: XTEA precondition failures
//! - [`device`]: Opaque errors surfaced by device I/O backends
//! - [`validation`]: Configuration validation errors
//!
//! # Example
//!
//! ```
//! use fwkit_errors::prelude::*;
//!
//! fn check_signature(buf: &[u8]) -> Result<()> {
//!     if !buf.starts_with(b"DfuSe") {
//!         return Err(FormatError::invalid_signature("DfuSe", "DfuSe", buf).into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_signature(b"DfuSe\x01").is_ok());
//! assert!(check_signature(b"Nope").is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bounds;
pub mod cipher;
pub mod common;
pub mod device;
pub mod format;
pub mod prelude;
pub mod validation;

pub use bounds::OutOfBounds;
pub use cipher::CipherError;
pub use common::{ErrorCategory, ErrorContext, ErrorSeverity, FwkitError, ResultExt};
pub use device::DeviceError;
pub use format::FormatError;
pub use validation::ValidationError;

/// A specialized `Result` type for fwkit operations.
pub type Result<T> = std::result::Result<T, FwkitError>;

/// A specialized `Result` type for firmware parsing.
pub type FormatResult<T> = std::result::Result<T, FormatError>;
