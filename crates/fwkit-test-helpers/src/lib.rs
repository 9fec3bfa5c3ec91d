//! Shared test utilities for fwkit.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with `#[track_caller]` and useful messages
//! - [`fixtures`] - Hand-laid raw firmware files for parser tests
//! - [`prelude`] - Convenience re-exports
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! fwkit-test-helpers = { workspace = true }
//! ```
//!
//! ```rust,ignore
//! use fwkit_test_helpers::prelude::*;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::unwrap_used, clippy::panic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod must;
pub mod prelude;

#[cfg(feature = "fixtures")]
#[cfg_attr(docsrs, doc(cfg(feature = "fixtures")))]
pub mod fixtures;

pub use must::*;
