//! Bounds-checked byte access for firmware parsing
//!
//! Every parser in the workspace reads through these types. Nothing here can
//! read past the declared length of a buffer or stream, even when the
//! backing storage is larger.
//!
//! # Architecture
//!
//! - [`endian`]: Per-field byte order
//! - [`reader`]: [`ByteReader`], offset-based random access over a slice
//! - [`writer`]: [`ByteWriter`], a chained builder for serializing structures
//! - [`stream`]: Seekable [`StreamView`]s, including [`PartialStream`] and
//!   [`CompositeStream`]
//!
//! # Example
//!
//! ```
//! use fwkit_stream::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let buf = [0x34, 0x12, 0xAB];
//! let reader = ByteReader::new(&buf);
//! assert_eq!(reader.read_u16(0, Endian::Little)?, 0x1234);
//! assert!(reader.read_u16(2, Endian::Little).is_err());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod endian;
pub mod prelude;
pub mod reader;
pub mod stream;
pub mod writer;

pub use endian::Endian;
pub use reader::ByteReader;
pub use stream::{
    BytesStream, CompositeStream, PartialStream, StreamView, read_bytes_at, read_exact_at,
};
pub use writer::ByteWriter;
