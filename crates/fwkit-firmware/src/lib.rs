//! Firmware container parsing
//!
//! Parses untrusted firmware files into a tree of [`Firmware`] nodes and
//! writes trees back out. Every read is bounds-checked against the declared
//! size of its buffer; a malformed file yields a [`FormatError`] naming the
//! structure, field and offset that failed.
//!
//! # Architecture
//!
//! - [`structs`]: Fixed-layout binary structures with field-aware errors
//! - [`image`]: The [`Firmware`] container tree
//! - [`chunk`]: Splitting payloads into address-tagged transfer chunks
//! - [`formats`]: One [`FirmwareParser`] per format, plus auto-detection
//! - [`meta`]: Format-specific metadata carried by nodes
//! - [`flags`]: [`ParseFlags`] and [`FirmwareFlags`]
//!
//! # Example
//!
//! ```
//! use fwkit_firmware::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = Firmware::from_bytes(&b"application"[..]);
//! let file = DfuParser.write(&image)?;
//!
//! let parsed = parse_any(file, ParseFlags::empty())?;
//! assert_eq!(parsed.format(), Some(FormatKind::Dfu));
//! assert_eq!(parsed.bytes().as_ref(), b"application");
//!
//! let chunks = parsed.chunks(4);
//! assert_eq!(chunks.len(), 3);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod chunk;
pub mod flags;
pub mod formats;
pub mod image;
pub mod meta;
pub mod prelude;
pub mod structs;

pub use chunk::{Chunk, ChunkSequence, pad_to_alignment, reassemble, split};
pub use flags::{FirmwareFlags, ParseFlags};
pub use formats::{FirmwareParser, FormatKind, load_file, parse_any};
pub use fwkit_errors::{FormatError, FormatResult};
pub use image::Firmware;
pub use meta::{DfuInfo, EfiSignatureInfo, FirmwareMeta, SignatureKind};
