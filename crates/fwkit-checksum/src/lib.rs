//! Checksum and cipher utilities for firmware containers
//!
//! This crate provides the integrity primitives used by the format parsers
//! and the update engine:
//! - CRC-8, CRC-16 and three distinct CRC-32 variants
//! - SHA-family hex checksums and PCR-style hash chaining
//! - XTEA encryption for vendor DFU payloads
//!
//! # Architecture
//!
//! - [`crc`]: Table-free CRC implementations
//! - [`digest`]: Hex checksums, [`sha256_chain`] and [`PcrBank`]
//! - [`xtea`]: XTEA key parsing and in-place block encryption
//!
//! # Example
//!
//! ```
//! use fwkit_checksum::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
//!
//! let key = XteaKey::parse("test")?;
//! let mut buf = *b"HiyaDave";
//! xtea::encrypt(&key, &mut buf)?;
//! xtea::decrypt(&key, &mut buf)?;
//! assert_eq!(&buf, b"HiyaDave");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod crc;
pub mod digest;
pub mod prelude;
pub mod xtea;

pub use crc::{crc8, crc16, crc32, crc32_dfu, crc32_full, crc32_stm32};
pub use digest::{ChecksumKind, PcrBank, SHA256_LEN, checksum_hex, guess_kind, sha256_chain};
pub use xtea::XteaKey;
