//! Convenience re-exports for checksum and cipher helpers

pub use crate::crc::{crc8, crc16, crc32, crc32_dfu, crc32_stm32};
pub use crate::digest::{ChecksumKind, PcrBank, checksum_hex, guess_kind, sha256_chain};
pub use crate::xtea::{self, XteaKey};
pub use fwkit_errors::CipherError;
