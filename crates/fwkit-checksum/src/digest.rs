//! SHA-family checksums and PCR-style hash chaining.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

/// Length of a SHA256 digest in bytes.
pub const SHA256_LEN: usize = 32;

/// Digest algorithms used for image checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecksumKind {
    /// MD5, only for legacy lookups
    Md5,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
}

impl ChecksumKind {
    /// Length of the hex rendering of this digest.
    pub fn hex_len(self) -> usize {
        match self {
            ChecksumKind::Md5 => 32,
            ChecksumKind::Sha256 => 64,
            ChecksumKind::Sha512 => 128,
        }
    }
}

/// Compute a lowercase hex checksum of `data`.
pub fn checksum_hex(kind: ChecksumKind, data: &[u8]) -> String {
    match kind {
        ChecksumKind::Md5 => format!("{:x}", md5::compute(data)),
        ChecksumKind::Sha256 => hex::encode(Sha256::digest(data)),
        ChecksumKind::Sha512 => hex::encode(Sha512::digest(data)),
    }
}

/// Guess the digest kind from the length of a hex checksum.
pub fn guess_kind(checksum: &str) -> Option<ChecksumKind> {
    match checksum.len() {
        32 => Some(ChecksumKind::Md5),
        64 => Some(ChecksumKind::Sha256),
        128 => Some(ChecksumKind::Sha512),
        _ => None,
    }
}

/// Extend a digest: `SHA256(prior || new_bytes)`.
pub fn sha256_chain(prior: &[u8; SHA256_LEN], new_bytes: &[u8]) -> [u8; SHA256_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(prior);
    hasher.update(new_bytes);
    hasher.finalize().into()
}

/// A single SHA256 PCR register replayed from measurements.
///
/// Starts at all zeroes, as a TPM PCR does after reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcrBank {
    value: [u8; SHA256_LEN],
    extends: usize,
}

impl Default for PcrBank {
    fn default() -> Self {
        Self::new()
    }
}

impl PcrBank {
    /// Create a register in its reset state.
    pub fn new() -> Self {
        Self {
            value: [0u8; SHA256_LEN],
            extends: 0,
        }
    }

    /// Extend with raw event data, measuring it with SHA256 first.
    pub fn extend(&mut self, event_data: &[u8]) -> &mut Self {
        let measurement: [u8; SHA256_LEN] = Sha256::digest(event_data).into();
        self.extend_digest(&measurement)
    }

    /// Extend with an already-computed measurement digest.
    pub fn extend_digest(&mut self, measurement: &[u8; SHA256_LEN]) -> &mut Self {
        self.value = sha256_chain(&self.value, measurement);
        self.extends = self.extends.saturating_add(1);
        self
    }

    /// Replay a sequence of measurement digests from an event log.
    pub fn replay<'a>(measurements: impl IntoIterator<Item = &'a [u8; SHA256_LEN]>) -> Self {
        let mut bank = Self::new();
        for m in measurements {
            bank.extend_digest(m);
        }
        bank
    }

    /// Current register value.
    pub fn value(&self) -> &[u8; SHA256_LEN] {
        &self.value
    }

    /// Current register value as lowercase hex.
    pub fn value_hex(&self) -> String {
        hex::encode(self.value)
    }

    /// Number of extend operations applied.
    pub fn extends(&self) -> usize {
        self.extends
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_hex_empty() {
        assert_eq!(
            checksum_hex(ChecksumKind::Md5, b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            checksum_hex(ChecksumKind::Sha256, b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_guess_kind() {
        for kind in [ChecksumKind::Md5, ChecksumKind::Sha256, ChecksumKind::Sha512] {
            let hex = checksum_hex(kind, b"abc");
            assert_eq!(hex.len(), kind.hex_len());
            assert_eq!(guess_kind(&hex), Some(kind));
        }
        assert_eq!(guess_kind("abc"), None);
    }

    #[test]
    fn test_sha256_chain_vector() {
        let out = sha256_chain(&[0u8; SHA256_LEN], b"abc");
        assert_eq!(
            hex::encode(out),
            "365aa7d8f7f9402c4b9434502b4cc89ddb09fe50d7cd95b493b834c62d5a5370"
        );
        let out = sha256_chain(&out, b"def");
        assert_eq!(
            hex::encode(out),
            "532f0131db1635cb105c9753e41e7908599aa4dd144658c92e50b60113ad993a"
        );
    }

    #[test]
    fn test_pcr_extend_measures_first() {
        let mut bank = PcrBank::new();
        bank.extend(b"abc");
        assert_eq!(
            bank.value_hex(),
            "589f9ffed4c477966bfb8d41f37895b08c69047df8f911d6f3b57fbe08faee8d"
        );
        assert_eq!(bank.extends(), 1);
    }

    #[test]
    fn test_replay_matches_incremental() {
        let a: [u8; SHA256_LEN] = Sha256::digest(b"kernel").into();
        let b: [u8; SHA256_LEN] = Sha256::digest(b"initrd").into();
        let mut bank = PcrBank::new();
        bank.extend_digest(&a).extend_digest(&b);
        assert_eq!(PcrBank::replay([&a, &b]), bank);
    }
}
