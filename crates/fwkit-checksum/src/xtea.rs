//! XTEA block cipher for encrypted DFU payloads.
//!
//! 64 Feistel rounds (32 cycles) over pairs of little-endian 32-bit words.
//! Buffers are processed in place and must be a whole number of 8-byte
//! blocks; a partial trailing block is rejected rather than left in clear.

use core::fmt;

use fwkit_errors::CipherError;

/// Cipher block size in bytes.
pub const XTEA_BLOCK_SIZE: usize = 8;

/// Maximum key length in characters.
pub const XTEA_KEY_MAX_LEN: usize = 32;

const DELTA: u32 = 0x9E37_79B9;
const CYCLES: u32 = 32;

/// A 128-bit XTEA key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct XteaKey {
    words: [u32; 4],
}

impl fmt::Debug for XteaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("XteaKey(..)")
    }
}

impl XteaKey {
    /// Build a key from four words.
    pub fn from_words(words: [u32; 4]) -> Self {
        Self { words }
    }

    /// Parse a key string.
    ///
    /// Exactly 32 hex characters are read as four 32-bit words, most
    /// significant word first. Anything else is treated as a passphrase
    /// and hashed with MD5.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::KeyTooLong`] for keys over 32 characters and
    /// [`CipherError::InvalidKey`] for an empty key.
    pub fn parse(key: &str) -> Result<Self, CipherError> {
        if key.len() > XTEA_KEY_MAX_LEN {
            return Err(CipherError::KeyTooLong {
                actual: key.len(),
                max: XTEA_KEY_MAX_LEN,
            });
        }
        if key.is_empty() {
            return Err(CipherError::InvalidKey("empty key".to_string()));
        }
        if key.len() == XTEA_KEY_MAX_LEN
            && let Some(words) = parse_hex_words(key)
        {
            return Ok(Self { words });
        }
        Ok(Self::from_passphrase(key))
    }

    /// Derive a key from the MD5 of a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = md5::compute(passphrase.as_bytes());
        let mut words = [0u32; 4];
        for (word, bytes) in words.iter_mut().zip(digest.0.chunks_exact(4)) {
            let mut le = [0u8; 4];
            le.copy_from_slice(bytes);
            *word = u32::from_le_bytes(le);
        }
        Self { words }
    }

    fn word(&self, sum: u32) -> u32 {
        match sum & 3 {
            0 => self.words[0],
            1 => self.words[1],
            2 => self.words[2],
            _ => self.words[3],
        }
    }
}

fn parse_hex_words(key: &str) -> Option<[u32; 4]> {
    if !key.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut words = [0u32; 4];
    for (i, word) in words.iter_mut().rev().enumerate() {
        let start = i.checked_mul(8)?;
        let group = key.get(start..start.checked_add(8)?)?;
        *word = u32::from_str_radix(group, 16).ok()?;
    }
    Some(words)
}

fn check_blocks(buf: &[u8]) -> Result<(), CipherError> {
    if buf.len() < XTEA_BLOCK_SIZE || !buf.len().is_multiple_of(XTEA_BLOCK_SIZE) {
        return Err(CipherError::InvalidBlockSize {
            len: buf.len(),
            block: XTEA_BLOCK_SIZE,
        });
    }
    Ok(())
}

fn load(block: &[u8]) -> (u32, u32) {
    let mut raw = [0u8; XTEA_BLOCK_SIZE];
    for (dst, src) in raw.iter_mut().zip(block) {
        *dst = *src;
    }
    let [a, b, c, d, e, f, g, h] = raw;
    (u32::from_le_bytes([a, b, c, d]), u32::from_le_bytes([e, f, g, h]))
}

fn store(block: &mut [u8], v0: u32, v1: u32) {
    let bytes = v0.to_le_bytes().into_iter().chain(v1.to_le_bytes());
    for (dst, src) in block.iter_mut().zip(bytes) {
        *dst = src;
    }
}

fn mix(v: u32) -> u32 {
    ((v << 4) ^ (v >> 5)).wrapping_add(v)
}

/// Encrypt `buf` in place.
///
/// # Errors
///
/// Returns [`CipherError::InvalidBlockSize`] unless `buf` is a non-empty
/// multiple of 8 bytes.
pub fn encrypt(key: &XteaKey, buf: &mut [u8]) -> Result<(), CipherError> {
    check_blocks(buf)?;
    for block in buf.chunks_exact_mut(XTEA_BLOCK_SIZE) {
        let (mut v0, mut v1) = load(block);
        let mut sum = 0u32;
        for _ in 0..CYCLES {
            v0 = v0.wrapping_add(mix(v1) ^ sum.wrapping_add(key.word(sum)));
            sum = sum.wrapping_add(DELTA);
            v1 = v1.wrapping_add(mix(v0) ^ sum.wrapping_add(key.word(sum >> 11)));
        }
        store(block, v0, v1);
    }
    Ok(())
}

/// Decrypt `buf` in place.
///
/// # Errors
///
/// Returns [`CipherError::InvalidBlockSize`] unless `buf` is a non-empty
/// multiple of 8 bytes.
pub fn decrypt(key: &XteaKey, buf: &mut [u8]) -> Result<(), CipherError> {
    check_blocks(buf)?;
    for block in buf.chunks_exact_mut(XTEA_BLOCK_SIZE) {
        let (mut v0, mut v1) = load(block);
        let mut sum = DELTA.wrapping_mul(CYCLES);
        for _ in 0..CYCLES {
            v1 = v1.wrapping_sub(mix(v0) ^ sum.wrapping_add(key.word(sum >> 11)));
            sum = sum.wrapping_sub(DELTA);
            v0 = v0.wrapping_sub(mix(v1) ^ sum.wrapping_add(key.word(sum)));
        }
        store(block, v0, v1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() -> Result<(), CipherError> {
        let key = XteaKey::parse("test")?;
        let mut buf = *b"HiyaDave";
        encrypt(&key, &mut buf)?;
        assert_eq!(buf, [128, 220, 23, 55, 201, 207, 182, 177]);
        decrypt(&key, &mut buf)?;
        assert_eq!(&buf, b"HiyaDave");
        Ok(())
    }

    #[test]
    fn test_hex_key() -> Result<(), CipherError> {
        let key = XteaKey::parse("00112233445566778899aabbccddeeff")?;
        assert_eq!(
            key,
            XteaKey::from_words([0xccdd_eeff, 0x8899_aabb, 0x4455_6677, 0x0011_2233])
        );
        let mut buf = [0u8; 8];
        encrypt(&key, &mut buf)?;
        assert_eq!(buf, [0xa2, 0xba, 0x04, 0x4e, 0x61, 0xfa, 0x5a, 0xad]);
        Ok(())
    }

    #[test]
    fn test_32_char_passphrase_is_hashed() -> Result<(), CipherError> {
        let phrase = "this passphrase is 32 chars long";
        assert_eq!(phrase.len(), 32);
        assert_eq!(XteaKey::parse(phrase)?, XteaKey::from_passphrase(phrase));
        Ok(())
    }

    #[test]
    fn test_key_too_long() {
        let err = XteaKey::parse(&"a".repeat(33)).err();
        assert_eq!(err, Some(CipherError::KeyTooLong { actual: 33, max: 32 }));
    }

    #[test]
    fn test_rejects_partial_blocks() -> Result<(), CipherError> {
        let key = XteaKey::parse("test")?;
        for len in [0usize, 4, 7, 12, 15] {
            let mut buf = vec![0u8; len];
            assert_eq!(
                encrypt(&key, &mut buf),
                Err(CipherError::InvalidBlockSize { len, block: 8 })
            );
            assert!(decrypt(&key, &mut buf).is_err());
        }
        Ok(())
    }

    #[test]
    fn test_blocks_are_independent() -> Result<(), CipherError> {
        let key = XteaKey::parse("test")?;
        let mut buf = [0u8; 16];
        encrypt(&key, &mut buf)?;
        assert_eq!(buf.get(..8), buf.get(8..));
        Ok(())
    }

    #[test]
    fn test_debug_hides_key() -> Result<(), CipherError> {
        let key = XteaKey::parse("secret")?;
        assert_eq!(format!("{key:?}"), "XteaKey(..)");
        Ok(())
    }
}
