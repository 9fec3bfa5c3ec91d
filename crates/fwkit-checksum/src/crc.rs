//! Bit-at-a-time CRC implementations.
//!
//! The CRC32 variants here are used by different firmware formats and are
//! not interchangeable: [`crc32`] and [`crc32_dfu`] share the reflected
//! IEEE polynomial but differ in the final xor, while [`crc32_stm32`] is the
//! non-reflected polynomial folded over little-endian 32-bit words.

/// Reflected IEEE 802.3 polynomial.
pub const CRC32_POLY_REFLECTED: u32 = 0xEDB8_8320;

/// Non-reflected IEEE 802.3 polynomial as used by the STM32 CRC unit.
pub const CRC32_POLY_NORMAL: u32 = 0x04C1_1DB7;

/// Reflected CRC-16/ARC polynomial.
pub const CRC16_POLY_REFLECTED: u16 = 0xA001;

/// CRC-8 polynomial (x^8 + x^2 + x + 1).
pub const CRC8_POLY: u8 = 0x07;

/// CRC-8 with polynomial 0x07, zero init and an inverted result.
pub fn crc8(buf: &[u8]) -> u8 {
    let crc = buf.iter().fold(0u8, |mut crc, &byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
        }
        crc
    });
    !crc
}

/// CRC-16 with the reflected 0xA001 polynomial, init 0xFFFF and an inverted result.
pub fn crc16(buf: &[u8]) -> u16 {
    let crc = buf.iter().fold(0xFFFFu16, |mut crc, &byte| {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 0x1 != 0 {
                (crc >> 1) ^ CRC16_POLY_REFLECTED
            } else {
                crc >> 1
            };
        }
        crc
    });
    !crc
}

/// Reflected CRC32 with a caller-supplied seed and polynomial; the result is inverted.
pub fn crc32_full(buf: &[u8], seed: u32, polynomial: u32) -> u32 {
    let crc = buf.iter().fold(seed, |mut crc, &byte| {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = 0u32.wrapping_sub(crc & 1);
            crc = (crc >> 1) ^ (polynomial & mask);
        }
        crc
    });
    !crc
}

/// Standard CRC32 (IEEE 802.3, as used by zlib and PNG).
pub fn crc32(buf: &[u8]) -> u32 {
    crc32_full(buf, 0xFFFF_FFFF, CRC32_POLY_REFLECTED)
}

/// CRC32 stored in a DFU file suffix.
///
/// Same register as [`crc32`] but without the final inversion, computed over
/// the whole file except the four CRC bytes themselves.
pub fn crc32_dfu(buf: &[u8]) -> u32 {
    !crc32(buf)
}

/// CRC32 as computed by the STM32 hardware CRC unit.
///
/// The buffer is consumed as little-endian 32-bit words; a trailing partial
/// word is zero-padded. Init is 0xFFFFFFFF and there is no final xor.
pub fn crc32_stm32(buf: &[u8]) -> u32 {
    buf.chunks(4).fold(0xFFFF_FFFFu32, |mut crc, word| {
        let mut le = [0u8; 4];
        for (dst, src) in le.iter_mut().zip(word) {
            *dst = *src;
        }
        crc ^= u32::from_le_bytes(le);
        for _ in 0..32 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_POLY_NORMAL
            } else {
                crc << 1
            };
        }
        crc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn test_crc8_vectors() {
        assert_eq!(crc8(CHECK), 0x0B);
        assert_eq!(crc8(&[1, 2, 3, 4, 5, 6, 7, 8, 9]), 0x7A);
        assert_eq!(crc8(&[]), 0xFF);
    }

    #[test]
    fn test_crc16_vectors() {
        assert_eq!(crc16(CHECK), 0xB4C8);
        assert_eq!(crc16(&[1, 2, 3, 4, 5, 6, 7, 8, 9]), 0x4DF1);
    }

    #[test]
    fn test_crc32_vectors() {
        assert_eq!(crc32(CHECK), 0xCBF4_3926);
        assert_eq!(crc32(&[1, 2, 3, 4, 5, 6, 7, 8, 9]), 0x40EF_AB9E);
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn test_crc32_dfu_is_uninverted() {
        assert_eq!(crc32_dfu(CHECK), 0x340B_C6D9);
        assert_eq!(crc32_dfu(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_crc32_stm32_vectors() {
        let buf: Vec<u8> = (0u8..16).collect();
        assert_eq!(crc32_stm32(&buf), 0x081B_46CA);
        assert_eq!(crc32_stm32(buf.get(..15).unwrap_or_default()), 0xED73_20AB);
    }

    #[test]
    fn test_variants_disagree() {
        let buf: Vec<u8> = (0u8..16).collect();
        assert_ne!(crc32(&buf), crc32_stm32(&buf));
        assert_ne!(crc32(&buf), crc32_dfu(&buf));
    }
}
