//! Offset-based random access over an immutable byte slice.

use fwkit_errors::OutOfBounds;

use crate::endian::Endian;

/// Bounds-checked reader over a byte slice.
///
/// Unlike a cursor, every read names its absolute offset, so parsers can
/// jump between header fields freely. Returned slices borrow from the
/// underlying buffer without copying.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    /// Wrap a byte slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Declared size of the buffer.
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The whole underlying slice.
    pub fn as_slice(&self) -> &'a [u8] {
        self.buf
    }

    /// Borrow `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the range does not fit inside the buffer.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], OutOfBounds> {
        OutOfBounds::check(offset, len, self.buf.len())?;
        self.buf
            .get(offset..offset.saturating_add(len))
            .ok_or(OutOfBounds::new(offset, len, self.buf.len()))
    }

    /// Borrow everything from `offset` to the end.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if `offset` is past the end.
    pub fn tail(&self, offset: usize) -> Result<&'a [u8], OutOfBounds> {
        self.buf
            .get(offset..)
            .ok_or(OutOfBounds::new(offset, 0, self.buf.len()))
    }

    /// A reader over a sub-range, with offsets relative to its start.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the range does not fit inside the buffer.
    pub fn sub_reader(&self, offset: usize, len: usize) -> Result<ByteReader<'a>, OutOfBounds> {
        Ok(ByteReader::new(self.read_bytes(offset, len)?))
    }

    /// Copy a fixed-size array at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the array does not fit.
    pub fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], OutOfBounds> {
        let src = self.read_bytes(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(src);
        Ok(out)
    }

    /// Read a byte.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if `offset` is past the end.
    pub fn read_u8(&self, offset: usize) -> Result<u8, OutOfBounds> {
        self.buf
            .get(offset)
            .copied()
            .ok_or(OutOfBounds::new(offset, 1, self.buf.len()))
    }

    /// Read a 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the field does not fit.
    pub fn read_u16(&self, offset: usize, endian: Endian) -> Result<u16, OutOfBounds> {
        Ok(endian.u16_from(self.read_array(offset)?))
    }

    /// Read a 24-bit value into the low bits of a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the field does not fit.
    pub fn read_u24(&self, offset: usize, endian: Endian) -> Result<u32, OutOfBounds> {
        Ok(endian.u24_from(self.read_array(offset)?))
    }

    /// Read a 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the field does not fit.
    pub fn read_u32(&self, offset: usize, endian: Endian) -> Result<u32, OutOfBounds> {
        Ok(endian.u32_from(self.read_array(offset)?))
    }

    /// Read a 64-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the field does not fit.
    pub fn read_u64(&self, offset: usize, endian: Endian) -> Result<u64, OutOfBounds> {
        Ok(endian.u64_from(self.read_array(offset)?))
    }

    /// Read a NUL-padded string stored in a fixed `max_len`-byte field.
    ///
    /// Decoding stops at the first NUL or at `max_len`, whichever comes
    /// first. Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the whole field does not fit.
    pub fn read_fixed_string(&self, offset: usize, max_len: usize) -> Result<String, OutOfBounds> {
        let field = self.read_bytes(offset, max_len)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let text = field.get(..end).unwrap_or_default();
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    /// Whether `magic` appears at `offset`. Out-of-range offsets never match.
    pub fn starts_with_at(&self, offset: usize, magic: &[u8]) -> bool {
        self.read_bytes(offset, magic.len())
            .is_ok_and(|found| found == magic)
    }
}

impl<'a> From<&'a [u8]> for ByteReader<'a> {
    fn from(buf: &'a [u8]) -> Self {
        Self::new(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers_both_orders() -> Result<(), OutOfBounds> {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8(7)?, 0x08);
        assert_eq!(reader.read_u16(0, Endian::Little)?, 0x0201);
        assert_eq!(reader.read_u16(0, Endian::Big)?, 0x0102);
        assert_eq!(reader.read_u24(1, Endian::Little)?, 0x04_0302);
        assert_eq!(reader.read_u32(4, Endian::Big)?, 0x0506_0708);
        assert_eq!(reader.read_u64(0, Endian::Little)?, 0x0807_0605_0403_0201);
        Ok(())
    }

    #[test]
    fn test_reads_past_end_fail() {
        let buf = [0u8; 4];
        let reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8(4), Err(OutOfBounds::new(4, 1, 4)));
        assert_eq!(
            reader.read_u32(1, Endian::Little),
            Err(OutOfBounds::new(1, 4, 4))
        );
        assert!(reader.read_bytes(usize::MAX, 2).is_err());
        assert!(reader.tail(5).is_err());
    }

    #[test]
    fn test_declared_size_limits_reads() -> Result<(), OutOfBounds> {
        let storage = [0xAAu8; 64];
        let reader = ByteReader::new(storage.get(..10).unwrap_or_default());
        assert_eq!(reader.read_bytes(8, 2)?.len(), 2);
        assert!(reader.read_bytes(8, 3).is_err());
        Ok(())
    }

    #[test]
    fn test_fixed_string_stops_at_nul() -> Result<(), OutOfBounds> {
        let buf = *b"ST...\0garbage\0\0\0";
        let reader = ByteReader::new(&buf);
        assert_eq!(reader.read_fixed_string(0, 16)?, "ST...");
        assert_eq!(reader.read_fixed_string(0, 2)?, "ST");
        assert!(reader.read_fixed_string(10, 8).is_err());
        Ok(())
    }

    #[test]
    fn test_sub_reader_is_relative() -> Result<(), OutOfBounds> {
        let buf = [0u8, 1, 2, 3, 4, 5];
        let sub = ByteReader::new(&buf).sub_reader(2, 3)?;
        assert_eq!(sub.size(), 3);
        assert_eq!(sub.read_u8(0)?, 2);
        assert!(sub.read_u8(3).is_err());
        Ok(())
    }

    #[test]
    fn test_starts_with_at() {
        let reader = ByteReader::new(b"xxDfuSe");
        assert!(reader.starts_with_at(2, b"DfuSe"));
        assert!(!reader.starts_with_at(3, b"DfuSe"));
        assert!(!reader.starts_with_at(100, b"D"));
    }
}
