//! Chained builder for serializing fixed-layout structures.

use bytes::Bytes;
use fwkit_errors::{FormatError, OutOfBounds};

use crate::endian::Endian;

/// Growable output buffer with endian-aware field writers.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Append a byte.
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    /// Append a 16-bit value.
    pub fn write_u16(&mut self, value: u16, endian: Endian) -> &mut Self {
        self.buffer.extend_from_slice(&endian.u16_to(value));
        self
    }

    /// Append the low 24 bits of `value`.
    pub fn write_u24(&mut self, value: u32, endian: Endian) -> &mut Self {
        self.buffer.extend_from_slice(&endian.u24_to(value));
        self
    }

    /// Append a 32-bit value.
    pub fn write_u32(&mut self, value: u32, endian: Endian) -> &mut Self {
        self.buffer.extend_from_slice(&endian.u32_to(value));
        self
    }

    /// Append a 64-bit value.
    pub fn write_u64(&mut self, value: u64, endian: Endian) -> &mut Self {
        self.buffer.extend_from_slice(&endian.u64_to(value));
        self
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(data);
        self
    }

    /// Append `count` copies of `fill`.
    pub fn write_fill(&mut self, fill: u8, count: usize) -> &mut Self {
        self.buffer.resize(self.buffer.len().saturating_add(count), fill);
        self
    }

    /// Append a string NUL-padded to exactly `max_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::StringTooLong`] if `value` does not fit. The
    /// string is never truncated.
    pub fn write_fixed_string(
        &mut self,
        field: &'static str,
        value: &str,
        max_len: usize,
    ) -> Result<&mut Self, FormatError> {
        if value.len() > max_len {
            return Err(FormatError::StringTooLong {
                field,
                max: max_len,
                actual: value.len(),
            });
        }
        self.buffer.extend_from_slice(value.as_bytes());
        Ok(self.write_fill(0, max_len.saturating_sub(value.len())))
    }

    /// Overwrite a previously written 32-bit field, e.g. a length known only
    /// after the body is serialized.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if the field was never written.
    pub fn patch_u32(&mut self, offset: usize, value: u32, endian: Endian) -> Result<(), OutOfBounds> {
        let size = self.buffer.len();
        OutOfBounds::check(offset, 4, size)?;
        let dst = self
            .buffer
            .get_mut(offset..offset.saturating_add(4))
            .ok_or(OutOfBounds::new(offset, 4, size))?;
        dst.copy_from_slice(&endian.u32_to(value));
        Ok(())
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the writer, returning the buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Consume the writer, returning immutable shared bytes.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buffer)
    }
}
