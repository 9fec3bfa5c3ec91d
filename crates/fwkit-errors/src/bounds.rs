//! Bounds violations for offset-based buffer access.

/// A read or write would exceed the declared length of a buffer or stream.
///
/// Always recoverable: callers decide whether the enclosing parse aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("access of {len} bytes at offset {offset:#x} exceeds size {size:#x}")]
pub struct OutOfBounds {
    /// Offset the access started at
    pub offset: usize,
    /// Number of bytes requested
    pub len: usize,
    /// Declared size of the buffer
    pub size: usize,
}

impl OutOfBounds {
    /// Create a new bounds error.
    pub fn new(offset: usize, len: usize, size: usize) -> Self {
        Self { offset, len, size }
    }

    /// Check that `len` bytes at `offset` fit inside `size`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfBounds`] if `offset + len` overflows or exceeds `size`.
    #[inline]
    pub fn check(offset: usize, len: usize, size: usize) -> Result<(), Self> {
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(Self::new(offset, len, size)),
        }
    }

    /// Number of bytes that were actually available at the offset.
    pub fn available(&self) -> usize {
        self.size.saturating_sub(self.offset)
    }
}
