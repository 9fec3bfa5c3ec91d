//! Seekable stream views.
//!
//! All streams here follow conventional [`Read`]/[`Seek`] semantics: seeking
//! returns the new absolute offset, seeking before the start is an
//! `InvalidInput` error, and reads at or after the end return zero bytes
//! rather than failing, so parsers can try a read and fall back.
//!
//! [`CompositeStream`] never reads across a segment boundary in a single
//! call. A read that would cross one returns only the bytes left in the
//! current segment and the caller retries at the advanced offset, which
//! [`read_exact_at`] does automatically.

use std::io::{self, Read, Seek, SeekFrom};

use bytes::Bytes;
use tracing::trace;

/// A readable, seekable stream with a declared size.
pub trait StreamView: Read + Seek {
    /// Declared length of the stream in bytes.
    fn size(&self) -> u64;

    /// Read the whole stream from the start into memory.
    fn to_bytes(&mut self) -> io::Result<Bytes> {
        self.seek(SeekFrom::Start(0))?;
        let mut out = Vec::with_capacity(usize::try_from(self.size()).unwrap_or(0));
        self.read_to_end(&mut out)?;
        Ok(Bytes::from(out))
    }
}

impl<S: StreamView + ?Sized> StreamView for Box<S> {
    fn size(&self) -> u64 {
        (**self).size()
    }
}

fn resolve_seek(pos: u64, size: u64, from: SeekFrom) -> io::Result<u64> {
    let target = match from {
        SeekFrom::Start(n) => Some(n),
        SeekFrom::Current(delta) => pos.checked_add_signed(delta),
        SeekFrom::End(delta) => size.checked_add_signed(delta),
    };
    target.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid seek to a negative or overflowing position",
        )
    })
}

fn clamp_len(buf_len: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(buf_len, |r| r.min(buf_len))
}

/// An in-memory stream over shared bytes.
#[derive(Debug, Clone, Default)]
pub struct BytesStream {
    data: Bytes,
    pos: u64,
}

impl BytesStream {
    /// Create a stream positioned at the start.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// The underlying bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl Read for BytesStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(self.pos) else {
            return Ok(0);
        };
        let mut src: &[u8] = self.data.get(start..).unwrap_or_default();
        let n = src.read(buf)?;
        self.pos = self.pos.saturating_add(n as u64);
        Ok(n)
    }
}

impl Seek for BytesStream {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(self.pos, self.size(), from)?;
        Ok(self.pos)
    }
}

impl StreamView for BytesStream {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A window of `size` bytes starting at `offset` inside another stream.
///
/// Offsets are relative to the window; nothing outside it is reachable.
#[derive(Debug)]
pub struct PartialStream<S> {
    inner: S,
    offset: u64,
    size: u64,
    pos: u64,
}

impl<S: StreamView> PartialStream<S> {
    /// Create a window over `inner`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the window extends past the end of `inner`.
    pub fn new(inner: S, offset: u64, size: u64) -> io::Result<Self> {
        let fits = offset
            .checked_add(size)
            .is_some_and(|end| end <= inner.size());
        if !fits {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "partial stream {offset:#x}+{size:#x} exceeds base size {:#x}",
                    inner.size()
                ),
            ));
        }
        Ok(Self {
            inner,
            offset,
            size,
            pos: 0,
        })
    }

    /// Offset of the window inside the base stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The base stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consume the window, returning the base stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: StreamView> Read for PartialStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.size {
            return Ok(0);
        }
        let want = clamp_len(buf.len(), self.size.saturating_sub(self.pos));
        self.inner
            .seek(SeekFrom::Start(self.offset.saturating_add(self.pos)))?;
        let dst = buf.get_mut(..want).unwrap_or_default();
        let n = self.inner.read(dst)?;
        self.pos = self.pos.saturating_add(n as u64);
        Ok(n)
    }
}

impl<S: StreamView> Seek for PartialStream<S> {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(self.pos, self.size, from)?;
        Ok(self.pos)
    }
}

impl<S: StreamView> StreamView for PartialStream<S> {
    fn size(&self) -> u64 {
        self.size
    }
}

struct Segment {
    start: u64,
    len: u64,
    stream: Box<dyn StreamView + Send>,
}

/// Several streams presented as one contiguous address space.
#[derive(Default)]
pub struct CompositeStream {
    segments: Vec<Segment>,
    size: u64,
    pos: u64,
}

impl std::fmt::Debug for CompositeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeStream")
            .field("segments", &self.segments.len())
            .field("size", &self.size)
            .field("pos", &self.pos)
            .finish()
    }
}

impl CompositeStream {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stream after the current end.
    pub fn push(&mut self, stream: impl StreamView + Send + 'static) -> &mut Self {
        let len = stream.size();
        trace!(start = self.size, len, "composite stream segment added");
        self.segments.push(Segment {
            start: self.size,
            len,
            stream: Box::new(stream),
        });
        self.size = self.size.saturating_add(len);
        self
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

impl Read for CompositeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.pos;
        let Some(seg) = self
            .segments
            .iter_mut()
            .find(|s| pos >= s.start && pos < s.start.saturating_add(s.len))
        else {
            return Ok(0);
        };
        let local = pos.saturating_sub(seg.start);
        let want = clamp_len(buf.len(), seg.len.saturating_sub(local));
        seg.stream.seek(SeekFrom::Start(local))?;
        let dst = buf.get_mut(..want).unwrap_or_default();
        let n = seg.stream.read(dst)?;
        self.pos = self.pos.saturating_add(n as u64);
        Ok(n)
    }
}

impl Seek for CompositeStream {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(self.pos, self.size, from)?;
        Ok(self.pos)
    }
}

impl StreamView for CompositeStream {
    fn size(&self) -> u64 {
        self.size
    }
}

/// Fill `buf` from `offset`, retrying partial reads across segment edges.
///
/// # Errors
///
/// Returns `UnexpectedEof` if the stream ends before `buf` is full. An
/// empty `buf` succeeds at any offset, including past the end.
pub fn read_exact_at<S: Read + Seek + ?Sized>(
    stream: &mut S,
    offset: u64,
    buf: &mut [u8],
) -> io::Result<()> {
    stream.seek(SeekFrom::Start(offset))?;
    stream.read_exact(buf)
}

/// Read exactly `len` bytes at `offset` into a new buffer.
///
/// # Errors
///
/// Returns `UnexpectedEof` if fewer than `len` bytes are available.
pub fn read_bytes_at<S: Read + Seek + ?Sized>(
    stream: &mut S,
    offset: u64,
    len: usize,
) -> io::Result<Bytes> {
    let mut out = vec![0u8; len];
    read_exact_at(stream, offset, &mut out)?;
    Ok(Bytes::from(out))
}
