//! Splitting images into address-tagged transfer chunks and back.
//!
//! A [`ChunkSequence`] precomputes chunk boundaries once and hands out
//! chunks by index as zero-copy slices of the source, so a caller that
//! retries chunk `i` after having sent `i + 5` gets the same bytes and
//! address again.

use bytes::{Bytes, BytesMut};
use fwkit_errors::{FormatError, FormatResult};

/// One bounded slice of an image, tagged with its device address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    idx: usize,
    page: u32,
    address: u64,
    data: Bytes,
}

impl Chunk {
    /// Create a chunk, e.g. for data read back from a device.
    pub fn new(idx: usize, address: u64, data: Bytes) -> Self {
        Self {
            idx,
            page: 0,
            address,
            data,
        }
    }

    /// Zero-based position in the sequence.
    pub fn idx(&self) -> usize {
        self.idx
    }

    /// Page index of the chunk start, 0 when no page size was given.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Absolute device address of the first byte.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Chunk payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A finite, indexable, restartable sequence of chunks.
#[derive(Debug, Clone)]
pub struct ChunkSequence {
    source: Bytes,
    address_base: u64,
    page_size: u32,
    bounds: Vec<(usize, usize)>,
}

/// Split `data` into chunks of at most `max_chunk_size` bytes.
///
/// Addresses start at `address_base` and advance by each chunk's length.
/// With a non-zero `page_size`, no chunk crosses a page boundary of the
/// absolute address space, which may shorten the chunk before each edge.
/// A `max_chunk_size` of zero means no size bound.
pub fn split(data: Bytes, address_base: u64, page_size: u32, max_chunk_size: usize) -> ChunkSequence {
    let max = if max_chunk_size == 0 { usize::MAX } else { max_chunk_size };
    let page = u64::from(page_size);
    let mut bounds = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        let mut len = max.min(data.len().saturating_sub(offset));
        if page > 0 {
            let abs = address_base.saturating_add(offset as u64);
            let to_edge = page.saturating_sub(abs % page);
            len = len.min(usize::try_from(to_edge).unwrap_or(usize::MAX));
        }
        bounds.push((offset, len));
        offset = offset.saturating_add(len);
    }
    ChunkSequence {
        source: data,
        address_base,
        page_size,
        bounds,
    }
}

impl ChunkSequence {
    /// Chunk `idx`, or `None` past the end.
    pub fn get(&self, idx: usize) -> Option<Chunk> {
        let &(offset, len) = self.bounds.get(idx)?;
        let address = self.address_base.saturating_add(offset as u64);
        let page = match self.page_size {
            0 => 0,
            size => u32::try_from(address / u64::from(size)).unwrap_or(u32::MAX),
        };
        Some(Chunk {
            idx,
            page,
            address,
            data: self.source.slice(offset..offset.saturating_add(len)),
        })
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether there are no chunks.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Total payload bytes across all chunks.
    pub fn total_len(&self) -> usize {
        self.source.len()
    }

    /// Address of the first chunk.
    pub fn address_base(&self) -> u64 {
        self.address_base
    }

    /// Iterate from chunk 0. Each call starts over.
    pub fn iter(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

/// Rebuild a contiguous image from chunks, e.g. data read back for
/// verification. Chunks may arrive in any order.
///
/// # Errors
///
/// Returns [`FormatError::ChunkGap`] or [`FormatError::ChunkOverlap`] if
/// the chunks do not exactly tile the range they cover.
pub fn reassemble<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> FormatResult<Bytes> {
    let mut sorted: Vec<&Chunk> = chunks.into_iter().collect();
    sorted.sort_by_key(|c| c.address);
    let Some(first) = sorted.first() else {
        return Ok(Bytes::new());
    };
    let mut expected = first.address;
    let mut out = BytesMut::with_capacity(sorted.iter().map(|c| c.len()).sum());
    for chunk in sorted {
        if chunk.address > expected {
            return Err(FormatError::ChunkGap {
                expected,
                actual: chunk.address,
            });
        }
        if chunk.address < expected {
            return Err(FormatError::ChunkOverlap {
                expected,
                actual: chunk.address,
            });
        }
        out.extend_from_slice(&chunk.data);
        expected = expected.saturating_add(chunk.len() as u64);
    }
    Ok(out.freeze())
}

/// Pad `data` with `fill` up to a multiple of `align`. An `align` of zero
/// leaves the data unchanged.
pub fn pad_to_alignment(data: &[u8], align: usize, fill: u8) -> Bytes {
    let mut out = data.to_vec();
    if align > 0 {
        out.resize(data.len().next_multiple_of(align), fill);
    }
    Bytes::from(out)
}
