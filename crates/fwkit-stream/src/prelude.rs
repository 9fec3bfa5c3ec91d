//! Convenience re-exports for stream access

pub use crate::endian::Endian;
pub use crate::reader::ByteReader;
pub use crate::stream::{
    BytesStream, CompositeStream, PartialStream, StreamView, read_bytes_at, read_exact_at,
};
pub use crate::writer::ByteWriter;
pub use fwkit_errors::OutOfBounds;
