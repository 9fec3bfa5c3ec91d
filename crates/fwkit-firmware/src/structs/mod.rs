//! Fixed-layout binary structures.
//!
//! Each structure declares its layout as a table of [`Field`]s. Parsing
//! first checks every field against the buffer, so a short buffer is
//! reported against the first field that does not fit, with the expected
//! and available byte counts. Multi-byte fields name their byte order at
//! each read.

use bytes::Bytes;
use fwkit_errors::{FormatError, FormatResult, OutOfBounds};
use fwkit_stream::{ByteReader, ByteWriter, Endian};

pub mod acpi;
pub mod dfu;
pub mod dfuse;
pub mod efi;
pub mod uf2;

pub use acpi::{ACPI_TABLE_HEADER_SIZE, AcpiTableHeader};
pub use dfu::{DFU_FOOTER_SIZE, DFU_VERSION_DFU_1_0, DFU_VERSION_DFUSE, DfuFooter};
pub use dfuse::{DFUSE_ELEMENT_SIZE, DFUSE_HEADER_SIZE, DFUSE_TARGET_SIZE, DfuseElement, DfuseHeader, DfuseTarget};
pub use efi::{EFI_SIGNATURE_LIST_HEADER_SIZE, EfiSignatureListHeader};
pub use uf2::{UF2_BLOCK_SIZE, UF2_PAYLOAD_MAX, Uf2Block, Uf2Flags};

/// A named field at a fixed offset inside a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name used in error messages
    pub name: &'static str,
    /// Offset from the start of the structure
    pub offset: usize,
    /// Width in bytes
    pub len: usize,
}

impl Field {
    /// Declare a field.
    pub const fn new(name: &'static str, offset: usize, len: usize) -> Self {
        Self { name, offset, len }
    }
}

/// A structure with a fixed binary layout.
pub trait BinaryStruct: Sized {
    /// Structure name used in error messages.
    const NAME: &'static str;
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode the structure at `offset` in `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Truncated`] naming the first field that does
    /// not fit, or a signature/size error for invalid contents.
    fn parse(buf: &[u8], offset: usize) -> FormatResult<Self>;

    /// Append the encoded structure to `writer`.
    fn write_into(&self, writer: &mut ByteWriter);

    /// Encode the structure into a new buffer.
    fn serialize(&self) -> Bytes {
        let mut writer = ByteWriter::with_capacity(Self::SIZE);
        self.write_into(&mut writer);
        writer.into_bytes()
    }
}

/// Field-aware reader used by the structure parsers.
pub(crate) struct StructReader<'a> {
    structure: &'static str,
    reader: ByteReader<'a>,
    base: usize,
}

impl<'a> StructReader<'a> {
    pub(crate) fn new(
        structure: &'static str,
        buf: &'a [u8],
        base: usize,
        layout: &[Field],
    ) -> FormatResult<Self> {
        let this = Self {
            structure,
            reader: ByteReader::new(buf),
            base,
        };
        for field in layout {
            this.reader
                .read_bytes(this.abs(field), field.len)
                .map_err(|e| this.truncated(field, e))?;
        }
        Ok(this)
    }

    fn abs(&self, field: &Field) -> usize {
        self.base.saturating_add(field.offset)
    }

    fn truncated(&self, field: &Field, cause: OutOfBounds) -> FormatError {
        FormatError::Truncated {
            structure: self.structure,
            field: field.name,
            offset: cause.offset,
            expected: field.len,
            actual: cause.available().min(field.len),
        }
    }

    pub(crate) fn u8(&self, field: &Field) -> FormatResult<u8> {
        self.reader
            .read_u8(self.abs(field))
            .map_err(|e| self.truncated(field, e))
    }

    pub(crate) fn u16(&self, field: &Field, endian: Endian) -> FormatResult<u16> {
        self.reader
            .read_u16(self.abs(field), endian)
            .map_err(|e| self.truncated(field, e))
    }

    pub(crate) fn u32(&self, field: &Field, endian: Endian) -> FormatResult<u32> {
        self.reader
            .read_u32(self.abs(field), endian)
            .map_err(|e| self.truncated(field, e))
    }

    pub(crate) fn bytes(&self, field: &Field) -> FormatResult<&'a [u8]> {
        self.reader
            .read_bytes(self.abs(field), field.len)
            .map_err(|e| self.truncated(field, e))
    }

    pub(crate) fn array<const N: usize>(&self, field: &Field) -> FormatResult<[u8; N]> {
        self.reader
            .read_array::<N>(self.abs(field))
            .map_err(|e| self.truncated(field, e))
    }

    pub(crate) fn string(&self, field: &Field) -> FormatResult<String> {
        self.reader
            .read_fixed_string(self.abs(field), field.len)
            .map_err(|e| self.truncated(field, e))
    }

    /// Check a magic value, reporting the bytes actually found.
    pub(crate) fn expect_magic(&self, field: &Field, magic: &[u8]) -> FormatResult<()> {
        let found = self.bytes(field)?;
        if found != magic {
            return Err(FormatError::invalid_signature(
                self.structure,
                String::from_utf8_lossy(magic),
                found,
            ));
        }
        Ok(())
    }
}

/// Check a string fits a fixed-size field before it is stored.
pub(crate) fn check_string(field: &Field, value: &str) -> FormatResult<()> {
    if value.len() > field.len {
        return Err(FormatError::StringTooLong {
            field: field.name,
            max: field.len,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Reject a string that leaves no room for the NUL terminator of `field`.
pub(crate) fn check_c_string(field: &Field, value: &str) -> FormatResult<()> {
    let max = field.len.saturating_sub(1);
    if value.len() > max {
        return Err(FormatError::StringTooLong {
            field: field.name,
            max,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Write a string NUL-padded to the width of `field`.
pub(crate) fn write_padded(writer: &mut ByteWriter, field: &Field, value: &[u8]) {
    let n = value.len().min(field.len);
    writer
        .write_bytes(value.get(..n).unwrap_or_default())
        .write_fill(0, field.len.saturating_sub(n));
}

/// Narrow a value to a `u32` field, failing rather than truncating.
pub(crate) fn fit_u32(field: &'static str, value: u64) -> FormatResult<u32> {
    u32::try_from(value).or(Err(FormatError::invalid_size(field, "<= 0xffffffff", value)))
}

/// Narrow a value to a `u8` field, failing rather than truncating.
pub(crate) fn fit_u8(field: &'static str, value: u64) -> FormatResult<u8> {
    u8::try_from(value).or(Err(FormatError::invalid_size(field, "<= 0xff", value)))
}

/// Generate a getter and a chaining setter for each `Copy` field.
macro_rules! accessors {
    ($ty:ty { $($(#[$doc:meta])* $field:ident / $setter:ident : $fty:ty),* $(,)? }) => {
        impl $ty {
            $(
                $(#[$doc])*
                pub fn $field(&self) -> $fty {
                    self.$field
                }

                #[doc = concat!("Set `", stringify!($field), "`.")]
                pub fn $setter(&mut self, value: $fty) -> &mut Self {
                    self.$field = value;
                    self
                }
            )*
        }
    };
}
pub(crate) use accessors;
