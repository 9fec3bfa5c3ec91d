//! `EFI_SIGNATURE_LIST` header.

use fwkit_errors::FormatResult;
use fwkit_stream::{ByteWriter, Endian};
use uuid::Uuid;

use super::{BinaryStruct, Field, StructReader, accessors};

/// Encoded size of a signature list header.
pub const EFI_SIGNATURE_LIST_HEADER_SIZE: usize = 0x1c;

const TYPE_GUID: Field = Field::new("signature_type", 0x00, 16);
const LIST_SIZE: Field = Field::new("list_size", 0x10, 4);
const HEADER_SIZE: Field = Field::new("header_size", 0x14, 4);
const ENTRY_SIZE: Field = Field::new("entry_size", 0x18, 4);
const LAYOUT: &[Field] = &[TYPE_GUID, LIST_SIZE, HEADER_SIZE, ENTRY_SIZE];

/// Header of one signature list. GUIDs use the mixed-endian EFI encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EfiSignatureListHeader {
    type_guid: Uuid,
    list_size: u32,
    header_size: u32,
    entry_size: u32,
}

impl EfiSignatureListHeader {
    /// An empty header with a nil type GUID.
    pub fn new() -> Self {
        Self::default()
    }
}

accessors!(EfiSignatureListHeader {
    /// Signature type GUID
    type_guid / set_type_guid: Uuid,
    /// Total size of the list, including this header
    list_size / set_list_size: u32,
    /// Size of the vendor header that follows this header
    header_size / set_header_size: u32,
    /// Size of each entry, including its owner GUID
    entry_size / set_entry_size: u32,
});

impl BinaryStruct for EfiSignatureListHeader {
    const NAME: &'static str = "EfiSignatureList";
    const SIZE: usize = EFI_SIGNATURE_LIST_HEADER_SIZE;

    fn parse(buf: &[u8], offset: usize) -> FormatResult<Self> {
        let r = StructReader::new(Self::NAME, buf, offset, LAYOUT)?;
        Ok(Self {
            type_guid: Uuid::from_bytes_le(r.array(&TYPE_GUID)?),
            list_size: r.u32(&LIST_SIZE, Endian::Little)?,
            header_size: r.u32(&HEADER_SIZE, Endian::Little)?,
            entry_size: r.u32(&ENTRY_SIZE, Endian::Little)?,
        })
    }

    fn write_into(&self, writer: &mut ByteWriter) {
        writer
            .write_bytes(&self.type_guid.to_bytes_le())
            .write_u32(self.list_size, Endian::Little)
            .write_u32(self.header_size, Endian::Little)
            .write_u32(self.entry_size, Endian::Little);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::EFI_CERT_SHA256_GUID;

    #[test]
    fn test_guid_is_mixed_endian() -> FormatResult<()> {
        let mut hdr = EfiSignatureListHeader::new();
        hdr.set_type_guid(EFI_CERT_SHA256_GUID)
            .set_list_size(0x4c)
            .set_entry_size(0x30);
        let bytes = hdr.serialize();
        assert_eq!(bytes.get(..4), Some(&[0x26, 0x16, 0xc4, 0xc1][..]));
        assert_eq!(EfiSignatureListHeader::parse(&bytes, 0)?, hdr);
        Ok(())
    }
}
