//! Generic ACPI system description table header.

use fwkit_errors::FormatResult;
use fwkit_stream::{ByteWriter, Endian};

use super::{BinaryStruct, Field, StructReader, accessors, check_string, write_padded};

/// Encoded size of the common ACPI table header.
pub const ACPI_TABLE_HEADER_SIZE: usize = 36;

const SIGNATURE: Field = Field::new("signature", 0, 4);
const LENGTH: Field = Field::new("length", 4, 4);
const REVISION: Field = Field::new("revision", 8, 1);
const CHECKSUM: Field = Field::new("checksum", 9, 1);
const OEM_ID: Field = Field::new("oem_id", 10, 6);
const OEM_TABLE_ID: Field = Field::new("oem_table_id", 16, 8);
const OEM_REVISION: Field = Field::new("oem_revision", 24, 4);
const CREATOR_ID: Field = Field::new("creator_id", 28, 4);
const CREATOR_REVISION: Field = Field::new("creator_revision", 32, 4);
const LAYOUT: &[Field] = &[
    SIGNATURE,
    LENGTH,
    REVISION,
    CHECKSUM,
    OEM_ID,
    OEM_TABLE_ID,
    OEM_REVISION,
    CREATOR_ID,
    CREATOR_REVISION,
];

/// The 36-byte header shared by every ACPI table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcpiTableHeader {
    signature: [u8; 4],
    length: u32,
    revision: u8,
    checksum: u8,
    oem_id: String,
    oem_table_id: String,
    oem_revision: u32,
    creator_id: [u8; 4],
    creator_revision: u32,
}

impl AcpiTableHeader {
    /// A header for a table with the given four-character signature.
    pub fn new(signature: [u8; 4]) -> Self {
        Self {
            signature,
            length: ACPI_TABLE_HEADER_SIZE as u32,
            ..Self::default()
        }
    }

    /// Signature as text, e.g. `"DMAR"`.
    pub fn signature_str(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }

    /// OEM id.
    pub fn oem_id(&self) -> &str {
        &self.oem_id
    }

    /// Set the OEM id.
    ///
    /// # Errors
    ///
    /// Returns [`fwkit_errors::FormatError::StringTooLong`] above 6 bytes.
    pub fn set_oem_id(&mut self, value: &str) -> FormatResult<&mut Self> {
        check_string(&OEM_ID, value)?;
        self.oem_id = value.to_string();
        Ok(self)
    }

    /// OEM table id.
    pub fn oem_table_id(&self) -> &str {
        &self.oem_table_id
    }

    /// Set the OEM table id.
    ///
    /// # Errors
    ///
    /// Returns [`fwkit_errors::FormatError::StringTooLong`] above 8 bytes.
    pub fn set_oem_table_id(&mut self, value: &str) -> FormatResult<&mut Self> {
        check_string(&OEM_TABLE_ID, value)?;
        self.oem_table_id = value.to_string();
        Ok(self)
    }
}

accessors!(AcpiTableHeader {
    /// Four-character table signature
    signature / set_signature: [u8; 4],
    /// Length of the whole table, including this header
    length / set_length: u32,
    /// Table revision
    revision / set_revision: u8,
    /// Byte that makes the whole table sum to zero
    checksum / set_checksum: u8,
    /// OEM revision
    oem_revision / set_oem_revision: u32,
    /// Id of the tool that created the table
    creator_id / set_creator_id: [u8; 4],
    /// Revision of the tool that created the table
    creator_revision / set_creator_revision: u32,
});

impl BinaryStruct for AcpiTableHeader {
    const NAME: &'static str = "AcpiTable";
    const SIZE: usize = ACPI_TABLE_HEADER_SIZE;

    fn parse(buf: &[u8], offset: usize) -> FormatResult<Self> {
        let r = StructReader::new(Self::NAME, buf, offset, LAYOUT)?;
        Ok(Self {
            signature: r.array(&SIGNATURE)?,
            length: r.u32(&LENGTH, Endian::Little)?,
            revision: r.u8(&REVISION)?,
            checksum: r.u8(&CHECKSUM)?,
            oem_id: r.string(&OEM_ID)?,
            oem_table_id: r.string(&OEM_TABLE_ID)?,
            oem_revision: r.u32(&OEM_REVISION, Endian::Little)?,
            creator_id: r.array(&CREATOR_ID)?,
            creator_revision: r.u32(&CREATOR_REVISION, Endian::Little)?,
        })
    }

    fn write_into(&self, writer: &mut ByteWriter) {
        writer
            .write_bytes(&self.signature)
            .write_u32(self.length, Endian::Little)
            .write_u8(self.revision)
            .write_u8(self.checksum);
        write_padded(writer, &OEM_ID, self.oem_id.as_bytes());
        write_padded(writer, &OEM_TABLE_ID, self.oem_table_id.as_bytes());
        writer
            .write_u32(self.oem_revision, Endian::Little)
            .write_bytes(&self.creator_id)
            .write_u32(self.creator_revision, Endian::Little);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() -> FormatResult<()> {
        let mut hdr = AcpiTableHeader::new(*b"DMAR");
        hdr.set_oem_id("INTEL")?.set_oem_table_id("EDK2")?;
        hdr.set_revision(1).set_creator_id(*b"INTL");
        let bytes = hdr.serialize();
        assert_eq!(bytes.len(), ACPI_TABLE_HEADER_SIZE);
        let parsed = AcpiTableHeader::parse(&bytes, 0)?;
        assert_eq!(parsed, hdr);
        assert_eq!(parsed.signature_str(), "DMAR");
        Ok(())
    }

    #[test]
    fn test_oem_id_too_long() {
        let mut hdr = AcpiTableHeader::new(*b"IVRS");
        assert!(hdr.set_oem_id("TOOLONG").is_err());
    }
}
