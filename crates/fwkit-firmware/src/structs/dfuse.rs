//! DfuSe prefix, target and element records.

use fwkit_errors::{FormatError, FormatResult};
use fwkit_stream::{ByteWriter, Endian};

use super::{BinaryStruct, Field, StructReader, accessors, check_c_string, write_padded};

/// Encoded size of the DfuSe prefix.
pub const DFUSE_HEADER_SIZE: usize = 11;

/// Encoded size of a target prefix.
pub const DFUSE_TARGET_SIZE: usize = 274;

/// Encoded size of an element header.
pub const DFUSE_ELEMENT_SIZE: usize = 8;

const HDR_SIGNATURE: Field = Field::new("signature", 0, 5);
const HDR_VERSION: Field = Field::new("version", 5, 1);
const HDR_IMAGE_SIZE: Field = Field::new("image_size", 6, 4);
const HDR_TARGETS: Field = Field::new("targets", 10, 1);
const HDR_LAYOUT: &[Field] = &[HDR_SIGNATURE, HDR_VERSION, HDR_IMAGE_SIZE, HDR_TARGETS];

/// File prefix: signature, version, total image size and target count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfuseHeader {
    version: u8,
    image_size: u32,
    targets: u8,
}

impl Default for DfuseHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl DfuseHeader {
    /// An empty version 1 prefix.
    pub fn new() -> Self {
        Self {
            version: 0x01,
            image_size: 0,
            targets: 0,
        }
    }
}

accessors!(DfuseHeader {
    /// Format version, always 1
    version / set_version: u8,
    /// Size of the file excluding the DFU suffix
    image_size / set_image_size: u32,
    /// Number of target records
    targets / set_targets: u8,
});

impl BinaryStruct for DfuseHeader {
    const NAME: &'static str = "DfuseHeader";
    const SIZE: usize = DFUSE_HEADER_SIZE;

    fn parse(buf: &[u8], offset: usize) -> FormatResult<Self> {
        let r = StructReader::new(Self::NAME, buf, offset, HDR_LAYOUT)?;
        r.expect_magic(&HDR_SIGNATURE, b"DfuSe")?;
        let version = r.u8(&HDR_VERSION)?;
        if version != 0x01 {
            return Err(FormatError::unsupported("DfuSe version", format!("{version:#04x}")));
        }
        Ok(Self {
            version,
            image_size: r.u32(&HDR_IMAGE_SIZE, Endian::Little)?,
            targets: r.u8(&HDR_TARGETS)?,
        })
    }

    fn write_into(&self, writer: &mut ByteWriter) {
        writer
            .write_bytes(b"DfuSe")
            .write_u8(self.version)
            .write_u32(self.image_size, Endian::Little)
            .write_u8(self.targets);
    }
}

const TGT_SIGNATURE: Field = Field::new("signature", 0, 6);
const TGT_ALT_SETTING: Field = Field::new("alt_setting", 6, 1);
const TGT_NAMED: Field = Field::new("target_named", 7, 4);
const TGT_NAME: Field = Field::new("target_name", 11, 255);
const TGT_SIZE: Field = Field::new("target_size", 266, 4);
const TGT_CHUNKS: Field = Field::new("chunks", 270, 4);
const TGT_LAYOUT: &[Field] = &[
    TGT_SIGNATURE,
    TGT_ALT_SETTING,
    TGT_NAMED,
    TGT_NAME,
    TGT_SIZE,
    TGT_CHUNKS,
];

/// Target prefix describing one alternate setting and its elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DfuseTarget {
    alt_setting: u8,
    target_name: Option<String>,
    target_size: u32,
    chunks: u32,
}

impl DfuseTarget {
    /// An unnamed target for alternate setting 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target name, if the target is named.
    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    /// Set or clear the target name.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::StringTooLong`] if the name exceeds 254 bytes,
    /// the field width less its NUL terminator.
    pub fn set_target_name(&mut self, name: Option<&str>) -> FormatResult<&mut Self> {
        if let Some(name) = name {
            check_c_string(&TGT_NAME, name)?;
        }
        self.target_name = name.map(str::to_string);
        Ok(self)
    }
}

accessors!(DfuseTarget {
    /// USB alternate setting
    alt_setting / set_alt_setting: u8,
    /// Total size of the element records that follow
    target_size / set_target_size: u32,
    /// Number of element records that follow
    chunks / set_chunks: u32,
});

impl BinaryStruct for DfuseTarget {
    const NAME: &'static str = "DfuseTarget";
    const SIZE: usize = DFUSE_TARGET_SIZE;

    fn parse(buf: &[u8], offset: usize) -> FormatResult<Self> {
        let r = StructReader::new(Self::NAME, buf, offset, TGT_LAYOUT)?;
        r.expect_magic(&TGT_SIGNATURE, b"Target")?;
        let named = r.u32(&TGT_NAMED, Endian::Little)? != 0;
        let target_name = if named { Some(r.string(&TGT_NAME)?) } else { None };
        Ok(Self {
            alt_setting: r.u8(&TGT_ALT_SETTING)?,
            target_name,
            target_size: r.u32(&TGT_SIZE, Endian::Little)?,
            chunks: r.u32(&TGT_CHUNKS, Endian::Little)?,
        })
    }

    fn write_into(&self, writer: &mut ByteWriter) {
        writer
            .write_bytes(b"Target")
            .write_u8(self.alt_setting)
            .write_u32(u32::from(self.target_name.is_some()), Endian::Little);
        let name = self.target_name.as_deref().unwrap_or_default();
        write_padded(writer, &TGT_NAME, name.as_bytes());
        writer
            .write_u32(self.target_size, Endian::Little)
            .write_u32(self.chunks, Endian::Little);
    }
}

const ELE_ADDRESS: Field = Field::new("address", 0, 4);
const ELE_SIZE: Field = Field::new("size", 4, 4);
const ELE_LAYOUT: &[Field] = &[ELE_ADDRESS, ELE_SIZE];

/// Element header: the data that follows is `size` bytes for `address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DfuseElement {
    address: u32,
    size: u32,
}

impl DfuseElement {
    /// An empty element at address 0.
    pub fn new() -> Self {
        Self::default()
    }
}

accessors!(DfuseElement {
    /// Target memory address
    address / set_address: u32,
    /// Size of the data that follows
    size / set_size: u32,
});

impl BinaryStruct for DfuseElement {
    const NAME: &'static str = "DfuseElement";
    const SIZE: usize = DFUSE_ELEMENT_SIZE;

    fn parse(buf: &[u8], offset: usize) -> FormatResult<Self> {
        let r = StructReader::new(Self::NAME, buf, offset, ELE_LAYOUT)?;
        Ok(Self {
            address: r.u32(&ELE_ADDRESS, Endian::Little)?,
            size: r.u32(&ELE_SIZE, Endian::Little)?,
        })
    }

    fn write_into(&self, writer: &mut ByteWriter) {
        writer
            .write_u32(self.address, Endian::Little)
            .write_u32(self.size, Endian::Little);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() -> FormatResult<()> {
        let mut hdr = DfuseHeader::new();
        hdr.set_image_size(0x1234).set_targets(2);
        let bytes = hdr.serialize();
        assert_eq!(bytes.len(), DFUSE_HEADER_SIZE);
        assert_eq!(DfuseHeader::parse(&bytes, 0)?, hdr);
        Ok(())
    }

    #[test]
    fn test_header_rejects_version() {
        let mut bytes = DfuseHeader::new().serialize().to_vec();
        if let Some(v) = bytes.get_mut(5) {
            *v = 2;
        }
        assert!(matches!(
            DfuseHeader::parse(&bytes, 0),
            Err(FormatError::UnsupportedVariant { .. })
        ));
    }

    #[test]
    fn test_target_name_is_nul_terminated() -> FormatResult<()> {
        let mut tgt = DfuseTarget::new();
        tgt.set_target_name(Some("ST..."))?.set_alt_setting(1).set_chunks(3);
        let bytes = tgt.serialize();
        assert_eq!(bytes.len(), DFUSE_TARGET_SIZE);
        let parsed = DfuseTarget::parse(&bytes, 0)?;
        assert_eq!(parsed.target_name(), Some("ST..."));
        assert_eq!(parsed.alt_setting(), 1);
        assert_eq!(parsed.chunks(), 3);
        Ok(())
    }

    #[test]
    fn test_target_name_too_long() {
        let mut tgt = DfuseTarget::new();
        let name = "n".repeat(255);
        assert!(matches!(
            tgt.set_target_name(Some(&name)),
            Err(FormatError::StringTooLong { max: 254, actual: 255, .. })
        ));
        assert_eq!(tgt.target_name(), None);
    }

    #[test]
    fn test_longest_target_name_keeps_terminator() -> FormatResult<()> {
        let mut tgt = DfuseTarget::new();
        let name = "n".repeat(254);
        tgt.set_target_name(Some(&name))?;
        let bytes = tgt.serialize();
        // last byte of the name field
        assert_eq!(bytes.get(265), Some(&0));
        assert_eq!(DfuseTarget::parse(&bytes, 0)?.target_name(), Some(name.as_str()));
        Ok(())
    }

    #[test]
    fn test_unnamed_target_ignores_name_bytes() -> FormatResult<()> {
        let mut bytes = DfuseTarget::new().serialize().to_vec();
        if let Some(b) = bytes.get_mut(11) {
            *b = b'X';
        }
        assert_eq!(DfuseTarget::parse(&bytes, 0)?.target_name(), None);
        Ok(())
    }

    #[test]
    fn test_element_truncated() {
        let err = DfuseElement::parse(&[0u8; 6], 0).err();
        assert!(matches!(err, Some(FormatError::Truncated { field: "size", .. })));
    }
}
