//! UF2 flashing block.

use bitflags::bitflags;
use bytes::Bytes;
use fwkit_errors::{FormatError, FormatResult};
use fwkit_stream::{ByteWriter, Endian};

use super::{BinaryStruct, Field, StructReader, accessors};

/// Encoded size of a block.
pub const UF2_BLOCK_SIZE: usize = 512;

/// Maximum payload carried by one block.
pub const UF2_PAYLOAD_MAX: usize = 476;

const UF2_MAGIC_START0: u32 = 0x0A32_4655;
const UF2_MAGIC_START1: u32 = 0x9E5D_5157;
const UF2_MAGIC_END: u32 = 0x0AB1_6F30;

bitflags! {
    /// Per-block flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Uf2Flags: u32 {
        /// Block is not for main flash and should be skipped
        const NOT_MAIN_FLASH = 0x0000_0001;
        /// Block is part of a file container
        const FILE_CONTAINER = 0x0000_1000;
        /// `family_id` is valid
        const FAMILY_ID_PRESENT = 0x0000_2000;
        /// An MD5 checksum follows the payload
        const MD5_PRESENT = 0x0000_4000;
        /// Extension tags follow the payload
        const EXTENSION_TAGS = 0x0000_8000;
    }
}

const MAGIC0: Field = Field::new("magic0", 0, 4);
const MAGIC1: Field = Field::new("magic1", 4, 4);
const FLAGS: Field = Field::new("flags", 8, 4);
const TARGET_ADDR: Field = Field::new("target_addr", 12, 4);
const PAYLOAD_SIZE: Field = Field::new("payload_size", 16, 4);
const BLOCK_NO: Field = Field::new("block_no", 20, 4);
const NUM_BLOCKS: Field = Field::new("num_blocks", 24, 4);
const FAMILY_ID: Field = Field::new("family_id", 28, 4);
const DATA: Field = Field::new("data", 32, UF2_PAYLOAD_MAX);
const MAGIC_END: Field = Field::new("magic_end", 508, 4);
const LAYOUT: &[Field] = &[
    MAGIC0,
    MAGIC1,
    FLAGS,
    TARGET_ADDR,
    PAYLOAD_SIZE,
    BLOCK_NO,
    NUM_BLOCKS,
    FAMILY_ID,
    DATA,
    MAGIC_END,
];

/// One 512-byte UF2 block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Uf2Block {
    flags: Uf2Flags,
    target_addr: u32,
    block_no: u32,
    num_blocks: u32,
    family_id: u32,
    data: Bytes,
}

impl Uf2Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Set the payload.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::InvalidSize`] above 476 bytes.
    pub fn set_data(&mut self, data: Bytes) -> FormatResult<&mut Self> {
        if data.len() > UF2_PAYLOAD_MAX {
            return Err(FormatError::invalid_size(
                "payload_size",
                format!("<= {UF2_PAYLOAD_MAX}"),
                data.len() as u64,
            ));
        }
        self.data = data;
        Ok(self)
    }
}

accessors!(Uf2Block {
    /// Block flags
    flags / set_flags: Uf2Flags,
    /// Flash address the payload is written to
    target_addr / set_target_addr: u32,
    /// Zero-based block number
    block_no / set_block_no: u32,
    /// Total number of blocks in the file
    num_blocks / set_num_blocks: u32,
    /// Board family id, or file size for file containers
    family_id / set_family_id: u32,
});

fn check_magic(r: &StructReader<'_>, field: &Field, expected: u32) -> FormatResult<()> {
    let found = r.u32(field, Endian::Little)?;
    if found != expected {
        return Err(FormatError::invalid_signature(
            Uf2Block::NAME,
            format!("{}={expected:#010x}", field.name),
            &found.to_le_bytes(),
        ));
    }
    Ok(())
}

impl BinaryStruct for Uf2Block {
    const NAME: &'static str = "Uf2Block";
    const SIZE: usize = UF2_BLOCK_SIZE;

    fn parse(buf: &[u8], offset: usize) -> FormatResult<Self> {
        let r = StructReader::new(Self::NAME, buf, offset, LAYOUT)?;
        check_magic(&r, &MAGIC0, UF2_MAGIC_START0)?;
        check_magic(&r, &MAGIC1, UF2_MAGIC_START1)?;
        check_magic(&r, &MAGIC_END, UF2_MAGIC_END)?;
        let payload_size = r.u32(&PAYLOAD_SIZE, Endian::Little)?;
        let len = usize::try_from(payload_size).unwrap_or(usize::MAX);
        if len > UF2_PAYLOAD_MAX {
            return Err(FormatError::invalid_size(
                "payload_size",
                format!("<= {UF2_PAYLOAD_MAX}"),
                u64::from(payload_size),
            ));
        }
        let data = r.bytes(&DATA)?.get(..len).unwrap_or_default();
        Ok(Self {
            flags: Uf2Flags::from_bits_retain(r.u32(&FLAGS, Endian::Little)?),
            target_addr: r.u32(&TARGET_ADDR, Endian::Little)?,
            block_no: r.u32(&BLOCK_NO, Endian::Little)?,
            num_blocks: r.u32(&NUM_BLOCKS, Endian::Little)?,
            family_id: r.u32(&FAMILY_ID, Endian::Little)?,
            data: Bytes::copy_from_slice(data),
        })
    }

    fn write_into(&self, writer: &mut ByteWriter) {
        let payload = self.data.get(..UF2_PAYLOAD_MAX.min(self.data.len())).unwrap_or_default();
        writer
            .write_u32(UF2_MAGIC_START0, Endian::Little)
            .write_u32(UF2_MAGIC_START1, Endian::Little)
            .write_u32(self.flags.bits(), Endian::Little)
            .write_u32(self.target_addr, Endian::Little)
            .write_u32(payload.len() as u32, Endian::Little)
            .write_u32(self.block_no, Endian::Little)
            .write_u32(self.num_blocks, Endian::Little)
            .write_u32(self.family_id, Endian::Little)
            .write_bytes(payload)
            .write_fill(0, UF2_PAYLOAD_MAX.saturating_sub(payload.len()))
            .write_u32(UF2_MAGIC_END, Endian::Little);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_roundtrip() -> FormatResult<()> {
        let mut block = Uf2Block::new();
        block
            .set_data(Bytes::from_static(b"payload"))?
            .set_target_addr(0x2000)
            .set_num_blocks(1)
            .set_family_id(0xE48B_FF56)
            .set_flags(Uf2Flags::FAMILY_ID_PRESENT);
        let bytes = block.serialize();
        assert_eq!(bytes.len(), UF2_BLOCK_SIZE);
        assert_eq!(Uf2Block::parse(&bytes, 0)?, block);
        Ok(())
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let mut bytes = Uf2Block::new().serialize().to_vec();
        if let Some(b) = bytes.get_mut(17) {
            *b = 0x02;
        }
        assert!(matches!(
            Uf2Block::parse(&bytes, 0),
            Err(FormatError::InvalidSize { field: "payload_size", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_end_magic() {
        let mut bytes = Uf2Block::new().serialize().to_vec();
        if let Some(b) = bytes.get_mut(511) {
            *b = 0;
        }
        assert!(matches!(
            Uf2Block::parse(&bytes, 0),
            Err(FormatError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_unknown_flags_are_kept() -> FormatResult<()> {
        let mut block = Uf2Block::new();
        block.set_flags(Uf2Flags::from_bits_retain(0x0010_0000));
        let parsed = Uf2Block::parse(&block.serialize(), 0)?;
        assert_eq!(parsed.flags().bits(), 0x0010_0000);
        Ok(())
    }
}
