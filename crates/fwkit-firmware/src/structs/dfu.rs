//! DFU file suffix.
//!
//! The suffix is stored byte-reversed at the very end of the file, so the
//! signature reads `"UFD"` and the CRC is the last four bytes.

use fwkit_errors::{FormatError, FormatResult};
use fwkit_stream::{ByteWriter, Endian};

use super::{BinaryStruct, Field, StructReader, accessors};

/// Encoded size of a standard DFU suffix.
pub const DFU_FOOTER_SIZE: usize = 16;

/// DFU 1.0 and 1.1 files.
pub const DFU_VERSION_DFU_1_0: u16 = 0x0100;

/// ST DfuSe files.
pub const DFU_VERSION_DFUSE: u16 = 0x011A;

const RELEASE: Field = Field::new("release", 0, 2);
const PID: Field = Field::new("pid", 2, 2);
const VID: Field = Field::new("vid", 4, 2);
const VERSION: Field = Field::new("dfu_version", 6, 2);
const SIGNATURE: Field = Field::new("signature", 8, 3);
const LEN: Field = Field::new("len", 11, 1);
const CRC: Field = Field::new("crc", 12, 4);
const LAYOUT: &[Field] = &[RELEASE, PID, VID, VERSION, SIGNATURE, LEN, CRC];

/// DFU suffix record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfuFooter {
    release: u16,
    pid: u16,
    vid: u16,
    dfu_version: u16,
    len: u8,
    crc: u32,
}

impl Default for DfuFooter {
    fn default() -> Self {
        Self::new()
    }
}

impl DfuFooter {
    /// A suffix matching any device, with a zero CRC.
    pub fn new() -> Self {
        Self {
            release: 0xFFFF,
            pid: 0xFFFF,
            vid: 0xFFFF,
            dfu_version: DFU_VERSION_DFU_1_0,
            len: DFU_FOOTER_SIZE as u8,
            crc: 0,
        }
    }
}

accessors!(DfuFooter {
    /// Device release number
    release / set_release: u16,
    /// USB product id
    pid / set_pid: u16,
    /// USB vendor id
    vid / set_vid: u16,
    /// DFU specification version
    dfu_version / set_dfu_version: u16,
    /// Declared suffix length, including any vendor extension
    len / set_len: u8,
    /// Stored CRC
    crc / set_crc: u32,
});

impl BinaryStruct for DfuFooter {
    const NAME: &'static str = "DfuFooter";
    const SIZE: usize = DFU_FOOTER_SIZE;

    fn parse(buf: &[u8], offset: usize) -> FormatResult<Self> {
        let r = StructReader::new(Self::NAME, buf, offset, LAYOUT)?;
        r.expect_magic(&SIGNATURE, b"UFD")?;
        let len = r.u8(&LEN)?;
        if usize::from(len) < DFU_FOOTER_SIZE {
            return Err(FormatError::invalid_size(
                "len",
                format!(">= {DFU_FOOTER_SIZE}"),
                u64::from(len),
            ));
        }
        Ok(Self {
            release: r.u16(&RELEASE, Endian::Little)?,
            pid: r.u16(&PID, Endian::Little)?,
            vid: r.u16(&VID, Endian::Little)?,
            dfu_version: r.u16(&VERSION, Endian::Little)?,
            len,
            crc: r.u32(&CRC, Endian::Little)?,
        })
    }

    fn write_into(&self, writer: &mut ByteWriter) {
        writer
            .write_u16(self.release, Endian::Little)
            .write_u16(self.pid, Endian::Little)
            .write_u16(self.vid, Endian::Little)
            .write_u16(self.dfu_version, Endian::Little)
            .write_bytes(b"UFD")
            .write_u8(self.len)
            .write_u32(self.crc, Endian::Little);
    }
}
