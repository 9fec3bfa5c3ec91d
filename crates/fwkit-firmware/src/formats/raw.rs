//! Unstructured images.

use bytes::Bytes;
use fwkit_errors::FormatResult;

use super::{FirmwareParser, FormatKind};
use crate::flags::ParseFlags;
use crate::image::Firmware;

/// Treats any input as a single opaque blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawParser;

impl FirmwareParser for RawParser {
    fn validate(&self, _buf: &[u8], _offset: usize) -> FormatResult<()> {
        Ok(())
    }

    fn parse(&self, data: Bytes, _flags: ParseFlags) -> FormatResult<Firmware> {
        Ok(Firmware::from_bytes(data).with_format(FormatKind::Raw))
    }

    fn write(&self, firmware: &Firmware) -> FormatResult<Bytes> {
        Ok(firmware.bytes())
    }
}
