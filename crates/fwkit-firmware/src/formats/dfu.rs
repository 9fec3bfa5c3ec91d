//! DFU files: a payload followed by a DFU suffix.

use bytes::Bytes;
use fwkit_checksum::{XteaKey, crc32_dfu, xtea};
use fwkit_errors::{CipherError, FormatError, FormatResult};
use fwkit_stream::ByteWriter;
use tracing::debug;

use super::{FirmwareParser, FormatKind, checksum_check};
use crate::flags::ParseFlags;
use crate::image::Firmware;
use crate::meta::{DfuInfo, FirmwareMeta};
use crate::structs::{BinaryStruct, DFU_FOOTER_SIZE, DFU_VERSION_DFU_1_0, DFU_VERSION_DFUSE, DfuFooter};

/// Parser for plain DFU files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DfuParser;

/// Parse and check the suffix, returning its values and the payload before it.
pub(crate) fn split_suffix(data: &Bytes, flags: ParseFlags) -> FormatResult<(DfuInfo, Bytes)> {
    let size = data.len();
    let ftr = DfuFooter::parse(data, size.saturating_sub(DFU_FOOTER_SIZE))?;
    let len = usize::from(ftr.len());
    if len > size {
        return Err(FormatError::invalid_size(
            "len",
            format!("<= file size {size:#x}"),
            len as u64,
        ));
    }

    let covered = data.get(..size.saturating_sub(4)).unwrap_or_default();
    checksum_check(
        flags,
        "DFU suffix",
        u64::from(ftr.crc()),
        u64::from(crc32_dfu(covered)),
    )?;

    let dfu_version = ftr.dfu_version();
    if !flags.contains(ParseFlags::IGNORE_VID_PID)
        && dfu_version != DFU_VERSION_DFU_1_0
        && dfu_version != DFU_VERSION_DFUSE
    {
        return Err(FormatError::unsupported("DFU version", format!("{dfu_version:#06x}")));
    }

    debug!(
        vid = ftr.vid(),
        pid = ftr.pid(),
        dfu_version,
        suffix_len = len,
        "parsed DFU suffix"
    );
    let info = DfuInfo {
        vid: ftr.vid(),
        pid: ftr.pid(),
        release: ftr.release(),
        dfu_version,
    };
    Ok((info, data.slice(..size.saturating_sub(len))))
}

/// Append a suffix to `payload`, computing its CRC.
pub(crate) fn append_suffix(payload: &[u8], info: &DfuInfo) -> Bytes {
    let mut ftr = DfuFooter::new();
    ftr.set_vid(info.vid)
        .set_pid(info.pid)
        .set_release(info.release)
        .set_dfu_version(info.dfu_version);

    let mut writer = ByteWriter::with_capacity(payload.len().saturating_add(DFU_FOOTER_SIZE));
    writer.write_bytes(payload);
    ftr.write_into(&mut writer);
    let crc_offset = writer.len().saturating_sub(4);
    let crc = crc32_dfu(writer.as_slice().get(..crc_offset).unwrap_or_default());
    let mut out = writer.into_inner();
    for (dst, src) in out.iter_mut().skip(crc_offset).zip(crc.to_le_bytes()) {
        *dst = src;
    }
    Bytes::from(out)
}

impl FirmwareParser for DfuParser {
    fn validate(&self, buf: &[u8], offset: usize) -> FormatResult<()> {
        let tail = buf.get(offset..).unwrap_or_default();
        DfuFooter::parse(tail, tail.len().saturating_sub(DFU_FOOTER_SIZE)).map(|_| ())
    }

    fn parse(&self, data: Bytes, flags: ParseFlags) -> FormatResult<Firmware> {
        let (info, payload) = split_suffix(&data, flags)?;
        let mut firmware = Firmware::from_bytes(payload)
            .with_format(FormatKind::Dfu)
            .with_meta(FirmwareMeta::Dfu(info));
        firmware.set_version_raw(u64::from(info.release));
        Ok(firmware)
    }

    fn write(&self, firmware: &Firmware) -> FormatResult<Bytes> {
        let info = firmware.meta().dfu().copied().unwrap_or_default();
        Ok(append_suffix(&firmware.bytes(), &info))
    }
}

fn transform_payload(
    firmware: &Firmware,
    key: &XteaKey,
    op: fn(&XteaKey, &mut [u8]) -> Result<(), CipherError>,
) -> Result<Firmware, CipherError> {
    let mut buf = firmware.bytes().to_vec();
    op(key, &mut buf)?;
    let mut out = firmware.clone();
    out.set_data(buf);
    Ok(out)
}

/// Decrypt an XTEA-encrypted DFU payload, returning a new image.
///
/// # Errors
///
/// Returns [`CipherError::InvalidBlockSize`] unless the payload is a
/// non-empty multiple of 8 bytes.
pub fn decrypt_payload(firmware: &Firmware, key: &XteaKey) -> Result<Firmware, CipherError> {
    transform_payload(firmware, key, xtea::decrypt)
}

/// Encrypt a DFU payload with XTEA, returning a new image.
///
/// # Errors
///
/// Returns [`CipherError::InvalidBlockSize`] unless the payload is a
/// non-empty multiple of 8 bytes.
pub fn encrypt_payload(firmware: &Firmware, key: &XteaKey) -> Result<Firmware, CipherError> {
    transform_payload(firmware, key, xtea::encrypt)
}
