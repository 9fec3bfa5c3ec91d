//! ST DfuSe containers.
//!
//! Layout: prefix, then one target record per alternate setting, each
//! followed by its element records, then a DFU suffix with version
//! `0x011A`. Every declared size is load-bearing and checked against the
//! bytes actually consumed.

use bytes::Bytes;
use fwkit_errors::{FormatError, FormatResult};
use fwkit_stream::ByteWriter;
use tracing::debug;

use super::dfu::{append_suffix, split_suffix};
use super::{FirmwareParser, FormatKind, consistency};
use crate::flags::ParseFlags;
use crate::image::Firmware;
use crate::meta::{DfuInfo, FirmwareMeta};
use crate::structs::{
    BinaryStruct, DFU_VERSION_DFUSE, DFUSE_ELEMENT_SIZE, DFUSE_HEADER_SIZE, DFUSE_TARGET_SIZE,
    DfuseElement, DfuseHeader, DfuseTarget, fit_u8, fit_u32,
};

/// Maximum number of targets in a file.
pub const DFUSE_MAX_TARGETS: usize = 255;

/// Maximum number of elements in a target.
pub const DFUSE_MAX_ELEMENTS: usize = 2000;

/// Parser for DfuSe files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DfuseParser;

fn parse_target(
    body: &Bytes,
    offset: usize,
    flags: ParseFlags,
) -> FormatResult<(Firmware, usize)> {
    let target = DfuseTarget::parse(body, offset)?;
    let mut image = Firmware::new().with_idx(u64::from(target.alt_setting()));
    if let Some(name) = target.target_name() {
        image.set_id(name);
    }
    image.set_max_children(DFUSE_MAX_ELEMENTS);

    let elements_start = offset.saturating_add(DFUSE_TARGET_SIZE);
    let mut cursor = elements_start;
    for _ in 0..target.chunks() {
        let element = DfuseElement::parse(body, cursor)?;
        let data_start = cursor.saturating_add(DFUSE_ELEMENT_SIZE);
        let size = usize::try_from(element.size()).unwrap_or(usize::MAX);
        fwkit_errors::OutOfBounds::check(data_start, size, body.len())?;
        let data_end = data_start.saturating_add(size);
        let chunk = Firmware::from_bytes(body.slice(data_start..data_end))
            .with_address(u64::from(element.address()));
        image.add_child_checked(chunk)?;
        cursor = data_end;
    }

    let consumed = cursor.saturating_sub(elements_start);
    consistency(flags, consumed as u64 == u64::from(target.target_size()), || {
        FormatError::inconsistent(
            format!("DfuSe target {}", target.alt_setting()),
            u64::from(target.target_size()),
            consumed as u64,
        )
    })?;
    debug!(
        alt_setting = target.alt_setting(),
        elements = target.chunks(),
        size = consumed,
        "parsed DfuSe target"
    );
    Ok((image, cursor))
}

impl FirmwareParser for DfuseParser {
    fn validate(&self, buf: &[u8], offset: usize) -> FormatResult<()> {
        DfuseHeader::parse(buf, offset).map(|_| ())
    }

    fn parse(&self, data: Bytes, flags: ParseFlags) -> FormatResult<Firmware> {
        let (info, body) = split_suffix(&data, flags)?;
        let hdr = DfuseHeader::parse(&body, 0)?;

        let declared = u64::from(hdr.image_size());
        if declared != body.len() as u64 {
            return Err(FormatError::inconsistent(
                "DfuSe image",
                declared,
                body.len() as u64,
            ));
        }

        let mut firmware = Firmware::new()
            .with_format(FormatKind::Dfuse)
            .with_meta(FirmwareMeta::Dfu(info));
        firmware.set_max_children(DFUSE_MAX_TARGETS);
        firmware.set_version_raw(u64::from(info.release));

        let mut offset = DFUSE_HEADER_SIZE;
        for _ in 0..hdr.targets() {
            let (image, next) = parse_target(&body, offset, flags)?;
            firmware.add_child_checked(image)?;
            offset = next;
        }
        consistency(flags, offset == body.len(), || {
            FormatError::inconsistent("DfuSe targets", body.len() as u64, offset as u64)
        })?;
        Ok(firmware)
    }

    fn write(&self, firmware: &Firmware) -> FormatResult<Bytes> {
        let targets = firmware.children();
        if targets.len() > DFUSE_MAX_TARGETS {
            return Err(FormatError::TooManyChildren {
                limit: DFUSE_MAX_TARGETS,
            });
        }

        let mut body = ByteWriter::new();
        for image in targets {
            // a target built from a single blob is written as one element
            let elements: Vec<&Firmware> = if image.children().is_empty() && image.data().is_some() {
                vec![image]
            } else {
                image.children().iter().collect()
            };
            if elements.len() > DFUSE_MAX_ELEMENTS {
                return Err(FormatError::TooManyChildren {
                    limit: DFUSE_MAX_ELEMENTS,
                });
            }
            let mut target_size = 0u32;
            let mut element_bytes = ByteWriter::new();
            for element in &elements {
                let data = element.bytes();
                let size = fit_u32("element size", data.len() as u64)?;
                DfuseElement::new()
                    .set_address(fit_u32("element address", element.address())?)
                    .set_size(size)
                    .write_into(&mut element_bytes);
                element_bytes.write_bytes(&data);
                target_size = target_size
                    .saturating_add(size)
                    .saturating_add(DFUSE_ELEMENT_SIZE as u32);
            }

            let mut target = DfuseTarget::new();
            target
                .set_target_name(image.id())?
                .set_alt_setting(fit_u8("alt_setting", image.idx())?)
                .set_target_size(target_size)
                .set_chunks(elements.len() as u32);
            target.write_into(&mut body);
            body.write_bytes(element_bytes.as_slice());
        }

        let image_size = DFUSE_HEADER_SIZE.saturating_add(body.len());
        let mut hdr = DfuseHeader::new();
        hdr.set_image_size(fit_u32("image_size", image_size as u64)?)
            .set_targets(targets.len() as u8);

        let mut out = ByteWriter::with_capacity(image_size);
        hdr.write_into(&mut out);
        out.write_bytes(body.as_slice());

        let info = DfuInfo {
            dfu_version: DFU_VERSION_DFUSE,
            ..firmware.meta().dfu().copied().unwrap_or_default()
        };
        Ok(append_suffix(out.as_slice(), &info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Firmware {
        let mut image = Firmware::new().with_id("ST...").with_idx(0);
        image.add_child(Firmware::from_bytes(&b"0123"[..]).with_address(0x0800_0000));
        image.add_child(Firmware::from_bytes(&b"456789"[..]).with_address(0x0800_4000));
        let mut root = Firmware::new().with_format(FormatKind::Dfuse);
        root.add_child(image);
        root
    }

    #[test]
    fn test_write_then_parse() -> FormatResult<()> {
        let buf = DfuseParser.write(&sample())?;
        let fw = DfuseParser.parse(buf, ParseFlags::empty())?;
        let image = fw.default_child()?;
        assert_eq!(image.id(), Some("ST..."));
        assert_eq!(image.children().len(), 2);
        assert_eq!(image.children().get(1).map(Firmware::address), Some(0x0800_4000));
        assert_eq!(fw.bytes().as_ref(), b"0123456789");
        assert_eq!(fw.meta().dfu().map(|i| i.dfu_version), Some(DFU_VERSION_DFUSE));
        Ok(())
    }

    #[test]
    fn test_target_size_includes_element_headers() -> FormatResult<()> {
        let buf = DfuseParser.write(&sample())?;
        let target = DfuseTarget::parse(&buf, DFUSE_HEADER_SIZE)?;
        assert_eq!(target.target_size(), 10 + 2 * DFUSE_ELEMENT_SIZE as u32);
        Ok(())
    }

    #[test]
    fn test_blob_target_becomes_one_element() -> FormatResult<()> {
        let mut root = Firmware::new();
        root.add_child(Firmware::from_bytes(&b"blob"[..]).with_address(0x2000).with_idx(1));
        let fw = DfuseParser.parse(DfuseParser.write(&root)?, ParseFlags::empty())?;
        let image = fw.get_child_by_idx(1).ok_or(FormatError::NoDefaultChild { count: 0 })?;
        assert_eq!(image.id(), None);
        assert_eq!(image.default_child()?.address(), 0x2000);
        Ok(())
    }

    #[test]
    fn test_validate_checks_prefix() {
        assert!(DfuseParser.validate(b"DfuSe\x01\x00\x00\x00\x00\x00", 0).is_ok());
        assert!(DfuseParser.validate(b"DfuSx\x01\x00\x00\x00\x00\x00", 0).is_err());
    }
}
