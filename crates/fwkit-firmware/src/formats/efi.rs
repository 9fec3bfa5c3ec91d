//! EFI signature databases (`db`, `dbx`): a sequence of `EFI_SIGNATURE_LIST`s.
//!
//! The tree is flat. The root's children are the entries of every list in
//! file order, each carrying its list's type GUID and vendor header so that
//! `write` can group them back into lists. A list with no entries has
//! nothing to carry its header and is dropped.

use bytes::Bytes;
use fwkit_checksum::SHA256_LEN;
use fwkit_errors::{FormatError, FormatResult, OutOfBounds};
use fwkit_stream::{ByteReader, ByteWriter};
use tracing::debug;
use uuid::Uuid;

use super::{FirmwareParser, FormatKind, consistency};
use crate::flags::ParseFlags;
use crate::image::Firmware;
use crate::meta::{EfiSignatureInfo, FirmwareMeta, SignatureKind};
use crate::structs::{BinaryStruct, EFI_SIGNATURE_LIST_HEADER_SIZE, EfiSignatureListHeader, fit_u32};

/// Upper bound for every size field in a list header.
pub const EFI_LIST_SIZE_MAX: usize = 0x10_0000;

/// Maximum number of entries across all lists.
pub const EFI_MAX_ENTRIES: usize = 2000;

const GUID_SIZE: usize = 16;
const SHA256_ENTRY_SIZE: usize = GUID_SIZE + SHA256_LEN;

/// Parser for EFI signature databases.
#[derive(Debug, Clone, Copy, Default)]
pub struct EfiSignatureListParser;

fn size_of(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn check_sizes(hdr: &EfiSignatureListHeader) -> FormatResult<()> {
    let list_size = size_of(hdr.list_size());
    if !(EFI_SIGNATURE_LIST_HEADER_SIZE..=EFI_LIST_SIZE_MAX).contains(&list_size) {
        return Err(FormatError::invalid_size(
            "list_size",
            format!("{EFI_SIGNATURE_LIST_HEADER_SIZE:#x}..={EFI_LIST_SIZE_MAX:#x}"),
            u64::from(hdr.list_size()),
        ));
    }
    if size_of(hdr.header_size()) > EFI_LIST_SIZE_MAX {
        return Err(FormatError::invalid_size(
            "header_size",
            format!("<= {EFI_LIST_SIZE_MAX:#x}"),
            u64::from(hdr.header_size()),
        ));
    }
    let entry_size = size_of(hdr.entry_size());
    if entry_size <= GUID_SIZE || entry_size > EFI_LIST_SIZE_MAX {
        return Err(FormatError::invalid_size(
            "entry_size",
            format!("{:#x}..={EFI_LIST_SIZE_MAX:#x}", GUID_SIZE.saturating_add(1)),
            u64::from(hdr.entry_size()),
        ));
    }
    Ok(())
}

/// Parse one list at `offset`, adding its entries to `root`.
/// Returns the number of bytes the list occupies.
fn parse_list(data: &Bytes, offset: usize, flags: ParseFlags, root: &mut Firmware) -> FormatResult<usize> {
    let hdr = EfiSignatureListHeader::parse(data, offset)?;
    check_sizes(&hdr)?;
    let list_size = size_of(hdr.list_size());
    let header_size = size_of(hdr.header_size());
    let entry_size = size_of(hdr.entry_size());
    OutOfBounds::check(offset, list_size, data.len())?;

    let kind = SignatureKind::from_guid(&hdr.type_guid());
    if kind == SignatureKind::Sha256 && entry_size != SHA256_ENTRY_SIZE {
        return Err(FormatError::invalid_size(
            "entry_size",
            format!("{SHA256_ENTRY_SIZE:#x} for SHA256 lists"),
            u64::from(hdr.entry_size()),
        ));
    }

    let after_header = list_size.saturating_sub(EFI_SIGNATURE_LIST_HEADER_SIZE);
    let region = after_header.checked_sub(header_size).ok_or_else(|| {
        FormatError::inconsistent("EFI signature list header", header_size as u64, after_header as u64)
    })?;
    let count = region.checked_div(entry_size).unwrap_or_default();
    let used = count.saturating_mul(entry_size);
    consistency(flags, used == region, || {
        FormatError::inconsistent("EFI signature list entries", region as u64, used as u64)
    })?;

    let reader = ByteReader::new(data);
    let vendor_start = offset.saturating_add(EFI_SIGNATURE_LIST_HEADER_SIZE);
    let vendor_header = reader.read_bytes(vendor_start, header_size)?.to_vec();
    let first = vendor_start.saturating_add(header_size);
    for i in 0..count {
        let start = first.saturating_add(i.saturating_mul(entry_size));
        let owner = Uuid::from_bytes_le(reader.read_array::<GUID_SIZE>(start)?);
        let payload_start = start.saturating_add(GUID_SIZE);
        let payload_end = start.saturating_add(entry_size);
        OutOfBounds::check(payload_start, entry_size.saturating_sub(GUID_SIZE), data.len())?;

        let info = EfiSignatureInfo {
            kind,
            type_guid: hdr.type_guid(),
            owner,
            vendor_header: vendor_header.clone(),
        };
        let entry = Firmware::from_bytes(data.slice(payload_start..payload_end))
            .with_idx(root.children().len() as u64)
            .with_meta(FirmwareMeta::EfiSignature(info));
        root.add_child_checked(entry)?;
    }

    debug!(
        offset,
        %kind,
        list_size,
        header_size,
        entry_size,
        entries = count,
        "parsed EFI signature list"
    );
    Ok(list_size)
}

fn entry_info(entry: &Firmware) -> FormatResult<&EfiSignatureInfo> {
    entry
        .meta()
        .efi_signature()
        .ok_or_else(|| FormatError::unsupported("signature entry", format!("idx {} has no type GUID", entry.idx())))
}

fn write_list(writer: &mut ByteWriter, entries: &[&Firmware]) -> FormatResult<()> {
    let Some(first) = entries.first() else {
        return Ok(());
    };
    let info = entry_info(first)?;
    let entry_size = GUID_SIZE.saturating_add(first.size());
    let list_size = entry_size
        .saturating_mul(entries.len())
        .saturating_add(EFI_SIGNATURE_LIST_HEADER_SIZE)
        .saturating_add(info.vendor_header.len());

    let mut hdr = EfiSignatureListHeader::new();
    hdr.set_type_guid(info.type_guid)
        .set_list_size(fit_u32("list_size", list_size as u64)?)
        .set_header_size(fit_u32("header_size", info.vendor_header.len() as u64)?)
        .set_entry_size(fit_u32("entry_size", entry_size as u64)?);
    check_sizes(&hdr)?;
    hdr.write_into(writer);
    writer.write_bytes(&info.vendor_header);
    for entry in entries {
        let info = entry_info(entry)?;
        writer.write_bytes(&info.owner.to_bytes_le()).write_bytes(&entry.bytes());
    }
    Ok(())
}

impl FirmwareParser for EfiSignatureListParser {
    fn validate(&self, buf: &[u8], offset: usize) -> FormatResult<()> {
        let hdr = EfiSignatureListHeader::parse(buf, offset)?;
        if SignatureKind::from_guid(&hdr.type_guid()) == SignatureKind::Unknown {
            return Err(FormatError::invalid_signature(
                EfiSignatureListHeader::NAME,
                "known signature type GUID",
                &hdr.type_guid().to_bytes_le(),
            ));
        }
        check_sizes(&hdr)?;
        OutOfBounds::check(offset, size_of(hdr.list_size()), buf.len())?;
        Ok(())
    }

    fn parse(&self, data: Bytes, flags: ParseFlags) -> FormatResult<Firmware> {
        let mut root = Firmware::new().with_format(FormatKind::EfiSignatureList);
        root.set_max_children(EFI_MAX_ENTRIES);
        let mut offset = 0usize;
        while offset < data.len() {
            let consumed = parse_list(&data, offset, flags, &mut root)?;
            offset = offset.saturating_add(consumed);
        }
        Ok(root)
    }

    fn write(&self, firmware: &Firmware) -> FormatResult<Bytes> {
        let mut writer = ByteWriter::new();
        let mut group: Vec<&Firmware> = Vec::new();
        let mut group_key: Option<(Uuid, usize, &[u8])> = None;
        for entry in firmware.children() {
            let info = entry_info(entry)?;
            let key = (info.type_guid, entry.size(), info.vendor_header.as_slice());
            if group_key.is_some_and(|k| k != key) {
                write_list(&mut writer, &group)?;
                group.clear();
            }
            group_key = Some(key);
            group.push(entry);
        }
        write_list(&mut writer, &group)?;
        Ok(writer.into_bytes())
    }
}
