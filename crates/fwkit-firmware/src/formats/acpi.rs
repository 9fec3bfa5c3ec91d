//! ACPI tables and the DMA-protection subtypes read from them.

use bytes::Bytes;
use fwkit_errors::{FormatError, FormatResult, OutOfBounds};
use fwkit_stream::{ByteReader, ByteWriter, Endian};
use tracing::debug;

use super::{FirmwareParser, FormatKind, checksum_check, consistency};
use crate::flags::ParseFlags;
use crate::image::Firmware;
use crate::meta::FirmwareMeta;
use crate::structs::{ACPI_TABLE_HEADER_SIZE, AcpiTableHeader, BinaryStruct, fit_u32};

const CHECKSUM_OFFSET: usize = 9;

/// Parser for a single ACPI table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcpiTableParser;

/// Value of the checksum byte that makes `table` sum to zero.
fn expected_checksum(table: &[u8]) -> u8 {
    let sum = table
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != CHECKSUM_OFFSET)
        .fold(0u8, |acc, (_, b)| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

fn is_signature(sig: &[u8; 4]) -> bool {
    sig.iter()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
}

fn table_length(hdr: &AcpiTableHeader) -> FormatResult<usize> {
    let length = usize::try_from(hdr.length()).unwrap_or(usize::MAX);
    if length < ACPI_TABLE_HEADER_SIZE {
        return Err(FormatError::invalid_size(
            "length",
            format!(">= {ACPI_TABLE_HEADER_SIZE}"),
            u64::from(hdr.length()),
        ));
    }
    Ok(length)
}

impl FirmwareParser for AcpiTableParser {
    fn validate(&self, buf: &[u8], offset: usize) -> FormatResult<()> {
        let hdr = AcpiTableHeader::parse(buf, offset)?;
        if !is_signature(&hdr.signature()) {
            return Err(FormatError::invalid_signature(
                AcpiTableHeader::NAME,
                "four uppercase ASCII characters",
                &hdr.signature(),
            ));
        }
        let length = table_length(&hdr)?;
        let available = buf.len().saturating_sub(offset);
        if length != available {
            return Err(FormatError::inconsistent("ACPI table", length as u64, available as u64));
        }
        let table = ByteReader::new(buf).read_bytes(offset, length)?;
        if expected_checksum(table) != hdr.checksum() {
            return Err(FormatError::ChecksumMismatch {
                what: "ACPI table",
                expected: u64::from(hdr.checksum()),
                actual: u64::from(expected_checksum(table)),
            });
        }
        Ok(())
    }

    fn parse(&self, data: Bytes, flags: ParseFlags) -> FormatResult<Firmware> {
        let hdr = AcpiTableHeader::parse(&data, 0)?;
        let length = table_length(&hdr)?;
        OutOfBounds::check(0, length, data.len())?;
        consistency(flags, length == data.len(), || {
            FormatError::inconsistent("ACPI table", length as u64, data.len() as u64)
        })?;

        let table = data.slice(..length);
        checksum_check(
            flags,
            "ACPI table",
            u64::from(hdr.checksum()),
            u64::from(expected_checksum(&table)),
        )?;
        debug!(
            signature = %hdr.signature_str(),
            length,
            revision = hdr.revision(),
            "parsed ACPI table"
        );

        let mut firmware = Firmware::from_bytes(table)
            .with_format(FormatKind::AcpiTable)
            .with_id(hdr.signature_str());
        firmware.set_version_raw(u64::from(hdr.revision()));
        firmware.set_meta(FirmwareMeta::Acpi(hdr));
        Ok(firmware)
    }

    /// Re-serialize the header from the node's metadata in front of the
    /// table body, recomputing the length and checksum.
    fn write(&self, firmware: &Firmware) -> FormatResult<Bytes> {
        let mut hdr = firmware
            .meta()
            .acpi()
            .cloned()
            .ok_or_else(|| FormatError::unsupported("ACPI table", "image has no table header"))?;
        let data = firmware.bytes();
        let body = data.get(ACPI_TABLE_HEADER_SIZE..).unwrap_or_default();
        let length = ACPI_TABLE_HEADER_SIZE.saturating_add(body.len());
        hdr.set_length(fit_u32("length", length as u64)?).set_checksum(0);

        let mut writer = ByteWriter::with_capacity(length);
        hdr.write_into(&mut writer);
        writer.write_bytes(body);
        let checksum = expected_checksum(writer.as_slice());
        let mut out = writer.into_inner();
        if let Some(b) = out.get_mut(CHECKSUM_OFFSET) {
            *b = checksum;
        }
        Ok(Bytes::from(out))
    }
}

fn parse_typed(data: Bytes, flags: ParseFlags, signature: &[u8; 4]) -> FormatResult<(AcpiTableHeader, Bytes)> {
    let firmware = AcpiTableParser.parse(data, flags)?;
    let hdr = firmware.meta().acpi().cloned().unwrap_or_default();
    if &hdr.signature() != signature {
        return Err(FormatError::invalid_signature(
            AcpiTableHeader::NAME,
            String::from_utf8_lossy(signature),
            &hdr.signature(),
        ));
    }
    Ok((hdr, firmware.bytes()))
}

const DMAR_FLAGS_OFFSET: usize = 0x25;
const DMAR_INTR_REMAP: u8 = 1 << 0;
const DMAR_DMA_CTRL_PLATFORM_OPT_IN: u8 = 1 << 2;

/// DMA remapping reporting table (Intel VT-d).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcpiDmar {
    header: AcpiTableHeader,
    flags: u8,
}

impl AcpiDmar {
    /// Parse a `DMAR` table.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] if the table is invalid, is not a `DMAR`
    /// table, or is too short to hold the flags byte.
    pub fn parse(data: Bytes, flags: ParseFlags) -> FormatResult<Self> {
        let (header, table) = parse_typed(data, flags, b"DMAR")?;
        let dmar_flags = ByteReader::new(&table).read_u8(DMAR_FLAGS_OFFSET)?;
        debug!(flags = dmar_flags, "parsed DMAR");
        Ok(Self {
            header,
            flags: dmar_flags,
        })
    }

    /// Table header.
    pub fn header(&self) -> &AcpiTableHeader {
        &self.header
    }

    /// Raw flags byte.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Firmware opted in to pre-boot DMA protection.
    pub fn opt_in(&self) -> bool {
        self.flags & DMAR_DMA_CTRL_PLATFORM_OPT_IN != 0
    }

    /// Interrupt remapping is supported.
    pub fn interrupt_remapping(&self) -> bool {
        self.flags & DMAR_INTR_REMAP != 0
    }
}

const IVRS_IVINFO_OFFSET: usize = 0x24;
const IVRS_DMA_REMAP_SUPPORT: u32 = 1 << 1;

/// I/O virtualization reporting structure (AMD-Vi).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcpiIvrs {
    header: AcpiTableHeader,
    ivinfo: u32,
}

impl AcpiIvrs {
    /// Parse an `IVRS` table.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] if the table is invalid, is not an `IVRS`
    /// table, or is too short to hold IVInfo.
    pub fn parse(data: Bytes, flags: ParseFlags) -> FormatResult<Self> {
        let (header, table) = parse_typed(data, flags, b"IVRS")?;
        let ivinfo = ByteReader::new(&table).read_u32(IVRS_IVINFO_OFFSET, Endian::Little)?;
        debug!(ivinfo, "parsed IVRS");
        Ok(Self { header, ivinfo })
    }

    /// Table header.
    pub fn header(&self) -> &AcpiTableHeader {
        &self.header
    }

    /// Raw IVInfo field.
    pub fn ivinfo(&self) -> u32 {
        self.ivinfo
    }

    /// DMA remapping is supported with pre-boot protection.
    pub fn remap_support(&self) -> bool {
        self.ivinfo & IVRS_DMA_REMAP_SUPPORT != 0
    }
}
