//! Intel HEX text images.
//!
//! Data records are flattened into one contiguous blob starting at the
//! first data address. Small holes are zero-filled; addresses may never go
//! backwards. Vendor signature records (type `FD`) are collected into a
//! child with id `signature`.

use bytes::Bytes;
use fwkit_errors::{FormatError, FormatResult};
use tracing::{debug, trace, warn};

use super::{FirmwareParser, FormatKind};
use crate::flags::ParseFlags;
use crate::image::Firmware;
use crate::structs::fit_u32;

/// Largest gap between data records that is zero-filled.
pub const IHEX_HOLE_MAX: u64 = 0x10_0000;

/// Id of the child holding signature records.
pub const IHEX_SIGNATURE_ID: &str = "signature";

const DATA_PER_RECORD: usize = 16;
const SEGMENT_SIZE: u64 = 0x1_0000;

/// Intel HEX record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    Data = 0x00,
    Eof = 0x01,
    ExtendedSegment = 0x02,
    StartSegment = 0x03,
    ExtendedLinear = 0x04,
    StartLinear = 0x05,
    Signature = 0xFD,
}

impl RecordType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(RecordType::Data),
            0x01 => Some(RecordType::Eof),
            0x02 => Some(RecordType::ExtendedSegment),
            0x03 => Some(RecordType::StartSegment),
            0x04 => Some(RecordType::ExtendedLinear),
            0x05 => Some(RecordType::StartLinear),
            0xFD => Some(RecordType::Signature),
            _ => None,
        }
    }
}

/// One decoded line.
struct Record {
    line: usize,
    kind: u8,
    addr: u16,
    data: Vec<u8>,
}

impl Record {
    fn decode(line: usize, text: &[u8], flags: ParseFlags) -> FormatResult<Self> {
        let hex_text = match text.split_first() {
            Some((b':', rest)) => rest,
            _ => return Err(FormatError::record(line, "missing ':' start code")),
        };
        let raw = hex::decode(hex_text).or(Err(FormatError::record(line, "invalid hex digits")))?;
        let (count, addr_hi, addr_lo, kind, rest) = match raw.as_slice() {
            [count, addr_hi, addr_lo, kind, rest @ ..] => (*count, *addr_hi, *addr_lo, *kind, rest),
            _ => return Err(FormatError::record(line, "record shorter than 5 bytes")),
        };
        let (data, stored) = match rest.split_last() {
            Some((stored, data)) if data.len() == usize::from(count) => (data, *stored),
            _ => {
                return Err(FormatError::record(
                    line,
                    format!("byte count {count} does not match record length"),
                ));
            }
        };

        let sum = raw
            .iter()
            .take(raw.len().saturating_sub(1))
            .fold(0u8, |acc, b| acc.wrapping_add(*b));
        let computed = 0u8.wrapping_sub(sum);
        if computed != stored {
            let reason = format!("checksum {stored:#04x}, computed {computed:#04x}");
            if !flags.contains(ParseFlags::IGNORE_CHECKSUM) {
                return Err(FormatError::record(line, reason));
            }
            warn!(line, %reason, "ignoring Intel HEX checksum mismatch");
        }

        Ok(Self {
            line,
            kind,
            addr: u16::from_be_bytes([addr_hi, addr_lo]),
            data: data.to_vec(),
        })
    }

    fn expect_len(&self, len: usize) -> FormatResult<()> {
        if self.data.len() != len {
            return Err(FormatError::record(
                self.line,
                format!("record type {:#04x} needs {len} data bytes, got {}", self.kind, self.data.len()),
            ));
        }
        Ok(())
    }

    fn be16(&self) -> u64 {
        match self.data.as_slice() {
            [hi, lo] => u64::from(u16::from_be_bytes([*hi, *lo])),
            _ => 0,
        }
    }
}

/// Flattens data records into a contiguous blob.
#[derive(Default)]
struct Image {
    base: Option<u64>,
    next: u64,
    blob: Vec<u8>,
}

impl Image {
    fn push(&mut self, line: usize, addr: u64, data: &[u8]) -> FormatResult<()> {
        match self.base {
            None => {
                self.base = Some(addr);
                self.next = addr;
            }
            Some(_) if addr < self.next => {
                return Err(FormatError::record(
                    line,
                    format!("address {addr:#x} goes backwards, expected >= {:#x}", self.next),
                ));
            }
            Some(_) => {
                let gap = addr.saturating_sub(self.next);
                if gap > IHEX_HOLE_MAX {
                    return Err(FormatError::record(line, format!("hole of {gap:#x} bytes is too large")));
                }
                if gap > 0 {
                    trace!(line, gap, "zero-filling Intel HEX hole");
                    let fill = usize::try_from(gap).unwrap_or_default();
                    self.blob.resize(self.blob.len().saturating_add(fill), 0);
                }
            }
        }
        self.blob.extend_from_slice(data);
        self.next = addr.saturating_add(data.len() as u64);
        Ok(())
    }
}

/// Parser for Intel HEX files.
#[derive(Debug, Clone, Copy, Default)]
pub struct IhexParser;

impl FirmwareParser for IhexParser {
    fn validate(&self, buf: &[u8], offset: usize) -> FormatResult<()> {
        let head = buf.get(offset..).unwrap_or_default().trim_ascii_start();
        match head.split_first() {
            Some((b':', rest)) if rest.len() >= 8 && rest.iter().take(8).all(u8::is_ascii_hexdigit) => Ok(()),
            _ => Err(FormatError::invalid_signature(
                "IntelHex",
                ":",
                head.get(..head.len().min(9)).unwrap_or_default(),
            )),
        }
    }

    fn parse(&self, data: Bytes, flags: ParseFlags) -> FormatResult<Firmware> {
        let mut image = Image::default();
        let mut signature = Vec::new();
        let mut base = 0u64;
        let mut got_eof = false;
        let mut last_line = 0usize;

        for (i, text) in data.split(|b| *b == b'\n').enumerate() {
            let line = i.saturating_add(1);
            let text = text.trim_ascii();
            if text.is_empty() {
                continue;
            }
            last_line = line;
            let record = Record::decode(line, text, flags)?;
            let kind = RecordType::from_u8(record.kind);
            if got_eof {
                match kind {
                    None => {
                        debug!(line, kind = record.kind, "skipping record after EOF");
                        continue;
                    }
                    Some(RecordType::Eof) => return Err(FormatError::record(line, "duplicate EOF")),
                    Some(_) => return Err(FormatError::record(line, "record after EOF")),
                }
            }
            match kind {
                Some(RecordType::Data) => {
                    image.push(line, base.saturating_add(u64::from(record.addr)), &record.data)?;
                }
                Some(RecordType::Eof) => {
                    record.expect_len(0)?;
                    got_eof = true;
                }
                Some(RecordType::ExtendedSegment) => {
                    record.expect_len(2)?;
                    base = record.be16() << 4;
                }
                Some(RecordType::ExtendedLinear) => {
                    record.expect_len(2)?;
                    base = record.be16() << 16;
                }
                Some(RecordType::StartSegment | RecordType::StartLinear) => {
                    record.expect_len(4)?;
                    debug!(line, "ignoring start address record");
                }
                Some(RecordType::Signature) => signature.extend_from_slice(&record.data),
                None => {
                    return Err(FormatError::record(
                        line,
                        format!("unsupported record type {:#04x}", record.kind),
                    ));
                }
            }
        }
        if !got_eof {
            return Err(FormatError::record(last_line, "missing EOF record"));
        }

        let address = image.base.unwrap_or_default();
        debug!(address, size = image.blob.len(), signed = !signature.is_empty(), "parsed Intel HEX");
        let mut firmware = Firmware::from_bytes(image.blob)
            .with_format(FormatKind::Ihex)
            .with_address(address);
        if !signature.is_empty() {
            firmware.add_child(Firmware::from_bytes(signature).with_id(IHEX_SIGNATURE_ID));
        }
        Ok(firmware)
    }

    fn write(&self, firmware: &Firmware) -> FormatResult<Bytes> {
        let data = firmware.bytes();
        let end = firmware.address().saturating_add(data.len() as u64);
        fit_u32("address", end.saturating_sub(1).max(firmware.address()))?;

        let mut out = String::new();
        let mut upper = 0u64;
        let mut offset = 0usize;
        while offset < data.len() {
            let addr = firmware.address().saturating_add(offset as u64);
            if addr >> 16 != upper {
                upper = addr >> 16;
                let hi = u16::try_from(upper).unwrap_or(u16::MAX);
                push_record(&mut out, RecordType::ExtendedLinear, 0, &hi.to_be_bytes());
            }
            let to_segment_end = usize::try_from(SEGMENT_SIZE.saturating_sub(addr & 0xFFFF)).unwrap_or(DATA_PER_RECORD);
            let len = DATA_PER_RECORD
                .min(to_segment_end)
                .min(data.len().saturating_sub(offset));
            let chunk = data.get(offset..offset.saturating_add(len)).unwrap_or_default();
            let low = u16::try_from(addr & 0xFFFF).unwrap_or_default();
            push_record(&mut out, RecordType::Data, low, chunk);
            offset = offset.saturating_add(len);
        }
        if let Some(sig) = firmware.get_child_by_id(IHEX_SIGNATURE_ID) {
            for chunk in sig.bytes().chunks(DATA_PER_RECORD) {
                push_record(&mut out, RecordType::Signature, 0, chunk);
            }
        }
        push_record(&mut out, RecordType::Eof, 0, &[]);
        Ok(Bytes::from(out))
    }
}

fn push_record(out: &mut String, kind: RecordType, addr: u16, data: &[u8]) {
    let count = u8::try_from(data.len()).unwrap_or(u8::MAX);
    let [addr_hi, addr_lo] = addr.to_be_bytes();
    let mut raw = Vec::with_capacity(data.len().saturating_add(5));
    raw.extend_from_slice(&[count, addr_hi, addr_lo, kind as u8]);
    raw.extend_from_slice(data);
    let sum = raw.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    raw.push(0u8.wrapping_sub(sum));
    out.push(':');
    out.push_str(&hex::encode_upper(raw));
    out.push('\n');
}
