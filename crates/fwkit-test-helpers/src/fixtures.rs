//! Raw firmware file builders.
//!
//! These lay out bytes by hand, field by field, so parser tests do not
//! depend on the writers they are checking. Only the checksum crate is
//! shared with the code under test.

use fwkit_checksum::crc32_dfu;

/// Mixed-endian bytes of the EFI SHA256 signature type GUID.
pub const EFI_CERT_SHA256_GUID_LE: [u8; 16] = [
    0x26, 0x16, 0xc4, 0xc1, 0x4c, 0x50, 0x92, 0x40, 0xac, 0xa9, 0x41, 0xf9, 0x36, 0x93, 0x43, 0x28,
];

/// Mixed-endian bytes of the EFI X.509 signature type GUID.
pub const EFI_CERT_X509_GUID_LE: [u8; 16] = [
    0xa1, 0x59, 0xc0, 0xa5, 0xe4, 0x94, 0xa7, 0x4a, 0x87, 0xb5, 0xab, 0x15, 0x5c, 0x2b, 0xf0, 0x72,
];

fn le32(value: usize) -> [u8; 4] {
    u32::try_from(value).unwrap_or(u32::MAX).to_le_bytes()
}

/// Append a 16-byte DFU suffix with a valid CRC.
pub fn with_dfu_suffix(payload: &[u8], vid: u16, pid: u16, release: u16, dfu_version: u16) -> Vec<u8> {
    let mut out = payload.to_vec();
    out.extend_from_slice(&release.to_le_bytes());
    out.extend_from_slice(&pid.to_le_bytes());
    out.extend_from_slice(&vid.to_le_bytes());
    out.extend_from_slice(&dfu_version.to_le_bytes());
    out.extend_from_slice(b"UFD");
    out.push(16);
    let crc = crc32_dfu(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// One DfuSe element: a load address and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFixture {
    /// Load address
    pub address: u32,
    /// Element bytes
    pub data: Vec<u8>,
}

/// One DfuSe target (alternate setting).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFixture {
    /// Alternate setting
    pub alt_setting: u8,
    /// Optional target name
    pub name: Option<String>,
    /// Elements in file order
    pub elements: Vec<ElementFixture>,
}

impl TargetFixture {
    /// A target with the given elements.
    pub fn new(alt_setting: u8, name: Option<&str>, elements: &[(u32, &[u8])]) -> Self {
        Self {
            alt_setting,
            name: name.map(str::to_string),
            elements: elements
                .iter()
                .map(|(address, data)| ElementFixture {
                    address: *address,
                    data: data.to_vec(),
                })
                .collect(),
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut elements = Vec::new();
        for element in &self.elements {
            elements.extend_from_slice(&element.address.to_le_bytes());
            elements.extend_from_slice(&le32(element.data.len()));
            elements.extend_from_slice(&element.data);
        }
        let mut out = b"Target".to_vec();
        out.push(self.alt_setting);
        let mut name = [0u8; 255];
        let named = match &self.name {
            Some(text) => {
                for (dst, src) in name.iter_mut().zip(text.bytes()) {
                    *dst = src;
                }
                1u32
            }
            None => 0,
        };
        out.extend_from_slice(&named.to_le_bytes());
        out.extend_from_slice(&name);
        out.extend_from_slice(&le32(elements.len()));
        out.extend_from_slice(&le32(self.elements.len()));
        out.extend_from_slice(&elements);
        out
    }
}

/// A complete DfuSe file, including the suffix.
pub fn dfuse_file(targets: &[TargetFixture], vid: u16, pid: u16) -> Vec<u8> {
    let body: Vec<u8> = targets.iter().flat_map(TargetFixture::encode).collect();
    let mut out = b"DfuSe".to_vec();
    out.push(1);
    out.extend_from_slice(&le32(body.len().saturating_add(11)));
    out.push(u8::try_from(targets.len()).unwrap_or(u8::MAX));
    out.extend_from_slice(&body);
    with_dfu_suffix(&out, vid, pid, 0xFFFF, 0x011A)
}

/// One `EFI_SIGNATURE_LIST` with a zero-length vendor header. Every payload
/// must have the same length.
pub fn efi_signature_list(type_guid_le: [u8; 16], entries: &[([u8; 16], &[u8])]) -> Vec<u8> {
    efi_signature_list_with_header(type_guid_le, &[], entries)
}

/// An EFI signature list with vendor header bytes between the list header
/// and the first entry.
pub fn efi_signature_list_with_header(
    type_guid_le: [u8; 16],
    vendor_header: &[u8],
    entries: &[([u8; 16], &[u8])],
) -> Vec<u8> {
    let payload_len = entries.first().map_or(0, |(_, p)| p.len());
    let entry_size = payload_len.saturating_add(16);
    let list_size = entry_size
        .saturating_mul(entries.len())
        .saturating_add(0x1c)
        .saturating_add(vendor_header.len());
    let mut out = type_guid_le.to_vec();
    out.extend_from_slice(&le32(list_size));
    out.extend_from_slice(&le32(vendor_header.len()));
    out.extend_from_slice(&le32(entry_size));
    out.extend_from_slice(vendor_header);
    for (owner, payload) in entries {
        out.extend_from_slice(owner);
        out.extend_from_slice(payload);
    }
    out
}

/// An ACPI table with a correct length and checksum.
pub fn acpi_table(signature: [u8; 4], revision: u8, body: &[u8]) -> Vec<u8> {
    let mut out = signature.to_vec();
    out.extend_from_slice(&le32(body.len().saturating_add(36)));
    out.push(revision);
    out.push(0);
    out.extend_from_slice(b"FWKIT\0");
    out.extend_from_slice(b"TESTTBL\0");
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(b"FWKT");
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(body);
    let sum = out.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if let Some(checksum) = out.get_mut(9) {
        *checksum = 0u8.wrapping_sub(sum);
    }
    out
}

/// One Intel HEX record line, without a line terminator.
pub fn ihex_record(kind: u8, addr: u16, data: &[u8]) -> String {
    let mut raw = vec![u8::try_from(data.len()).unwrap_or(u8::MAX)];
    raw.extend_from_slice(&addr.to_be_bytes());
    raw.push(kind);
    raw.extend_from_slice(data);
    let sum = raw.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    raw.push(0u8.wrapping_sub(sum));
    format!(":{}", hex::encode_upper(raw))
}

/// One 512-byte UF2 block.
pub fn uf2_block(
    flags: u32,
    target_addr: u32,
    block_no: u32,
    num_blocks: u32,
    family_id: u32,
    data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(512);
    for word in [
        0x0A32_4655,
        0x9E5D_5157,
        flags,
        target_addr,
        u32::try_from(data.len()).unwrap_or(u32::MAX),
        block_no,
        num_blocks,
        family_id,
    ] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(data);
    out.resize(508, 0);
    out.extend_from_slice(&0x0AB1_6F30u32.to_le_bytes());
    out
}
