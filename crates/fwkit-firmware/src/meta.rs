//! Format-specific metadata carried by container nodes.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::structs::AcpiTableHeader;

/// EFI signature type GUID for SHA256 hashes.
pub const EFI_CERT_SHA256_GUID: Uuid = Uuid::from_u128(0xc1c4_1626_504c_4092_aca9_41f9_3693_4328);

/// EFI signature type GUID for X.509 certificates.
pub const EFI_CERT_X509_GUID: Uuid = Uuid::from_u128(0xa5c0_59a1_94e4_4aa7_87b5_ab15_5c2b_f072);

/// Values stored in a DFU file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfuInfo {
    /// USB vendor id, 0xFFFF for "any"
    pub vid: u16,
    /// USB product id, 0xFFFF for "any"
    pub pid: u16,
    /// Device release number, 0xFFFF for "any"
    pub release: u16,
    /// DFU specification version (0x0100 or 0x011A)
    pub dfu_version: u16,
}

impl Default for DfuInfo {
    fn default() -> Self {
        Self {
            vid: 0xFFFF,
            pid: 0xFFFF,
            release: 0xFFFF,
            dfu_version: crate::structs::DFU_VERSION_DFU_1_0,
        }
    }
}

/// Kind of an EFI signature list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureKind {
    /// A SHA256 hash
    Sha256,
    /// An X.509 certificate
    X509,
    /// A type GUID this library does not know
    Unknown,
}

impl SignatureKind {
    /// Classify a signature type GUID.
    pub fn from_guid(guid: &Uuid) -> Self {
        if *guid == EFI_CERT_SHA256_GUID {
            SignatureKind::Sha256
        } else if *guid == EFI_CERT_X509_GUID {
            SignatureKind::X509
        } else {
            SignatureKind::Unknown
        }
    }
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureKind::Sha256 => write!(f, "sha256"),
            SignatureKind::X509 => write!(f, "x509"),
            SignatureKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// An EFI signature list entry's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfiSignatureInfo {
    /// Classified kind
    pub kind: SignatureKind,
    /// Raw type GUID of the list the entry came from
    pub type_guid: Uuid,
    /// Owner GUID stored in the entry
    pub owner: Uuid,
    /// Vendor header bytes of the list the entry came from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_header: Vec<u8>,
}

/// Format-specific metadata for a container node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FirmwareMeta {
    /// Nothing beyond the common fields
    #[default]
    None,
    /// DFU suffix values (DFU and DfuSe roots)
    Dfu(DfuInfo),
    /// EFI signature list entry
    EfiSignature(EfiSignatureInfo),
    /// ACPI table header
    Acpi(AcpiTableHeader),
}

impl FirmwareMeta {
    /// DFU suffix values, if present.
    pub fn dfu(&self) -> Option<&DfuInfo> {
        match self {
            FirmwareMeta::Dfu(info) => Some(info),
            _ => None,
        }
    }

    /// EFI signature identity, if present.
    pub fn efi_signature(&self) -> Option<&EfiSignatureInfo> {
        match self {
            FirmwareMeta::EfiSignature(info) => Some(info),
            _ => None,
        }
    }

    /// ACPI header, if present.
    pub fn acpi(&self) -> Option<&AcpiTableHeader> {
        match self {
            FirmwareMeta::Acpi(hdr) => Some(hdr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_constants_match_text() {
        assert_eq!(
            EFI_CERT_SHA256_GUID.to_string(),
            "c1c41626-504c-4092-aca9-41f936934328"
        );
        assert_eq!(
            EFI_CERT_X509_GUID.to_string(),
            "a5c059a1-94e4-4aa7-87b5-ab155c2bf072"
        );
    }

    #[test]
    fn test_signature_kind_from_guid() {
        assert_eq!(SignatureKind::from_guid(&EFI_CERT_SHA256_GUID), SignatureKind::Sha256);
        assert_eq!(SignatureKind::from_guid(&EFI_CERT_X509_GUID), SignatureKind::X509);
        assert_eq!(SignatureKind::from_guid(&Uuid::nil()), SignatureKind::Unknown);
    }

    #[test]
    fn test_dfu_info_defaults() {
        let info = DfuInfo::default();
        assert_eq!((info.vid, info.pid, info.release), (0xFFFF, 0xFFFF, 0xFFFF));
        assert_eq!(info.dfu_version, 0x0100);
    }
}
