//! Convenience re-exports for parsing and writing firmware

pub use crate::chunk::{Chunk, ChunkSequence, pad_to_alignment, reassemble, split};
pub use crate::flags::{FirmwareFlags, ParseFlags};
pub use crate::formats::{
    AcpiDmar, AcpiIvrs, AcpiTableParser, DfuParser, DfuseParser, EfiSignatureListParser,
    FirmwareParser, FormatKind, IhexParser, RawParser, Uf2Parser, decrypt_payload,
    encrypt_payload, load_file, parse_any,
};
pub use crate::image::Firmware;
pub use crate::meta::{
    DfuInfo, EFI_CERT_SHA256_GUID, EFI_CERT_X509_GUID, EfiSignatureInfo, FirmwareMeta,
    SignatureKind,
};
pub use crate::structs::BinaryStruct;
pub use fwkit_errors::{FormatError, FormatResult};
