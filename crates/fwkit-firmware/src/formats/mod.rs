//! Format parsers.
//!
//! Every format implements [`FirmwareParser`]: a cheap `validate` used for
//! auto-detection, a full `parse` that builds a [`Firmware`] tree, and a
//! `write` that serializes one. Formats that extend another compose it
//! rather than inherit from it; DfuSe parses the DFU suffix first and then
//! its own body.

use core::fmt;
use std::path::Path;

use bytes::Bytes;
use fwkit_errors::{FormatResult, ResultExt, error_context};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::flags::ParseFlags;
use crate::image::Firmware;

pub mod acpi;
pub mod dfu;
pub mod dfuse;
pub mod efi;
pub mod ihex;
pub mod raw;
pub mod uf2;

pub use acpi::{AcpiDmar, AcpiIvrs, AcpiTableParser};
pub use dfu::{DfuParser, decrypt_payload, encrypt_payload};
pub use dfuse::DfuseParser;
pub use efi::EfiSignatureListParser;
pub use ihex::IhexParser;
pub use raw::RawParser;
pub use uf2::Uf2Parser;

/// A binary or text firmware format.
pub trait FirmwareParser {
    /// Cheap signature check at `offset`, without a full parse.
    ///
    /// # Errors
    ///
    /// Returns a [`fwkit_errors::FormatError`] if `buf` is not this format.
    fn validate(&self, buf: &[u8], offset: usize) -> FormatResult<()>;

    /// Parse `data` into a container tree.
    ///
    /// # Errors
    ///
    /// Returns a [`fwkit_errors::FormatError`] describing the first
    /// structural problem not excused by `flags`.
    fn parse(&self, data: Bytes, flags: ParseFlags) -> FormatResult<Firmware>;

    /// Serialize a container tree.
    ///
    /// # Errors
    ///
    /// Returns a [`fwkit_errors::FormatError`] if the tree cannot be
    /// represented in this format.
    fn write(&self, firmware: &Firmware) -> FormatResult<Bytes>;
}

/// The supported formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatKind {
    /// Unstructured bytes
    Raw,
    /// Payload with a DFU suffix
    Dfu,
    /// ST DfuSe multi-target container
    Dfuse,
    /// Sequence of `EFI_SIGNATURE_LIST`s
    EfiSignatureList,
    /// ACPI table
    AcpiTable,
    /// Intel HEX text
    Ihex,
    /// UF2 block file
    Uf2,
}

/// Detection order: most specific signature first, raw last.
const DETECT_ORDER: [FormatKind; 6] = [
    FormatKind::Uf2,
    FormatKind::Dfuse,
    FormatKind::Dfu,
    FormatKind::Ihex,
    FormatKind::AcpiTable,
    FormatKind::EfiSignatureList,
];

impl FormatKind {
    /// The parser for this format.
    pub fn parser(self) -> &'static dyn FirmwareParser {
        match self {
            FormatKind::Raw => &RawParser,
            FormatKind::Dfu => &DfuParser,
            FormatKind::Dfuse => &DfuseParser,
            FormatKind::EfiSignatureList => &EfiSignatureListParser,
            FormatKind::AcpiTable => &AcpiTableParser,
            FormatKind::Ihex => &IhexParser,
            FormatKind::Uf2 => &Uf2Parser,
        }
    }

    /// Guess the format of `buf` by running each `validate` in priority
    /// order. Falls back to [`FormatKind::Raw`].
    pub fn detect(buf: &[u8]) -> FormatKind {
        DETECT_ORDER
            .into_iter()
            .find(|kind| kind.parser().validate(buf, 0).is_ok())
            .unwrap_or(FormatKind::Raw)
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::Raw => "raw",
            FormatKind::Dfu => "dfu",
            FormatKind::Dfuse => "dfuse",
            FormatKind::EfiSignatureList => "efi-signature-list",
            FormatKind::AcpiTable => "acpi-table",
            FormatKind::Ihex => "ihex",
            FormatKind::Uf2 => "uf2",
        };
        f.write_str(name)
    }
}

/// Detect the format of `data` and parse it.
///
/// # Errors
///
/// Returns the detected parser's error.
pub fn parse_any(data: Bytes, flags: ParseFlags) -> FormatResult<Firmware> {
    let kind = FormatKind::detect(&data);
    debug!(format = %kind, size = data.len(), "detected firmware format");
    kind.parser().parse(data, flags)
}

/// Read a firmware file and parse it as whichever format it holds.
///
/// # Errors
///
/// Returns [`fwkit_errors::FwkitError::Other`] naming `path` if the file
/// cannot be read, or [`fwkit_errors::FwkitError::Format`] if it does not
/// parse.
pub fn load_file(path: &Path, flags: ParseFlags) -> fwkit_errors::Result<Firmware> {
    let data = std::fs::read(path)
        .context(error_context!("read firmware", "path" => path.display().to_string()))?;
    Ok(parse_any(Bytes::from(data), flags)?)
}

/// Apply a cross-check that `IGNORE_CONSISTENCY` may downgrade to a warning.
pub(crate) fn consistency(
    flags: ParseFlags,
    ok: bool,
    err: impl FnOnce() -> fwkit_errors::FormatError,
) -> FormatResult<()> {
    if ok {
        return Ok(());
    }
    let err = err();
    if flags.contains(ParseFlags::IGNORE_CONSISTENCY) {
        tracing::warn!(error = %err, "ignoring inconsistent firmware");
        return Ok(());
    }
    Err(err)
}

/// Apply a checksum check that `IGNORE_CHECKSUM` may downgrade to a warning.
pub(crate) fn checksum_check(
    flags: ParseFlags,
    what: &'static str,
    stored: u64,
    computed: u64,
) -> FormatResult<()> {
    if stored == computed {
        return Ok(());
    }
    let err = fwkit_errors::FormatError::ChecksumMismatch {
        what,
        expected: stored,
        actual: computed,
    };
    if flags.contains(ParseFlags::IGNORE_CHECKSUM) {
        tracing::warn!(error = %err, "ignoring checksum mismatch");
        return Ok(());
    }
    Err(err)
}
