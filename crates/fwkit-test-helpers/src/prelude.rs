//! Convenience re-exports for common test utilities.

pub use crate::must::{must, must_err, must_hex, must_some};

#[cfg(feature = "async")]
pub use crate::must::must_async;

#[cfg(feature = "fixtures")]
pub use crate::fixtures::{
    EFI_CERT_SHA256_GUID_LE, EFI_CERT_X509_GUID_LE, ElementFixture, TargetFixture, acpi_table,
    dfuse_file, efi_signature_list, efi_signature_list_with_header, ihex_record, uf2_block, with_dfu_suffix,
};

/// Result type for tests that use `?`.
pub type TestResult = Result<(), Box<dyn std::error::Error>>;
