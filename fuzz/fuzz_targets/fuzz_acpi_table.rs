//! Fuzzes the ACPI table parser and writer.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_acpi_table
#![no_main]
use bytes::Bytes;
use fwkit_firmware::prelude::*;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary bytes.
    let _ = AcpiTableParser.validate(data, 0);
    let _ = AcpiTableParser.parse(Bytes::copy_from_slice(data), ParseFlags::empty());

    // Relaxed flags skip checksum and size cross-checks but never bounds checks.
    if let Ok(fw) = AcpiTableParser.parse(Bytes::copy_from_slice(data), ParseFlags::all()) {
        let _ = fw.to_string();
        if let Ok(out) = AcpiTableParser.write(&fw) {
            let _ = AcpiTableParser.parse(out, ParseFlags::all());
        }
    }

    if let Ok(dmar) = AcpiDmar::parse(Bytes::copy_from_slice(data), ParseFlags::empty()) {
        let _ = (dmar.opt_in(), dmar.interrupt_remapping());
    }
    if let Ok(ivrs) = AcpiIvrs::parse(Bytes::copy_from_slice(data), ParseFlags::empty()) {
        let _ = ivrs.remap_support();
    }
});
