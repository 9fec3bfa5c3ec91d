//! Fuzzes the DfuSe container parser and writer.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_dfuse
#![no_main]
use bytes::Bytes;
use fwkit_firmware::prelude::*;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary bytes.
    let _ = DfuseParser.validate(data, 0);
    let _ = DfuseParser.parse(Bytes::copy_from_slice(data), ParseFlags::empty());

    // Relaxed flags skip checksum and size cross-checks but never bounds checks.
    if let Ok(fw) = DfuseParser.parse(Bytes::copy_from_slice(data), ParseFlags::all()) {
        let _ = fw.to_string();
        if let Ok(out) = DfuseParser.write(&fw) {
            let _ = DfuseParser.parse(out, ParseFlags::all());
        }
    }
});
