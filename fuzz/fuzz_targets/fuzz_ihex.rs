//! Fuzzes the Intel HEX parser and writer.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_ihex
#![no_main]
use bytes::Bytes;
use fwkit_firmware::prelude::*;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary bytes.
    let _ = IhexParser.validate(data, 0);
    let _ = IhexParser.parse(Bytes::copy_from_slice(data), ParseFlags::empty());

    // Relaxed flags skip checksum and size cross-checks but never bounds checks.
    if let Ok(fw) = IhexParser.parse(Bytes::copy_from_slice(data), ParseFlags::all()) {
        let _ = fw.to_string();
        if let Ok(out) = IhexParser.write(&fw) {
            let _ = IhexParser.parse(out, ParseFlags::all());
        }
    }
});
