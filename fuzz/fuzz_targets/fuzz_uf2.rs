//! Fuzzes the UF2 parser and writer.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_uf2
#![no_main]
use bytes::Bytes;
use fwkit_firmware::prelude::*;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary bytes.
    let _ = Uf2Parser.validate(data, 0);
    let _ = Uf2Parser.parse(Bytes::copy_from_slice(data), ParseFlags::empty());

    // Relaxed flags skip checksum and size cross-checks but never bounds checks.
    if let Ok(fw) = Uf2Parser.parse(Bytes::copy_from_slice(data), ParseFlags::all()) {
        let _ = fw.to_string();
        if let Ok(out) = Uf2Parser.write(&fw) {
            let _ = Uf2Parser.parse(out, ParseFlags::all());
        }
    }
});
