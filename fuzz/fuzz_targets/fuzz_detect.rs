//! Fuzzes format detection and the dispatching parser.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_detect
#![no_main]
use bytes::Bytes;
use fwkit_firmware::prelude::*;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let kind = FormatKind::detect(data);
    let _ = kind.parser().validate(data, 0);

    if let Ok(fw) = parse_any(Bytes::copy_from_slice(data), ParseFlags::all()) {
        let _ = fw.chunks(64).iter().count();
        let _ = fw.write_chunk(fw.address(), fw.size().min(16));
    }
});
