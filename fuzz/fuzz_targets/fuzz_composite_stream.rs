//! Fuzzes seeks and reads across composite stream segment edges.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_composite_stream
#![no_main]
use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;
use fwkit_stream::{BytesStream, CompositeStream, PartialStream, StreamView};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the split points, the rest is payload and commands.
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let cut = usize::from(split) % (rest.len() + 1);
    let (head, tail) = rest.split_at(cut);

    let mut composite = CompositeStream::new();
    composite.push(BytesStream::new(Bytes::copy_from_slice(head)));
    if let Ok(partial) = PartialStream::new(
        BytesStream::new(Bytes::copy_from_slice(tail)),
        u64::from(split % 4),
        tail.len() as u64 / 2,
    ) {
        composite.push(partial);
    }

    let size = composite.size();
    let mut buf = [0u8; 8];
    for pair in tail.chunks(2) {
        let offset = u64::from(pair.first().copied().unwrap_or(0));
        let len = usize::from(pair.get(1).copied().unwrap_or(0)) % buf.len();
        if composite.seek(SeekFrom::Start(offset)).is_err() {
            continue;
        }
        if let Ok(n) = composite.read(&mut buf[..len]) {
            assert!(offset.saturating_add(n as u64) <= size);
        }
    }
    let _ = composite.to_bytes();
});
