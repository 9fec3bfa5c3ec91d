//! Property-based tests for bounds safety and stream equivalence

use fwkit_stream::prelude::*;
use proptest::prelude::*;
use std::io::{Read, Seek, SeekFrom};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_reads_never_exceed_bounds(data in proptest::collection::vec(any::<u8>(), 0..64),
                                      offset in 0usize..128,
                                      len in 0usize..128) {
        let reader = ByteReader::new(&data);
        let result = reader.read_bytes(offset, len);
        if offset + len <= data.len() {
            prop_assert_eq!(result.map(<[u8]>::len), Ok(len));
        } else {
            prop_assert_eq!(result, Err(OutOfBounds::new(offset, len, data.len())));
        }
        prop_assert_eq!(reader.read_u32(offset, Endian::Little).is_ok(), offset + 4 <= data.len());
        prop_assert_eq!(reader.read_u64(offset, Endian::Big).is_ok(), offset + 8 <= data.len());
    }

    #[test]
    fn prop_composite_matches_concatenation(parts in proptest::collection::vec(
                                                proptest::collection::vec(any::<u8>(), 0..16), 0..6),
                                            offset in 0u64..100,
                                            len in 0usize..32) {
        let flat: Vec<u8> = parts.concat();
        let mut stream = CompositeStream::new();
        for part in &parts {
            stream.push(BytesStream::new(part.clone()));
        }
        prop_assert_eq!(stream.size(), flat.len() as u64);

        let mut buf = vec![0u8; len];
        let exact = read_exact_at(&mut stream, offset, &mut buf);
        let end = offset as usize + len;
        if len == 0 {
            // an empty read succeeds at any offset, as with std `Read`
            prop_assert!(exact.is_ok());
        } else if end <= flat.len() {
            prop_assert!(exact.is_ok());
            prop_assert_eq!(Some(buf.as_slice()), flat.get(offset as usize..end));
        } else {
            prop_assert!(exact.is_err());
        }
    }

    #[test]
    fn prop_single_read_never_crosses_segments(a in proptest::collection::vec(any::<u8>(), 1..8),
                                               b in proptest::collection::vec(any::<u8>(), 1..8)) {
        let a_len = a.len();
        let mut stream = CompositeStream::new();
        stream.push(BytesStream::new(a)).push(BytesStream::new(b));
        let mut buf = [0u8; 32];
        for pos in 0..a_len {
            prop_assert!(stream.seek(SeekFrom::Start(pos as u64)).is_ok());
            let n = stream.read(&mut buf);
            prop_assert_eq!(n.ok(), Some(a_len - pos));
        }
    }
}
