//! Property-based tests for firmware parsers and chunking

use bytes::Bytes;
use fwkit_firmware::prelude::*;
use fwkit_test_helpers::prelude::*;
use proptest::prelude::*;

const ALL_FORMATS: [FormatKind; 7] = [
    FormatKind::Raw,
    FormatKind::Dfu,
    FormatKind::Dfuse,
    FormatKind::EfiSignatureList,
    FormatKind::AcpiTable,
    FormatKind::Ihex,
    FormatKind::Uf2,
];

fn arb_payload(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..max)
}

fn arb_target() -> impl Strategy<Value = TargetFixture> {
    (
        any::<u8>(),
        prop::option::of("[A-Za-z][A-Za-z0-9]{0,30}"),
        prop::collection::vec((any::<u32>(), prop::collection::vec(any::<u8>(), 0..64)), 1..4),
    )
        .prop_map(|(alt, name, elements)| {
            let refs: Vec<(u32, &[u8])> = elements.iter().map(|(a, d)| (*a, d.as_slice())).collect();
            TargetFixture::new(alt, name.as_deref(), &refs)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_parsers_never_panic(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let all = ParseFlags::all();
        for kind in ALL_FORMATS {
            for flags in [ParseFlags::empty(), all] {
                let outcome = kind.parser().parse(Bytes::from(data.clone()), flags);
                // only Intel HEX can grow its input, by zero-filling holes
                if let Ok(fw) = outcome
                    && kind != FormatKind::Ihex
                {
                    prop_assert!(fw.size() <= data.len(), "{kind} grew {} to {}", data.len(), fw.size());
                }
            }
        }
    }

    #[test]
    fn prop_detect_is_consistent_with_validate(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let kind = FormatKind::detect(&data);
        if kind != FormatKind::Raw {
            prop_assert!(kind.parser().validate(&data, 0).is_ok());
        }
    }

    #[test]
    fn prop_dfu_roundtrip(
        payload in arb_payload(4096),
        vid in any::<u16>(),
        pid in any::<u16>(),
        release in any::<u16>(),
    ) {
        let file = with_dfu_suffix(&payload, vid, pid, release, 0x0100);
        let fw = DfuParser.parse(Bytes::from(file.clone()), ParseFlags::empty())?;
        let body = fw.bytes();
        prop_assert_eq!(body.as_ref(), payload.as_slice());
        let written = DfuParser.write(&fw)?;
        prop_assert_eq!(written.as_ref(), file.as_slice());
    }

    #[test]
    fn prop_dfuse_roundtrip(targets in prop::collection::vec(arb_target(), 1..4)) {
        let file = dfuse_file(&targets, 0x0483, 0xDF11);
        let fw = DfuseParser.parse(Bytes::from(file.clone()), ParseFlags::empty())?;
        prop_assert_eq!(fw.children().len(), targets.len());
        for (image, target) in fw.children().iter().zip(&targets) {
            prop_assert_eq!(image.idx(), u64::from(target.alt_setting));
            prop_assert_eq!(image.id(), target.name.as_deref());
            prop_assert_eq!(image.children().len(), target.elements.len());
        }
        let written = DfuseParser.write(&fw)?;
        prop_assert_eq!(written.as_ref(), file.as_slice());
    }

    #[test]
    fn prop_efi_sha256_roundtrip(hashes in prop::collection::vec(any::<[u8; 32]>(), 1..20)) {
        let entries: Vec<([u8; 16], &[u8])> = hashes.iter().map(|h| ([0x77; 16], h.as_slice())).collect();
        let file = efi_signature_list(EFI_CERT_SHA256_GUID_LE, &entries);
        let fw = EfiSignatureListParser.parse(Bytes::from(file.clone()), ParseFlags::empty())?;
        prop_assert_eq!(fw.children().len(), hashes.len());
        let written = EfiSignatureListParser.write(&fw)?;
        prop_assert_eq!(written.as_ref(), file.as_slice());
    }

    #[test]
    fn prop_ihex_roundtrip(payload in arb_payload(2048), address in 0u64..0xFFF0_0000) {
        let fw = Firmware::from_bytes(payload.clone()).with_address(address);
        let text = IhexParser.write(&fw)?;
        let parsed = IhexParser.parse(text, ParseFlags::empty())?;
        prop_assert_eq!(parsed.address(), address);
        let body = parsed.bytes();
        prop_assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[test]
    fn prop_uf2_roundtrip(
        payload in arb_payload(2048),
        address in 0u64..0xF000_0000,
        family in any::<u32>(),
    ) {
        let fw = Firmware::from_bytes(payload.clone())
            .with_address(address)
            .with_idx(u64::from(family));
        let parsed = Uf2Parser.parse(Uf2Parser.write(&fw)?, ParseFlags::empty())?;
        prop_assert_eq!(parsed.address(), address);
        prop_assert_eq!(parsed.idx(), u64::from(family));
        let body = parsed.bytes();
        prop_assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[test]
    fn prop_chunks_cover_image(
        payload in arb_payload(4096),
        base in 0u64..0x1_0000_0000,
        page in prop_oneof![Just(0u32), 1u32..4096],
        max in 1usize..1024,
    ) {
        let seq = split(Bytes::from(payload.clone()), base, page, max);
        prop_assert_eq!(seq.total_len(), payload.len());

        let chunks: Vec<Chunk> = seq.iter().collect();
        prop_assert_eq!(chunks.len(), seq.len());
        let mut next = base;
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.idx(), i);
            prop_assert_eq!(chunk.address(), next);
            prop_assert!(!chunk.is_empty() && chunk.len() <= max);
            if page > 0 {
                let last = chunk.address().saturating_add((chunk.len() as u64).saturating_sub(1));
                prop_assert_eq!(chunk.address() / u64::from(page), last / u64::from(page));
            }
            next = next.saturating_add(chunk.len() as u64);
        }
        let joined = reassemble(chunks.iter())?;
        prop_assert_eq!(joined.as_ref(), payload.as_slice());
    }

    #[test]
    fn prop_write_chunk_matches_slice(
        payload in arb_payload(1024),
        base in 0u64..0x1000_0000,
        start in 0usize..1024,
        len in 0usize..256,
    ) {
        let fw = Firmware::from_bytes(payload.clone()).with_address(base);
        let result = fw.write_chunk(base.saturating_add(start as u64), len);
        match payload.get(start..start.saturating_add(len)) {
            Some(expected) => {
                let bytes = result?;
                prop_assert_eq!(bytes.as_ref(), expected);
            }
            None => prop_assert!(result.is_err()),
        }
    }
}
