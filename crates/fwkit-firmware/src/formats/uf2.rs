//! UF2 block files, as consumed by USB mass-storage bootloaders.

use bytes::{Bytes, BytesMut};
use fwkit_errors::{FormatError, FormatResult};
use fwkit_stream::ByteWriter;
use tracing::{debug, trace};

use super::{FirmwareParser, FormatKind, consistency};
use crate::flags::ParseFlags;
use crate::image::Firmware;
use crate::structs::{BinaryStruct, UF2_BLOCK_SIZE, Uf2Block, Uf2Flags, fit_u32};

/// Payload bytes per block when writing.
pub const UF2_WRITE_PAYLOAD: usize = 256;

/// Parser for UF2 files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uf2Parser;

impl FirmwareParser for Uf2Parser {
    fn validate(&self, buf: &[u8], offset: usize) -> FormatResult<()> {
        Uf2Block::parse(buf, offset).map(|_| ())
    }

    fn parse(&self, data: Bytes, flags: ParseFlags) -> FormatResult<Firmware> {
        if data.is_empty() || !data.len().is_multiple_of(UF2_BLOCK_SIZE) {
            return Err(FormatError::invalid_size(
                "file size",
                format!("non-zero multiple of {UF2_BLOCK_SIZE}"),
                data.len() as u64,
            ));
        }
        let total = data.len() / UF2_BLOCK_SIZE;

        let mut payload = BytesMut::new();
        let mut address: Option<u64> = None;
        let mut next_addr = 0u64;
        let mut family_id = 0u32;
        let mut num_blocks = None;
        for i in 0..total {
            let block = Uf2Block::parse(&data, i.saturating_mul(UF2_BLOCK_SIZE))?;
            consistency(flags, block.block_no() as usize == i, || {
                FormatError::inconsistent("UF2 block number", u64::from(block.block_no()), i as u64)
            })?;
            let declared = *num_blocks.get_or_insert(block.num_blocks());
            consistency(flags, block.num_blocks() == declared, || {
                FormatError::inconsistent("UF2 block count", u64::from(declared), u64::from(block.num_blocks()))
            })?;

            if block.flags().contains(Uf2Flags::NOT_MAIN_FLASH) {
                trace!(block = i, "skipping block not for main flash");
                continue;
            }
            if block.flags().contains(Uf2Flags::FAMILY_ID_PRESENT) {
                family_id = block.family_id();
            }
            let target = u64::from(block.target_addr());
            match address {
                None => address = Some(target),
                Some(_) => consistency(flags, target == next_addr, || {
                    FormatError::inconsistent("UF2 block address", next_addr, target)
                })?,
            }
            next_addr = target.saturating_add(block.data().len() as u64);
            payload.extend_from_slice(block.data());
        }

        let declared = num_blocks.unwrap_or_default();
        consistency(flags, declared as usize == total, || {
            FormatError::inconsistent("UF2 block count", u64::from(declared), total as u64)
        })?;
        debug!(
            blocks = total,
            family_id,
            size = payload.len(),
            "parsed UF2"
        );
        Ok(Firmware::from_bytes(payload.freeze())
            .with_format(FormatKind::Uf2)
            .with_address(address.unwrap_or_default())
            .with_idx(u64::from(family_id)))
    }

    fn write(&self, firmware: &Firmware) -> FormatResult<Bytes> {
        let data = firmware.bytes();
        let family_id = fit_u32("family_id", firmware.idx())?;
        let mut flags = Uf2Flags::empty();
        if family_id != 0 {
            flags |= Uf2Flags::FAMILY_ID_PRESENT;
        }

        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![data.as_ref()]
        } else {
            data.chunks(UF2_WRITE_PAYLOAD).collect()
        };
        let num_blocks = fit_u32("num_blocks", chunks.len() as u64)?;
        let mut writer = ByteWriter::with_capacity(chunks.len().saturating_mul(UF2_BLOCK_SIZE));
        let mut addr = firmware.address();
        for (block_no, chunk) in (0u32..).zip(chunks) {
            let mut block = Uf2Block::new();
            block
                .set_data(Bytes::copy_from_slice(chunk))?
                .set_flags(flags)
                .set_target_addr(fit_u32("target_addr", addr)?)
                .set_block_no(block_no)
                .set_num_blocks(num_blocks)
                .set_family_id(family_id);
            block.write_into(&mut writer);
            addr = addr.saturating_add(chunk.len() as u64);
        }
        Ok(writer.into_bytes())
    }
}
