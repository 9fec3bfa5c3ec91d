//! The firmware container tree.
//!
//! A [`Firmware`] node owns an optional byte blob plus metadata and an
//! ordered list of children. Parsers build trees; writers serialize them.
//! Blobs are [`Bytes`], so a child produced by a parser is a zero-copy view
//! into the buffer it was parsed from and stays valid for as long as the
//! child lives.

use core::fmt;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};
use fwkit_checksum::{ChecksumKind, checksum_hex, guess_kind};
use fwkit_errors::{FormatError, FormatResult, OutOfBounds};

use crate::chunk::{ChunkSequence, split};
use crate::flags::FirmwareFlags;
use crate::formats::FormatKind;
use crate::meta::{FirmwareMeta, SignatureKind};

#[derive(Debug, Clone, Default)]
struct ChecksumCache {
    md5: OnceLock<String>,
    sha256: OnceLock<String>,
    sha512: OnceLock<String>,
}

impl ChecksumCache {
    fn slot(&self, kind: ChecksumKind) -> &OnceLock<String> {
        match kind {
            ChecksumKind::Md5 => &self.md5,
            ChecksumKind::Sha256 => &self.sha256,
            ChecksumKind::Sha512 => &self.sha512,
        }
    }
}

/// A node in a firmware container tree.
#[derive(Debug, Clone, Default)]
pub struct Firmware {
    format: Option<FormatKind>,
    id: Option<String>,
    idx: u64,
    address: u64,
    version: Option<String>,
    version_raw: u64,
    data: Option<Bytes>,
    children: Vec<Firmware>,
    max_children: usize,
    flags: FirmwareFlags,
    meta: FirmwareMeta,
    checksums: ChecksumCache,
}

impl PartialEq for Firmware {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
            && self.id == other.id
            && self.idx == other.idx
            && self.address == other.address
            && self.version == other.version
            && self.version_raw == other.version_raw
            && self.data == other.data
            && self.children == other.children
            && self.max_children == other.max_children
            && self.flags == other.flags
            && self.meta == other.meta
    }
}

impl Eq for Firmware {}

impl Firmware {
    /// An empty node.
    pub fn new() -> Self {
        Self::default()
    }

    /// A leaf node owning `data`.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// Builder-style id setter.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    /// Builder-style idx setter.
    pub fn with_idx(mut self, idx: u64) -> Self {
        self.idx = idx;
        self
    }

    /// Builder-style address setter.
    pub fn with_address(mut self, address: u64) -> Self {
        self.address = address;
        self
    }

    /// Builder-style metadata setter.
    pub fn with_meta(mut self, meta: FirmwareMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Builder-style format setter.
    pub fn with_format(mut self, format: FormatKind) -> Self {
        self.format = Some(format);
        self
    }

    /// Format this node was parsed from or will be written as.
    pub fn format(&self) -> Option<FormatKind> {
        self.format
    }

    /// Set the format.
    pub fn set_format(&mut self, format: FormatKind) {
        self.format = Some(format);
    }

    /// Identifier, unique among siblings.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Set the identifier.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Format-specific index, e.g. an alternate setting.
    pub fn idx(&self) -> u64 {
        self.idx
    }

    /// Set the index.
    pub fn set_idx(&mut self, idx: u64) {
        self.idx = idx;
    }

    /// Base address for memory-mapped targets, 0 if not applicable.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Set the base address.
    pub fn set_address(&mut self, address: u64) {
        self.address = address;
    }

    /// Version string, if the format encodes one as text.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Set the version string.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    /// Raw integer version, 0 if unset.
    pub fn version_raw(&self) -> u64 {
        self.version_raw
    }

    /// Set the raw integer version.
    pub fn set_version_raw(&mut self, version_raw: u64) {
        self.version_raw = version_raw;
    }

    /// The node's own blob, if it has one.
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Replace the node's own blob.
    pub fn set_data(&mut self, data: impl Into<Bytes>) {
        self.data = Some(data.into());
        self.invalidate();
    }

    /// Child quota, 0 for unlimited.
    pub fn max_children(&self) -> usize {
        self.max_children
    }

    /// Set the child quota enforced by [`Firmware::add_child_checked`].
    pub fn set_max_children(&mut self, max_children: usize) {
        self.max_children = max_children;
    }

    /// Container flags.
    pub fn flags(&self) -> FirmwareFlags {
        self.flags
    }

    /// Add container flags.
    pub fn add_flags(&mut self, flags: FirmwareFlags) {
        self.flags |= flags;
    }

    /// Format-specific metadata.
    pub fn meta(&self) -> &FirmwareMeta {
        &self.meta
    }

    /// Set format-specific metadata.
    pub fn set_meta(&mut self, meta: FirmwareMeta) {
        self.meta = meta;
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[Firmware] {
        &self.children
    }

    fn invalidate(&mut self) {
        self.checksums = ChecksumCache::default();
    }

    fn dedupe_position(&self, child: &Firmware) -> Option<usize> {
        self.children.iter().position(|existing| {
            (self.flags.contains(FirmwareFlags::DEDUPE_ID)
                && child.id.is_some()
                && existing.id == child.id)
                || (self.flags.contains(FirmwareFlags::DEDUPE_IDX) && existing.idx == child.idx)
        })
    }

    /// Append a child, replacing a duplicate sibling when the node has a
    /// dedupe flag. The child quota is not checked.
    pub fn add_child(&mut self, child: Firmware) {
        match self.dedupe_position(&child) {
            Some(pos) => {
                if let Some(slot) = self.children.get_mut(pos) {
                    *slot = child;
                }
            }
            None => self.children.push(child),
        }
        self.invalidate();
    }

    /// Append a child, enforcing the child quota.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::TooManyChildren`] if the quota is reached and
    /// the child would not replace an existing sibling.
    pub fn add_child_checked(&mut self, child: Firmware) -> FormatResult<()> {
        if self.max_children > 0
            && self.dedupe_position(&child).is_none()
            && self.children.len() >= self.max_children
        {
            return Err(FormatError::TooManyChildren {
                limit: self.max_children,
            });
        }
        self.add_child(child);
        Ok(())
    }

    /// First child with the given id.
    pub fn get_child_by_id(&self, id: &str) -> Option<&Firmware> {
        self.children.iter().find(|c| c.id() == Some(id))
    }

    /// First child with the given index.
    pub fn get_child_by_idx(&self, idx: u64) -> Option<&Firmware> {
        self.children.iter().find(|c| c.idx == idx)
    }

    /// First child whose checksum matches `checksum`, case-insensitively.
    /// The digest kind is inferred from the hex length.
    pub fn get_child_by_checksum(&self, checksum: &str) -> Option<&Firmware> {
        let kind = guess_kind(checksum)?;
        self.children
            .iter()
            .find(|c| c.checksum(kind).eq_ignore_ascii_case(checksum))
    }

    /// Remove and return the first child with the given id.
    pub fn remove_child_by_id(&mut self, id: &str) -> Option<Firmware> {
        let pos = self.children.iter().position(|c| c.id() == Some(id))?;
        self.invalidate();
        Some(self.children.remove(pos))
    }

    /// Remove and return the first child with the given index.
    pub fn remove_child_by_idx(&mut self, idx: u64) -> Option<Firmware> {
        let pos = self.children.iter().position(|c| c.idx == idx)?;
        self.invalidate();
        Some(self.children.remove(pos))
    }

    /// The only child.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::NoDefaultChild`] unless there is exactly one.
    pub fn default_child(&self) -> FormatResult<&Firmware> {
        match self.children.as_slice() {
            [only] => Ok(only),
            others => Err(FormatError::NoDefaultChild {
                count: others.len(),
            }),
        }
    }

    /// The child with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::MissingRequiredChild`] if there is none.
    pub fn require_child(&self, id: &str) -> FormatResult<&Firmware> {
        self.get_child_by_id(id)
            .ok_or_else(|| FormatError::MissingRequiredChild(id.to_string()))
    }

    /// The node's payload.
    ///
    /// A node with its own blob returns it. A node without one returns the
    /// concatenation of its children's payloads in tree order.
    pub fn bytes(&self) -> Bytes {
        if let Some(data) = &self.data {
            return data.clone();
        }
        match self.children.as_slice() {
            [] => Bytes::new(),
            [only] => only.bytes(),
            many => {
                let mut out = BytesMut::new();
                for child in many {
                    out.extend_from_slice(&child.bytes());
                }
                out.freeze()
            }
        }
    }

    /// Payload length.
    pub fn size(&self) -> usize {
        self.data
            .as_ref()
            .map_or_else(|| self.children.iter().map(Firmware::size).sum(), Bytes::len)
    }

    /// Split the payload into chunks addressed from [`Firmware::address`].
    pub fn chunks(&self, max_chunk_size: usize) -> ChunkSequence {
        split(self.bytes(), self.address, 0, max_chunk_size)
    }

    /// The `chunk_size` bytes to write at device `address`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::OutOfBounds`] if the range is not inside the
    /// image, including addresses below its base.
    pub fn write_chunk(&self, address: u64, chunk_size: usize) -> FormatResult<Bytes> {
        let bytes = self.bytes();
        let size = bytes.len();
        let offset = address
            .checked_sub(self.address)
            .and_then(|o| usize::try_from(o).ok())
            .ok_or(OutOfBounds::new(usize::MAX, chunk_size, size))?;
        OutOfBounds::check(offset, chunk_size, size)?;
        Ok(bytes.slice(offset..offset.saturating_add(chunk_size)))
    }

    /// Hex checksum of the payload, computed once per kind and cached.
    ///
    /// EFI SHA256 signature entries already are a hash, so their SHA256
    /// checksum is the stored hash itself.
    pub fn checksum(&self, kind: ChecksumKind) -> String {
        self.checksums
            .slot(kind)
            .get_or_init(|| {
                let stored_hash = kind == ChecksumKind::Sha256
                    && self
                        .meta
                        .efi_signature()
                        .is_some_and(|s| s.kind == SignatureKind::Sha256);
                if stored_hash {
                    hex::encode(self.bytes())
                } else {
                    checksum_hex(kind, &self.bytes())
                }
            })
            .clone()
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}", "", indent = depth.saturating_mul(2))?;
        match self.format {
            Some(format) => write!(f, "{format}")?,
            None => write!(f, "image")?,
        }
        if let Some(id) = &self.id {
            write!(f, " id={id}")?;
        }
        if self.idx != 0 {
            write!(f, " idx={:#x}", self.idx)?;
        }
        if self.address != 0 {
            write!(f, " addr={:#x}", self.address)?;
        }
        if let Some(version) = &self.version {
            write!(f, " version={version}")?;
        } else if self.version_raw != 0 {
            write!(f, " version={:#x}", self.version_raw)?;
        }
        write!(f, " size={:#x}", self.size())?;
        match &self.meta {
            FirmwareMeta::None => {}
            FirmwareMeta::Dfu(info) => write!(
                f,
                " vid={:#06x} pid={:#06x} release={:#06x} dfu={:#06x}",
                info.vid, info.pid, info.release, info.dfu_version
            )?,
            FirmwareMeta::EfiSignature(sig) => {
                write!(f, " kind={} owner={}", sig.kind, sig.owner)?
            }
            FirmwareMeta::Acpi(hdr) => write!(
                f,
                " signature={} revision={:#x} oem={}",
                hdr.signature_str(),
                hdr.revision(),
                hdr.oem_id()
            )?,
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_node(f, depth.saturating_add(1))?;
        }
        Ok(())
    }
}

impl fmt::Display for Firmware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, data: &'static [u8]) -> Firmware {
        Firmware::from_bytes(data).with_id(id)
    }

    #[test]
    fn test_bytes_concatenates_children() {
        let mut root = Firmware::new();
        root.add_child(leaf("a", b"ab"));
        root.add_child(leaf("b", b"cd"));
        assert_eq!(root.bytes().as_ref(), b"abcd");
        assert_eq!(root.size(), 4);
    }

    #[test]
    fn test_own_data_wins_over_children() {
        let mut root = Firmware::from_bytes(&b"payload"[..]);
        root.add_child(leaf("signature", b"sig"));
        assert_eq!(root.bytes().as_ref(), b"payload");
    }

    #[test]
    fn test_add_child_checked_quota() -> FormatResult<()> {
        let mut root = Firmware::new();
        root.set_max_children(2);
        root.add_child_checked(leaf("a", b"1"))?;
        root.add_child_checked(leaf("b", b"2"))?;
        assert_eq!(
            root.add_child_checked(leaf("c", b"3")),
            Err(FormatError::TooManyChildren { limit: 2 })
        );
        Ok(())
    }

    #[test]
    fn test_dedupe_replaces_sibling() -> FormatResult<()> {
        let mut root = Firmware::new();
        root.add_flags(FirmwareFlags::DEDUPE_ID);
        root.set_max_children(1);
        root.add_child_checked(leaf("a", b"old"))?;
        root.add_child_checked(leaf("a", b"new"))?;
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.require_child("a")?.bytes().as_ref(), b"new");
        Ok(())
    }

    #[test]
    fn test_lookup_and_remove() {
        let mut root = Firmware::new();
        root.add_child(leaf("a", b"1").with_idx(7));
        root.add_child(leaf("b", b"2"));
        assert_eq!(root.get_child_by_idx(7).and_then(Firmware::id), Some("a"));
        assert!(root.remove_child_by_id("a").is_some());
        assert!(root.remove_child_by_id("a").is_none());
        assert!(root.remove_child_by_idx(0).is_some());
        assert!(root.children().is_empty());
    }

    #[test]
    fn test_default_and_required_child() {
        let mut root = Firmware::new();
        assert_eq!(
            root.default_child().err(),
            Some(FormatError::NoDefaultChild { count: 0 })
        );
        root.add_child(leaf("only", b"x"));
        assert!(root.default_child().is_ok());
        assert_eq!(
            root.require_child("missing").err(),
            Some(FormatError::MissingRequiredChild("missing".to_string()))
        );
    }

    #[test]
    fn test_checksum_lookup() {
        let mut root = Firmware::new();
        root.add_child(leaf("a", b"abc"));
        let sha = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        assert_eq!(root.get_child_by_checksum(sha).and_then(Firmware::id), Some("a"));
        assert!(root.get_child_by_checksum("nothex").is_none());
    }

    #[test]
    fn test_checksum_cache_invalidated_on_set_data() {
        let mut node = Firmware::from_bytes(&b"abc"[..]);
        let before = node.checksum(ChecksumKind::Sha256);
        node.set_data(&b"abd"[..]);
        assert_ne!(node.checksum(ChecksumKind::Sha256), before);
    }

    #[test]
    fn test_write_chunk_relative_to_base() -> FormatResult<()> {
        let fw = Firmware::from_bytes(&b"0123456789"[..]).with_address(0x1000);
        assert_eq!(fw.write_chunk(0x1004, 3)?.as_ref(), b"456");
        assert!(fw.write_chunk(0x0FFF, 1).is_err());
        assert!(fw.write_chunk(0x1008, 3).is_err());
        Ok(())
    }

    #[test]
    fn test_chunks_use_base_address() {
        let fw = Firmware::from_bytes(&b"abcdef"[..]).with_address(0x0800_0000);
        let chunks = fw.chunks(4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.get(1).map(|c| c.address()), Some(0x0800_0004));
    }
}
