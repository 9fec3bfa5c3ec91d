//! Parse and container flags.

use bitflags::bitflags;

bitflags! {
    /// Flags that relax parser checks.
    ///
    /// Bounds checks are never relaxed; these only skip cross-checks so a
    /// malformed file can still be loaded for inspection or recovery.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParseFlags: u32 {
        /// Do not fail on a stored checksum that disagrees with the data
        const IGNORE_CHECKSUM = 1 << 0;
        /// Do not reject unexpected DFU versions or vendor/product ids
        const IGNORE_VID_PID = 1 << 1;
        /// Do not fail when declared sizes disagree with consumed bytes
        const IGNORE_CONSISTENCY = 1 << 2;
    }
}

bitflags! {
    /// Behaviour flags for a container node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FirmwareFlags: u32 {
        /// Adding a child replaces an existing sibling with the same id
        const DEDUPE_ID = 1 << 0;
        /// Adding a child replaces an existing sibling with the same idx
        const DEDUPE_IDX = 1 << 1;
    }
}
