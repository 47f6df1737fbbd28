use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest compressed block address a virtual offset can carry.
pub const MAX_BLOCK_ADDRESS: u64 = (1 << 48) - 1;

/// A position in a container stream: the compressed address of a block in
/// the upper 48 bits and an offset into its uncompressed payload in the
/// lower 16 bits.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    pub const fn new(block_address: u64, within_block: u16) -> Self {
        Self(((block_address & MAX_BLOCK_ADDRESS) << 16) | within_block as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Offset of the block's first byte in the compressed stream.
    pub const fn block_address(self) -> u64 {
        self.0 >> 16
    }

    /// Offset into the block's uncompressed payload.
    pub const fn within_block(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl From<u64> for VirtualOffset {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<VirtualOffset> for u64 {
    fn from(offset: VirtualOffset) -> Self {
        offset.0
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_address(), self.within_block())
    }
}
