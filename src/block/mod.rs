pub mod allocator;

pub use allocator::Allocator;
pub use allocator::bitmap::BitmapAllocator;

pub mod storage;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::I32};

/// An address of a block.
pub type BlockAddr = u32;

/// Block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Number of blocks on a disk.
pub const NUM_BLOCKS: u32 = 64;

/// A stored, possibly unused, address of a block.
/// The unused state is encoded as `-1`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct BlockAddrStored(I32);

impl BlockAddrStored {
    pub const UNUSED: Self = Self(I32::new(-1));

    pub fn is_unused(&self) -> bool {
        *self == Self::UNUSED
    }
}

impl From<Option<BlockAddr>> for BlockAddrStored {
    fn from(addr: Option<BlockAddr>) -> Self {
        match addr {
            Some(addr) => Self(I32::new(addr as i32)),
            None => Self::UNUSED,
        }
    }
}

impl From<BlockAddrStored> for Option<BlockAddr> {
    fn from(addr: BlockAddrStored) -> Self {
        u32::try_from(addr.0.get()).ok()
    }
}

/// Fixed-sized byte sequence.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct Block {
    pub data: [u8; BLOCK_SIZE],
}

impl Block {
    /// Constructs a `Block` with given data.
    /// Length of `data` must be smaller or equal to `BLOCK_SIZE`.
    ///
    /// # Panics
    /// Panics if:
    /// - `data` is larger than `BLOCK_SIZE`
    pub fn new(data: &[u8]) -> Self {
        let mut block = Self::default();
        block.data[..data.len()].copy_from_slice(data);
        block
    }

    /// Constructs a `Block` with every byte set to `byte`.
    pub fn filled(byte: u8) -> Self {
        Self {
            data: [byte; BLOCK_SIZE],
        }
    }

    /// Casts a byte slice into a `Block` slice without copying.
    ///
    /// # Panics
    /// Panics if `bytes.len()` is not a multiple of `BLOCK_SIZE`.
    pub fn slice_from_bytes(bytes: &[u8]) -> &[Self] {
        <[Self]>::ref_from_bytes(bytes).unwrap()
    }
}

impl Default for Block {
    fn default() -> Self {
        Self {
            data: [0u8; BLOCK_SIZE],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_addr_sentinel() {
        let stored = BlockAddrStored::from(None);
        assert!(stored.is_unused());
        assert_eq!(stored.as_bytes(), &[0xFF; 4]);
        assert_eq!(Option::<BlockAddr>::from(stored), None);
    }

    #[test]
    fn stored_addr_little_endian() {
        let stored = BlockAddrStored::from(Some(9));
        assert!(!stored.is_unused());
        assert_eq!(stored.as_bytes(), &[9, 0, 0, 0]);
        assert_eq!(Option::<BlockAddr>::from(stored), Some(9));
    }

    #[test]
    fn slice_from_bytes() {
        let mut bytes = vec![0u8; BLOCK_SIZE * 2];
        bytes[BLOCK_SIZE] = 0xAB;
        let blocks = Block::slice_from_bytes(&bytes);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].data[0], 0xAB);
    }
}
