use bitvec::prelude::*;
use zerocopy::{FromBytes, IntoBytes, little_endian::U64};

use crate::block::{
    BlockAddr,
    allocator::{Allocator, Error, Result},
};

/// A bitmap-backed `Allocator`.
/// Bit `i` is set when block `i` is in use; the reserved prefix is always set.
#[derive(Clone)]
pub struct BitmapAllocator {
    bits: BitBox<u64>,
    reserved: usize,
    available: usize,
}

impl BitmapAllocator {
    /// Constructs a bitmap for `block_count` blocks, the first `reserved` of them in use.
    pub fn new(block_count: u32, reserved: u32) -> Self {
        let count = block_count as usize;
        let reserved = (reserved as usize).min(count);
        let mut bits = bitbox![u64, Lsb0; 0; count];
        bits[..reserved].fill(true);
        BitmapAllocator {
            bits,
            reserved,
            available: count - reserved,
        }
    }

    /// Number of bytes the serialized bitmap occupies.
    pub fn byte_len(block_count: u32) -> usize {
        (block_count as usize).div_ceil(u64::BITS as usize) * size_of::<u64>()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice().as_bytes()
    }

    /// Reconstructs a bitmap from its serialized form.
    /// Returns `None` if `bytes` is too short or a reserved block is marked free.
    pub(crate) fn from_bytes(block_count: u32, reserved: u32, bytes: &[u8]) -> Option<Self> {
        let count = block_count as usize;
        let reserved = reserved as usize;
        let slice = <[U64]>::ref_from_bytes(bytes).ok()?;
        let mut bits = BitVec::<u64, Lsb0>::from_vec(slice.iter().map(|v| v.get()).collect());
        if bits.len() < count || reserved > count {
            return None;
        }
        bits.truncate(count);
        if bits[..reserved].not_all() {
            return None;
        }

        let available = bits.count_zeros();
        Some(Self {
            bits: bits.into_boxed_bitslice(),
            reserved,
            available,
        })
    }

    /// Checks whether the block at `addr` is in use.
    pub fn is_allocated(&self, addr: BlockAddr) -> bool {
        self.bits.get(addr as usize).is_some_and(|bit| *bit)
    }
}

impl Allocator for BitmapAllocator {
    fn allocate(&mut self) -> Result<BlockAddr> {
        let addr = self.bits.first_zero().ok_or(Error::NoSpace)?;
        self.bits.set(addr, true);
        self.available -= 1;
        Ok(addr as BlockAddr)
    }

    fn deallocate(&mut self, addr: BlockAddr) -> Result<()> {
        let addr = addr as usize;
        if addr >= self.bits.len() {
            return Err(Error::AddrOutOfBounds);
        }
        if addr < self.reserved {
            return Err(Error::Reserved);
        }
        if !self.bits[addr] {
            return Err(Error::NotAllocated);
        }

        self.bits.set(addr, false);
        self.available += 1;
        Ok(())
    }

    fn available(&self) -> u32 {
        self.available as u32
    }
}

#[cfg(test)]
mod tests {
    use crate::{block::allocator::tests::TestableAllocator, test_allocator};

    use super::*;

    impl TestableAllocator for BitmapAllocator {
        fn new_for_test(block_count: u32, reserved: u32) -> Self {
            Self::new(block_count, reserved)
        }
    }

    test_allocator!(BitmapAllocator);

    #[test]
    fn test_serde() {
        let mut original = BitmapAllocator::new(16, 4);
        let addr_1 = original.allocate().unwrap();
        let addr_2 = original.allocate().unwrap();

        let mut restored = BitmapAllocator::from_bytes(16, 4, original.as_bytes()).unwrap();
        assert_eq!(restored.available(), original.available());

        restored.deallocate(addr_1).unwrap();
        restored.deallocate(addr_2).unwrap();
        assert_eq!(restored.available(), 12);
    }

    #[test]
    fn test_serde_layout() {
        let mut allocator = BitmapAllocator::new(64, 3);
        assert_eq!(allocator.as_bytes()[0], 0b0000_0111);

        allocator.allocate().unwrap();
        let bytes = allocator.as_bytes();
        assert_eq!(bytes.len(), BitmapAllocator::byte_len(64));
        assert_eq!(bytes[0], 0b0000_1111);
        assert!(bytes[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_bytes_too_short() {
        assert!(BitmapAllocator::from_bytes(128, 0, &[0u8; 8]).is_none());
        assert!(BitmapAllocator::from_bytes(8, 0, &[0u8; 3]).is_none());
    }

    #[test]
    fn test_from_bytes_reserved_free() {
        let mut bytes = [0u8; 8];
        bytes[0] = 0b0000_0101;
        assert!(BitmapAllocator::from_bytes(64, 3, &bytes).is_none());

        bytes[0] = 0b0000_0111;
        let allocator = BitmapAllocator::from_bytes(64, 3, &bytes).unwrap();
        assert_eq!(allocator.available(), 61);
    }

    #[test]
    fn test_is_allocated() {
        let mut allocator = BitmapAllocator::new(8, 1);
        assert!(allocator.is_allocated(0));

        let addr = allocator.allocate().unwrap();
        assert!(allocator.is_allocated(addr));
        assert!(!allocator.is_allocated(addr + 1));
        assert!(!allocator.is_allocated(100));
    }
}
