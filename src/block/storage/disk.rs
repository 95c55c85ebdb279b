use zerocopy::IntoBytes;

use crate::block::{
    BLOCK_SIZE, Block, BlockAddr, NUM_BLOCKS,
    storage::{Error, Result, Storage},
};

/// Size of a disk image in bytes.
pub const IMAGE_SIZE: usize = NUM_BLOCKS as usize * BLOCK_SIZE;

/// An in-memory model of a blocked storage device.
#[derive(Clone)]
pub struct Disk {
    blocks: Box<[Block]>,
}

impl Disk {
    /// Constructs a zero-initialized `Disk` of `NUM_BLOCKS` blocks.
    pub fn new() -> Self {
        let blocks = vec![Block::default(); NUM_BLOCKS as usize].into_boxed_slice();
        Self { blocks }
    }

    /// Constructs a `Disk` from a flat image.
    /// Returns `None` if `image` is not exactly `IMAGE_SIZE` bytes long.
    pub fn from_image(image: &[u8]) -> Option<Self> {
        if image.len() != IMAGE_SIZE {
            return None;
        }
        let blocks = Block::slice_from_bytes(image).to_vec().into_boxed_slice();
        Some(Self { blocks })
    }

    /// Returns the disk contents as a flat image.
    pub fn as_image(&self) -> &[u8] {
        self.blocks.as_bytes()
    }
}

impl Default for Disk {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for Disk {
    fn read_at(&self, block: &mut Block, addr: BlockAddr) -> Result<()> {
        let src = self
            .blocks
            .get(addr as usize)
            .ok_or(Error::OutOfRange(addr))?;
        *block = *src;
        Ok(())
    }

    fn write_at(&mut self, block: &Block, addr: BlockAddr) -> Result<()> {
        let dst = self
            .blocks
            .get_mut(addr as usize)
            .ok_or(Error::OutOfRange(addr))?;
        *dst = *block;
        Ok(())
    }

    fn capacity(&self) -> u32 {
        self.blocks.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{block::storage::tests::TestableStorage, test_storage};

    impl TestableStorage for Disk {
        fn new_for_test() -> Self {
            Self::new()
        }
    }

    test_storage!(Disk);

    #[test]
    fn image_round_trip() {
        let mut disk = Disk::new();
        disk.write_at(&Block::filled(0x11), 0).unwrap();
        disk.write_at(&Block::filled(0x22), NUM_BLOCKS - 1).unwrap();

        let image = disk.as_image().to_vec();
        assert_eq!(image.len(), IMAGE_SIZE);
        assert_eq!(image[0], 0x11);
        assert_eq!(image[IMAGE_SIZE - 1], 0x22);

        let restored = Disk::from_image(&image).unwrap();
        assert_eq!(restored.read_block(0).unwrap(), Block::filled(0x11));
        assert_eq!(
            restored.read_block(NUM_BLOCKS - 1).unwrap(),
            Block::filled(0x22)
        );
    }

    #[test]
    fn image_wrong_size() {
        assert!(Disk::from_image(&[0u8; IMAGE_SIZE - 1]).is_none());
        assert!(Disk::from_image(&[0u8; IMAGE_SIZE + BLOCK_SIZE]).is_none());
        assert!(Disk::from_image(&[]).is_none());
    }
}
