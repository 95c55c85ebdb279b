use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::I32};

use crate::{
    block::{BlockAddr, BlockAddrStored},
    fs::{
        error::{Error, Result},
        layout::{DESCRIPTOR_COUNT, MAX_BLOCKS_PER_FILE},
    },
};

/// A descriptor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorId(usize);

impl DescriptorId {
    /// The directory's descriptor.
    pub const DIRECTORY: Self = Self(0);

    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn is_directory(&self) -> bool {
        *self == Self::DIRECTORY
    }
}

impl std::fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-file metadata: length and the blocks the file owns, in file order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub length: u32,
    blocks: [Option<BlockAddr>; MAX_BLOCKS_PER_FILE],
}

impl Descriptor {
    /// Returns the address of the `slot`-th block of the file.
    pub fn block(&self, slot: usize) -> Option<BlockAddr> {
        self.blocks.get(slot).copied().flatten()
    }

    /// Returns the number of blocks the file owns.
    pub fn block_count(&self) -> usize {
        self.blocks.iter().take_while(|b| b.is_some()).count()
    }

    /// Returns the addresses of the blocks the file owns.
    pub fn blocks(&self) -> impl Iterator<Item = BlockAddr> + '_ {
        self.blocks.iter().map_while(|b| *b)
    }

    /// Appends a block to the block map.
    pub fn push_block(&mut self, addr: BlockAddr) -> Result<()> {
        let slot = self.block_count();
        let entry = self.blocks.get_mut(slot).ok_or(Error::CapacityExceeded)?;
        *entry = Some(addr);
        Ok(())
    }
}

/// Stored form of a descriptor slot.
/// A free slot has a length of `-1`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct DescriptorStored {
    length: I32,
    blocks: [BlockAddrStored; MAX_BLOCKS_PER_FILE],
}

impl DescriptorStored {
    const FREE: Self = Self {
        length: I32::new(-1),
        blocks: [BlockAddrStored::UNUSED; MAX_BLOCKS_PER_FILE],
    };
}

impl From<&Option<Descriptor>> for DescriptorStored {
    fn from(slot: &Option<Descriptor>) -> Self {
        match slot {
            Some(desc) => Self {
                length: I32::new(desc.length as i32),
                blocks: desc.blocks.map(BlockAddrStored::from),
            },
            None => Self::FREE,
        }
    }
}

impl TryFrom<&DescriptorStored> for Option<Descriptor> {
    type Error = Error;

    fn try_from(stored: &DescriptorStored) -> Result<Self> {
        let length = stored.length.get();
        if length == -1 {
            return Ok(None);
        }
        let length = u32::try_from(length).map_err(|_| Error::CorruptImage("negative length"))?;

        let blocks = stored.blocks.map(Option::<BlockAddr>::from);
        let desc = Descriptor { length, blocks };

        // Block maps are dense and must cover the file's length.
        if desc.blocks().count() != blocks.iter().flatten().count() {
            return Err(Error::CorruptImage("sparse block map"));
        }
        if length as usize > desc.block_count() * crate::block::BLOCK_SIZE {
            return Err(Error::CorruptImage("length exceeds block map"));
        }
        Ok(Some(desc))
    }
}

/// Checks that `id` names a descriptor slot.
pub fn check_id(id: DescriptorId) -> Result<()> {
    if id.get() < DESCRIPTOR_COUNT {
        Ok(())
    } else {
        Err(Error::CorruptImage("descriptor index out of range"))
    }
}
