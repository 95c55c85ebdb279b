use log::debug;
use zerocopy::{FromBytes, IntoBytes};

use crate::{
    block::{
        Allocator, BitmapAllocator, Block, BlockAddr, NUM_BLOCKS, allocator, storage::Storage,
    },
    fs::{
        descriptor::{Descriptor, DescriptorId, DescriptorStored, check_id},
        error::{Error, Result},
        layout::{
            BITMAP_ADDR, DESCRIPTOR_COUNT, DESCRIPTOR_TABLE_BLOCKS, DESCRIPTOR_TABLE_START,
            DESCRIPTORS_PER_BLOCK, RESERVED_BLOCKS,
        },
    },
};

/// Memory-resident descriptors and free-block bitmap.
/// Mirrored to the reserved blocks by `sync` and restored by `load`.
pub struct DescriptorTable {
    descriptors: Box<[Option<Descriptor>]>,
    allocator: BitmapAllocator,
}

impl DescriptorTable {
    /// Constructs an empty table with only the reserved blocks allocated.
    pub fn new() -> Self {
        Self {
            descriptors: vec![None; DESCRIPTOR_COUNT].into_boxed_slice(),
            allocator: BitmapAllocator::new(NUM_BLOCKS, RESERVED_BLOCKS),
        }
    }

    /// Reads the table back from the reserved blocks.
    pub fn load(storage: &impl Storage) -> Result<Self> {
        let bitmap = storage.read_block(BITMAP_ADDR)?;
        let bitmap_len = BitmapAllocator::byte_len(NUM_BLOCKS);
        let allocator =
            BitmapAllocator::from_bytes(NUM_BLOCKS, RESERVED_BLOCKS, &bitmap.data[..bitmap_len])
                .ok_or(Error::CorruptImage("malformed bitmap"))?;

        let mut descriptors = Vec::with_capacity(DESCRIPTOR_COUNT);
        for i in 0..DESCRIPTOR_TABLE_BLOCKS {
            let block = storage.read_block(DESCRIPTOR_TABLE_START + i)?;
            let stored = <[DescriptorStored]>::ref_from_bytes(&block.data)
                .expect("'block.data' must be a valid '[DescriptorStored]'");
            for slot in stored {
                descriptors.push(Option::<Descriptor>::try_from(slot)?);
            }
        }

        let table = Self {
            descriptors: descriptors.into_boxed_slice(),
            allocator,
        };
        table.verify()?;
        Ok(table)
    }

    /// Checks that every block a descriptor references is an allocated data block
    /// owned by no other descriptor.
    fn verify(&self) -> Result<()> {
        let mut seen = [false; NUM_BLOCKS as usize];
        for addr in self.descriptors.iter().flatten().flat_map(|d| d.blocks()) {
            if addr < RESERVED_BLOCKS || addr >= NUM_BLOCKS {
                return Err(Error::CorruptImage("block outside of data region"));
            }
            if !self.allocator.is_allocated(addr) {
                return Err(Error::CorruptImage("referenced block marked free"));
            }
            if std::mem::replace(&mut seen[addr as usize], true) {
                return Err(Error::CorruptImage("block shared by two descriptors"));
            }
        }
        Ok(())
    }

    /// Writes the table into the reserved blocks.
    pub fn sync(&self, storage: &mut impl Storage) -> Result<()> {
        let bitmap = Block::new(self.allocator.as_bytes());
        storage.write_at(&bitmap, BITMAP_ADDR)?;

        for (i, chunk) in self.descriptors.chunks(DESCRIPTORS_PER_BLOCK).enumerate() {
            let stored: Vec<DescriptorStored> = chunk.iter().map(DescriptorStored::from).collect();
            let block = Block::new(stored.as_bytes());
            storage.write_at(&block, DESCRIPTOR_TABLE_START + i as BlockAddr)?;
        }
        Ok(())
    }

    /// Allocates the first free descriptor slot.
    pub fn allocate_descriptor(&mut self) -> Result<DescriptorId> {
        let (index, slot) = self
            .descriptors
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(Error::DescriptorsExhausted)?;
        *slot = Some(Descriptor::default());
        debug!("allocated descriptor {index}");
        Ok(DescriptorId::new(index))
    }

    /// Frees a descriptor slot. Freeing a free slot does nothing.
    /// The caller must have released the descriptor's blocks.
    pub fn free_descriptor(&mut self, id: DescriptorId) {
        if let Some(slot) = self.descriptors.get_mut(id.get()) {
            if slot.take().is_some() {
                debug!("freed descriptor {id}");
            }
        }
    }

    /// Allocates the first free data block.
    pub fn allocate_block(&mut self) -> Result<BlockAddr> {
        let addr = self.allocator.allocate()?;
        debug!("allocated block {addr}");
        Ok(addr)
    }

    /// Frees a data block.
    /// The caller must ensure no descriptor still references it.
    pub fn free_block(&mut self, addr: BlockAddr) -> Result<()> {
        self.allocator.deallocate(addr).map_err(|err| match err {
            allocator::Error::Reserved | allocator::Error::AddrOutOfBounds => Error::OutOfRange(addr),
            err => err.into(),
        })?;
        debug!("freed block {addr}");
        Ok(())
    }

    /// Returns the descriptor `id`.
    pub fn get(&self, id: DescriptorId) -> Result<&Descriptor> {
        check_id(id)?;
        self.descriptors[id.get()]
            .as_ref()
            .ok_or(Error::CorruptImage("descriptor is not in use"))
    }

    fn get_mut(&mut self, id: DescriptorId) -> Result<&mut Descriptor> {
        check_id(id)?;
        self.descriptors[id.get()]
            .as_mut()
            .ok_or(Error::CorruptImage("descriptor is not in use"))
    }

    pub fn set_length(&mut self, id: DescriptorId, length: u32) -> Result<()> {
        self.get_mut(id)?.length = length;
        Ok(())
    }

    /// Appends `addr` to the block map of `id`.
    pub fn append_block(&mut self, id: DescriptorId, addr: BlockAddr) -> Result<()> {
        self.get_mut(id)?.push_block(addr)
    }

    /// Returns the number of free data blocks.
    pub fn available_blocks(&self) -> u32 {
        self.allocator.available()
    }

    /// Returns the number of free descriptor slots.
    pub fn available_descriptors(&self) -> usize {
        self.descriptors.iter().filter(|slot| slot.is_none()).count()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}
