use log::debug;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::I32};

use crate::{
    block::{BLOCK_SIZE, Block, BlockAddr, storage::Storage},
    fs::{
        descriptor::{Descriptor, DescriptorId},
        error::{Error, Result},
        layout::{DIR_ENTRY_SIZE, MAX_BLOCKS_PER_FILE},
        table::DescriptorTable,
    },
};

/// How long a file name can be.
pub const NAME_MAX_LEN: usize = 3;

/// Stored name field width.
const NAME_FIELD_LEN: usize = 4;

/// Represents the name of a file.
/// Guaranteed to be 1 to `NAME_MAX_LEN` bytes with no NUL bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntryName([u8; NAME_FIELD_LEN]);

impl DirEntryName {
    /// Returns the name bytes without padding.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(NAME_MAX_LEN);
        &self.0[..len]
    }
}

impl<'a> TryFrom<&'a str> for DirEntryName {
    type Error = Error;

    fn try_from(name: &'a str) -> Result<Self> {
        if name.is_empty() || name.len() > NAME_MAX_LEN {
            return Err(Error::InvalidName);
        }

        if name.contains('\0') {
            return Err(Error::InvalidName);
        }

        let mut field = [0u8; NAME_FIELD_LEN];
        field[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self(field))
    }
}

impl std::fmt::Display for DirEntryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Stored form of a directory entry.
/// A free slot has `-1` in its first four bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct DirEntryStored {
    name: [u8; NAME_FIELD_LEN],
    id: I32,
}

impl DirEntryStored {
    const FREE: [u8; NAME_FIELD_LEN] = (-1i32).to_le_bytes();

    fn new(name: DirEntryName, id: DescriptorId) -> Self {
        Self {
            name: name.0,
            id: I32::new(id.get() as i32),
        }
    }

    pub fn is_free(&self) -> bool {
        self.name == Self::FREE
    }

    fn free(&mut self) {
        self.name = Self::FREE;
    }

    fn matches(&self, name: &DirEntryName) -> bool {
        !self.is_free() && self.name == name.0
    }

    fn entry(&self) -> Option<DirEntry> {
        if self.is_free() {
            return None;
        }
        let id = usize::try_from(self.id.get()).ok()?;
        Some(DirEntry {
            name: DirEntryName(self.name),
            id: DescriptorId::new(id),
        })
    }
}

/// Returns a directory block with every slot free.
pub fn empty_block() -> Block {
    Block::filled(0xFF)
}

/// A live directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: DirEntryName,
    pub id: DescriptorId,
}

/// Location of a live directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    pub addr: BlockAddr,
    pub offset: usize,
    pub id: DescriptorId,
}

/// A slot of a directory block.
struct Slot {
    addr: BlockAddr,
    offset: usize,
    stored: DirEntryStored,
}

/// Walks every slot of the directory in block-map order.
/// Each block is read from storage when the walk reaches it.
struct Slots<'a, S> {
    storage: &'a S,
    dir: Descriptor,
    slot: usize,
    offset: usize,
    block: Option<(BlockAddr, Block)>,
}

impl<'a, S: Storage> Slots<'a, S> {
    fn new(storage: &'a S, table: &DescriptorTable) -> Result<Self> {
        Ok(Self {
            storage,
            dir: table.get(DescriptorId::DIRECTORY)?.clone(),
            slot: 0,
            offset: 0,
            block: None,
        })
    }
}

impl<S: Storage> Iterator for Slots<'_, S> {
    type Item = Result<Slot>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset == BLOCK_SIZE {
            self.slot += 1;
            self.offset = 0;
            self.block = None;
        }

        let (addr, block) = match self.block {
            Some(loaded) => loaded,
            None => {
                let addr = self.dir.block(self.slot)?;
                match self.storage.read_block(addr) {
                    Ok(block) => {
                        self.block = Some((addr, block));
                        (addr, block)
                    }
                    Err(err) => {
                        self.slot = MAX_BLOCKS_PER_FILE;
                        return Some(Err(err.into()));
                    }
                }
            }
        };

        let offset = self.offset;
        self.offset += DIR_ENTRY_SIZE;
        let stored = DirEntryStored::read_from_bytes(&block.data[offset..offset + DIR_ENTRY_SIZE])
            .expect("slot must be a valid 'DirEntryStored'");
        Some(Ok(Slot {
            addr,
            offset,
            stored,
        }))
    }
}

/// Lazily yields the live entries of the directory.
pub struct Entries<'a, S> {
    slots: Slots<'a, S>,
}

impl<S: Storage> Iterator for Entries<'_, S> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.slots.next()? {
                Ok(slot) => {
                    if let Some(entry) = slot.stored.entry() {
                        return Some(Ok(entry));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Name to descriptor mapping stored in the blocks of descriptor 0.
pub struct Directory;

impl Directory {
    /// Formats the directory: claims descriptor 0 with one empty block.
    pub fn create(storage: &mut impl Storage, table: &mut DescriptorTable) -> Result<()> {
        table
            .allocate_descriptor()
            .ok()
            .filter(DescriptorId::is_directory)
            .expect("a fresh table must hand out descriptor 0 first");
        Self::grow(storage, table)?;
        Ok(())
    }

    /// Appends an empty block to the directory.
    fn grow(storage: &mut impl Storage, table: &mut DescriptorTable) -> Result<BlockAddr> {
        let addr = table.allocate_block()?;
        if let Err(err) = table.append_block(DescriptorId::DIRECTORY, addr) {
            table.free_block(addr)?;
            return Err(err);
        }
        storage.write_at(&empty_block(), addr)?;
        debug!("directory grew by block {addr}");
        Ok(addr)
    }

    /// Finds the entry called `name`.
    pub fn find(
        storage: &impl Storage,
        table: &DescriptorTable,
        name: &DirEntryName,
    ) -> Result<Option<EntryLocation>> {
        for slot in Slots::new(storage, table)? {
            let slot = slot?;
            if slot.stored.matches(name) {
                let entry = slot
                    .stored
                    .entry()
                    .ok_or(Error::CorruptImage("negative descriptor index"))?;
                return Ok(Some(EntryLocation {
                    addr: slot.addr,
                    offset: slot.offset,
                    id: entry.id,
                }));
            }
        }
        Ok(None)
    }

    /// Stores an entry in the first free slot, growing the directory if needed.
    /// Returns `false` if the directory is full.
    pub fn insert(
        storage: &mut impl Storage,
        table: &mut DescriptorTable,
        name: DirEntryName,
        id: DescriptorId,
    ) -> Result<bool> {
        let free = Slots::new(storage, table)?
            .find(|slot| slot.as_ref().map_or(true, |slot| slot.stored.is_free()))
            .transpose()?
            .map(|slot| (slot.addr, slot.offset));

        let (addr, offset) = match free {
            Some(free) => free,
            None => {
                if table.get(DescriptorId::DIRECTORY)?.block_count() == MAX_BLOCKS_PER_FILE {
                    return Ok(false);
                }
                (Self::grow(storage, table)?, 0)
            }
        };

        let mut block = storage.read_block(addr)?;
        let stored = DirEntryStored::new(name, id);
        block.data[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(stored.as_bytes());
        storage.write_at(&block, addr)?;
        Ok(true)
    }

    /// Marks the entry at `location` free. The directory is never compacted.
    pub fn remove(storage: &mut impl Storage, location: &EntryLocation) -> Result<()> {
        let mut block = storage.read_block(location.addr)?;
        let slot = &mut block.data[location.offset..location.offset + DIR_ENTRY_SIZE];
        let stored = DirEntryStored::mut_from_bytes(slot)
            .expect("slot must be a valid 'DirEntryStored'");
        stored.free();
        storage.write_at(&block, location.addr)?;
        Ok(())
    }

    /// Returns the live entries in directory order.
    pub fn entries<'a, S: Storage>(
        storage: &'a S,
        table: &DescriptorTable,
    ) -> Result<Entries<'a, S>> {
        Ok(Entries {
            slots: Slots::new(storage, table)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        block::storage::disk::Disk,
        fs::layout::{ENTRIES_PER_BLOCK, MAX_DIR_ENTRIES},
    };

    fn name(s: &str) -> DirEntryName {
        DirEntryName::try_from(s).unwrap()
    }

    fn formatted() -> (Disk, DescriptorTable) {
        let mut disk = Disk::new();
        let mut table = DescriptorTable::new();
        Directory::create(&mut disk, &mut table).unwrap();
        (disk, table)
    }

    #[test]
    fn name_validation() {
        assert!(DirEntryName::try_from("a").is_ok());
        assert!(DirEntryName::try_from("abc").is_ok());
        assert!(matches!(DirEntryName::try_from(""), Err(Error::InvalidName)));
        assert!(matches!(
            DirEntryName::try_from("abcd"),
            Err(Error::InvalidName)
        ));
        assert!(matches!(
            DirEntryName::try_from("toolong"),
            Err(Error::InvalidName)
        ));
        assert!(matches!(
            DirEntryName::try_from("a\0"),
            Err(Error::InvalidName)
        ));
    }

    #[test]
    fn name_display() {
        assert_eq!(name("ab").to_string(), "ab");
        assert_eq!(name("xyz").as_bytes(), b"xyz");
    }

    #[test]
    fn entry_encoding() {
        let stored = DirEntryStored::new(name("ab"), DescriptorId::new(5));
        assert_eq!(stored.as_bytes(), &[b'a', b'b', 0, 0, 5, 0, 0, 0]);
        assert!(!stored.is_free());

        let stored = DirEntryStored::read_from_bytes(&empty_block().data[..8]).unwrap();
        assert!(stored.is_free());
        assert_eq!(stored.entry(), None);
    }

    #[test]
    fn insert_and_find() {
        let (mut disk, mut table) = formatted();
        let id = DescriptorId::new(1);

        assert_eq!(Directory::find(&disk, &table, &name("foo")).unwrap(), None);
        assert!(Directory::insert(&mut disk, &mut table, name("foo"), id).unwrap());

        let location = Directory::find(&disk, &table, &name("foo"))
            .unwrap()
            .unwrap();
        let dir_block = table.get(DescriptorId::DIRECTORY).unwrap().block(0).unwrap();
        assert_eq!(
            location,
            EntryLocation {
                addr: dir_block,
                offset: 0,
                id
            }
        );
        assert_eq!(Directory::find(&disk, &table, &name("fo")).unwrap(), None);
    }

    #[test]
    fn insert_reuses_freed_slot() {
        let (mut disk, mut table) = formatted();
        for (i, n) in ["a", "b", "c"].into_iter().enumerate() {
            Directory::insert(&mut disk, &mut table, name(n), DescriptorId::new(i + 1)).unwrap();
        }

        let b = Directory::find(&disk, &table, &name("b")).unwrap().unwrap();
        Directory::remove(&mut disk, &b).unwrap();
        assert_eq!(Directory::find(&disk, &table, &name("b")).unwrap(), None);

        Directory::insert(&mut disk, &mut table, name("d"), DescriptorId::new(7)).unwrap();
        let d = Directory::find(&disk, &table, &name("d")).unwrap().unwrap();
        assert_eq!((d.addr, d.offset), (b.addr, b.offset));
    }

    #[test]
    fn insert_grows_until_full() {
        let (mut disk, mut table) = formatted();

        for i in 0..MAX_DIR_ENTRIES {
            let n = format!("{i}");
            assert!(
                Directory::insert(&mut disk, &mut table, name(&n), DescriptorId::new(i + 1))
                    .unwrap()
            );
            let blocks = table.get(DescriptorId::DIRECTORY).unwrap().block_count();
            assert_eq!(blocks, i / ENTRIES_PER_BLOCK + 1);
        }

        let available = table.available_blocks();
        assert!(!Directory::insert(&mut disk, &mut table, name("x"), DescriptorId::new(1)).unwrap());
        assert_eq!(table.available_blocks(), available);
    }

    #[test]
    fn entries_in_order() {
        let (mut disk, mut table) = formatted();
        for (i, n) in ["a", "b", "c"].into_iter().enumerate() {
            Directory::insert(&mut disk, &mut table, name(n), DescriptorId::new(i + 1)).unwrap();
        }
        let b = Directory::find(&disk, &table, &name("b")).unwrap().unwrap();
        Directory::remove(&mut disk, &b).unwrap();

        let entries: Vec<_> = Directory::entries(&disk, &table)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: name("a"),
                    id: DescriptorId::new(1)
                },
                DirEntry {
                    name: name("c"),
                    id: DescriptorId::new(3)
                },
            ]
        );
    }

    #[test]
    fn entries_empty() {
        let (disk, table) = formatted();
        assert_eq!(Directory::entries(&disk, &table).unwrap().count(), 0);
    }
}
