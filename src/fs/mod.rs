use std::path::Path;

use log::{info, warn};

use crate::{
    block::{
        Block,
        storage::{Storage, disk::Disk},
    },
    fs::{
        descriptor::{Descriptor, DescriptorId},
        dir::{DirEntry, DirEntryName, Directory},
        layout::{DESCRIPTOR_COUNT, DIR_ENTRY_SIZE},
        oft::{Handle, OpenFileTable},
        table::DescriptorTable,
    },
};

pub use error::{Error, Result};

pub mod descriptor;
pub mod dir;
pub mod error;
pub mod file;
pub mod layout;
pub mod oft;
pub mod table;


/// A directory listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub descriptor: DescriptorId,
    pub length: u32,
}

/// An in-memory view of the filesystem.
/// The only owner of the storage, the descriptor table and the open file table.
pub struct Filesystem<S: Storage> {
    storage: S,
    table: DescriptorTable,
    oft: OpenFileTable,
}

impl<S: Storage> Filesystem<S> {
    /// Creates an empty filesystem on a storage device.
    pub fn format(mut storage: S) -> Result<Self> {
        let mut table = DescriptorTable::new();
        Directory::create(&mut storage, &mut table)?;
        table.sync(&mut storage)?;

        let mut fs = Self {
            storage,
            table,
            oft: OpenFileTable::new(),
        };
        fs.open_directory();
        Ok(fs)
    }

    /// Mounts the filesystem persisted on a storage device.
    pub fn mount(storage: S) -> Result<Self> {
        let table = DescriptorTable::load(&storage)?;
        let dir = table.get(DescriptorId::DIRECTORY)?;
        if dir.block_count() == 0 {
            return Err(Error::CorruptImage("directory has no blocks"));
        }
        let dir_length = dir.length;

        let mut fs = Self {
            storage,
            table,
            oft: OpenFileTable::new(),
        };
        fs.verify_directory(dir_length)?;
        fs.open_directory();
        Ok(fs)
    }

    /// Checks that every directory entry names a distinct file descriptor in use
    /// and that the directory length counts the entries.
    fn verify_directory(&self, dir_length: u32) -> Result<()> {
        let mut seen = [false; DESCRIPTOR_COUNT];
        let mut count = 0;
        for entry in Directory::entries(&self.storage, &self.table)? {
            let DirEntry { id, .. } = entry?;
            if id.is_directory() {
                return Err(Error::CorruptImage("directory entry names the directory"));
            }
            self.table.get(id)?;
            if std::mem::replace(&mut seen[id.get()], true) {
                return Err(Error::CorruptImage("descriptor named by two entries"));
            }
            count += 1;
        }
        if dir_length != count * DIR_ENTRY_SIZE as u32 {
            return Err(Error::CorruptImage("directory length does not match its entries"));
        }
        Ok(())
    }

    /// Claims the first open file table entry for the directory.
    /// Directory I/O goes straight to storage, so the entry's buffer is unused.
    fn open_directory(&mut self) {
        self.oft
            .add(Block::default(), DescriptorId::DIRECTORY, 0)
            .ok()
            .filter(|handle| *handle == Handle::DIRECTORY)
            .expect("directory must take the first entry of an empty open file table");
    }

    /// Returns the first block of a file, or a zeroed block if it has none.
    fn first_block(&self, id: DescriptorId) -> Result<Block> {
        match self.table.get(id)?.block(0) {
            Some(addr) => Ok(self.storage.read_block(addr)?),
            None => Ok(Block::default()),
        }
    }

    /// Creates an empty file called `name`.
    pub fn create(&mut self, name: &str) -> Result<DescriptorId> {
        let name = DirEntryName::try_from(name)?;
        if Directory::find(&self.storage, &self.table, &name)?.is_some() {
            return Err(Error::DuplicateName);
        }

        let id = self.table.allocate_descriptor()?;
        match Directory::insert(&mut self.storage, &mut self.table, name, id) {
            Ok(true) => {}
            Ok(false) => {
                warn!("directory full, releasing descriptor {id}");
                self.table.free_descriptor(id);
                return Err(Error::DirectoryFull);
            }
            Err(err) => {
                warn!("failed to insert {name}, releasing descriptor {id}");
                self.table.free_descriptor(id);
                return Err(err);
            }
        }

        self.table.set_length(id, 0)?;
        let dir_len = self.table.get(DescriptorId::DIRECTORY)?.length;
        self.table
            .set_length(DescriptorId::DIRECTORY, dir_len + DIR_ENTRY_SIZE as u32)?;

        info!("created {name} with descriptor {id}");
        Ok(id)
    }

    /// Destroys the file called `name`, closing any handles open on it.
    pub fn destroy(&mut self, name: &str) -> Result<()> {
        let name = DirEntryName::try_from(name)?;
        let location =
            Directory::find(&self.storage, &self.table, &name)?.ok_or(Error::NotFound)?;
        let id = location.id;
        if id.is_directory() {
            return Err(Error::CorruptImage("directory entry names the directory"));
        }

        for handle in self.oft.handles_of(id) {
            self.close(handle)?;
        }

        let blocks: Vec<_> = self.table.get(id)?.blocks().collect();
        for addr in blocks {
            self.table.free_block(addr)?;
        }
        self.table.free_descriptor(id);

        Directory::remove(&mut self.storage, &location)?;
        let dir_len = self.table.get(DescriptorId::DIRECTORY)?.length;
        self.table.set_length(
            DescriptorId::DIRECTORY,
            dir_len.saturating_sub(DIR_ENTRY_SIZE as u32),
        )?;

        info!("destroyed {name} with descriptor {id}");
        Ok(())
    }

    /// Opens the file called `name` positioned at its start.
    pub fn open(&mut self, name: &str) -> Result<Handle> {
        let name = DirEntryName::try_from(name)?;
        let location =
            Directory::find(&self.storage, &self.table, &name)?.ok_or(Error::NotFound)?;
        if location.id.is_directory() {
            return Err(Error::CorruptImage("directory entry names the directory"));
        }
        let buffer = self.first_block(location.id)?;
        let handle = self.oft.add(buffer, location.id, 0)?;
        info!("opened {name} as handle {handle}");
        Ok(handle)
    }

    /// Flushes the handle's buffer and releases it.
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        let mut file = *self.user_file(handle)?;
        self.flush(&mut file)?;
        self.oft.remove(handle)?;
        info!("closed handle {handle}");
        Ok(())
    }

    /// Lists the files in directory order.
    /// The listing is recomputed from storage on each call.
    pub fn list(&self) -> Result<impl Iterator<Item = Result<FileInfo>> + '_> {
        let entries = Directory::entries(&self.storage, &self.table)?;
        Ok(entries.map(|entry| {
            let DirEntry { name, id } = entry?;
            let length = self.table.get(id)?.length;
            Ok(FileInfo {
                name: name.to_string(),
                descriptor: id,
                length,
            })
        }))
    }

    /// Mirrors the descriptor table to storage.
    /// File data is already there: every write flushes its buffer before returning.
    pub fn sync(&mut self) -> Result<()> {
        self.table.sync(&mut self.storage)
    }

    /// Returns the descriptor `id`.
    pub fn descriptor(&self, id: DescriptorId) -> Result<&Descriptor> {
        self.table.get(id)
    }

    /// Returns the number of free data blocks.
    pub fn available_blocks(&self) -> u32 {
        self.table.available_blocks()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl Filesystem<Disk> {
    /// Restores a filesystem from a disk image file.
    pub fn restore(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = std::fs::read(path)?;
        let disk = Disk::from_image(&image).ok_or(Error::CorruptImage("wrong image size"))?;
        let fs = Self::mount(disk)?;
        info!("restored disk from {}", path.display());
        Ok(fs)
    }

    /// Saves the whole disk as an image file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.sync()?;
        std::fs::write(path, self.storage.as_image())?;
        info!("saved disk to {}", path.display());
        Ok(())
    }
}
