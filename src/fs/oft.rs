use crate::{
    block::Block,
    fs::{
        descriptor::DescriptorId,
        error::{Error, Result},
        layout::OFT_CAPACITY,
    },
};

/// An index into the open file table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(usize);

impl Handle {
    /// The directory's handle, held for the lifetime of the filesystem.
    pub const DIRECTORY: Self = Self(0);

    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cursor state of an open file.
#[derive(Debug, Clone, Copy)]
pub struct OpenFile {
    pub descriptor: DescriptorId,
    /// Byte offset into the file, within `[0, length]`.
    pub position: u32,
    /// Index into the descriptor's block map of the block `buffer` mirrors.
    /// The block may not be allocated yet, in which case `buffer` is scratch.
    pub slot: usize,
    pub buffer: Block,
    /// Whether `buffer` holds bytes not yet written to its block.
    pub dirty: bool,
}

/// Bounded table of open files.
pub struct OpenFileTable {
    entries: [Option<OpenFile>; OFT_CAPACITY],
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self {
            entries: [None; OFT_CAPACITY],
        }
    }

    /// Opens an entry in the first free slot.
    pub fn add(&mut self, buffer: Block, descriptor: DescriptorId, position: u32) -> Result<Handle> {
        let (index, entry) = self
            .entries
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.is_none())
            .ok_or(Error::TooManyOpenFiles)?;
        *entry = Some(OpenFile {
            descriptor,
            position,
            slot: position as usize / crate::block::BLOCK_SIZE,
            buffer,
            dirty: false,
        });
        Ok(Handle(index))
    }

    pub fn get(&self, handle: Handle) -> Result<&OpenFile> {
        self.entries
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidHandle)
    }

    /// Replaces the state of an open entry.
    pub fn update(&mut self, handle: Handle, file: OpenFile) -> Result<()> {
        let entry = self
            .entries
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidHandle)?;
        *entry = file;
        Ok(())
    }

    /// Releases the slot, returning its last state.
    /// The caller is responsible for flushing the buffer first.
    pub fn remove(&mut self, handle: Handle) -> Result<OpenFile> {
        self.entries
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(Error::InvalidHandle)
    }

    /// Returns every open entry.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &OpenFile)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_ref().map(|file| (Handle(i), file)))
    }

    /// Returns the handles open on `descriptor`.
    pub fn handles_of(&self, descriptor: DescriptorId) -> Vec<Handle> {
        self.iter()
            .filter(|(_, file)| file.descriptor == descriptor)
            .map(|(handle, _)| handle)
            .collect()
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}
