use log::{debug, warn};

use crate::{
    block::{BLOCK_SIZE, Block, storage::Storage},
    fs::{
        Filesystem,
        error::{Error, Result},
        layout::MAX_FILE_SIZE,
        oft::{Handle, OpenFile},
    },
};

impl<S: Storage> Filesystem<S> {
    /// Returns the open file behind a user handle.
    pub(super) fn user_file(&self, handle: Handle) -> Result<&OpenFile> {
        if handle == Handle::DIRECTORY {
            return Err(Error::InvalidHandle);
        }
        self.oft.get(handle)
    }

    /// Writes a modified buffer back to the block it mirrors.
    /// A clean buffer may be stale and is never written.
    pub(super) fn flush(&mut self, file: &mut OpenFile) -> Result<()> {
        if !file.dirty {
            return Ok(());
        }
        if let Some(addr) = self.table.get(file.descriptor)?.block(file.slot) {
            self.storage.write_at(&file.buffer, addr)?;
            file.dirty = false;
        }
        Ok(())
    }

    /// Points the buffer at the `slot`-th block of the file.
    /// The target block must exist.
    fn move_to(&mut self, file: &mut OpenFile, slot: usize) -> Result<()> {
        if slot == file.slot {
            return Ok(());
        }
        let addr = self
            .table
            .get(file.descriptor)?
            .block(slot)
            .ok_or(Error::BlockNotAllocated { slot })?;

        self.flush(file)?;
        file.buffer = self.storage.read_block(addr)?;
        debug!(
            "descriptor {} moved from slot {} to slot {slot}",
            file.descriptor, file.slot
        );
        file.slot = slot;
        Ok(())
    }

    /// Reads up to `count` bytes from the current position.
    /// Returns fewer bytes if the end of the file comes first.
    pub fn read(&mut self, handle: Handle, count: usize) -> Result<Vec<u8>> {
        let mut file = *self.user_file(handle)?;
        let length = self.table.get(file.descriptor)?.length;
        let count = count.min((length - file.position) as usize);

        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let slot = file.position as usize / BLOCK_SIZE;
            self.move_to(&mut file, slot)?;

            let offset = file.position as usize % BLOCK_SIZE;
            let take = (BLOCK_SIZE - offset).min(count - out.len());
            out.extend_from_slice(&file.buffer.data[offset..offset + take]);
            file.position += take as u32;
        }

        self.oft.update(handle, file)?;
        Ok(out)
    }

    /// Writes `count` copies of `byte` at the current position,
    /// allocating blocks as the file grows.
    ///
    /// Returns the number of bytes written, which is short when the file
    /// reaches its largest size or the disk runs out of blocks.
    pub fn write(&mut self, handle: Handle, byte: u8, count: usize) -> Result<usize> {
        let mut file = *self.user_file(handle)?;
        let written = self.write_from(&mut file, byte, count);
        self.oft.update(handle, file)?;
        written
    }

    fn write_from(&mut self, file: &mut OpenFile, byte: u8, count: usize) -> Result<usize> {
        let id = file.descriptor;
        let mut written = 0;

        while written < count {
            if file.position >= MAX_FILE_SIZE {
                warn!("descriptor {id} reached {MAX_FILE_SIZE} bytes, write truncated");
                break;
            }

            let slot = file.position as usize / BLOCK_SIZE;
            if self.table.get(id)?.block(slot).is_some() {
                self.move_to(file, slot)?;
            } else {
                let addr = match self.table.allocate_block() {
                    Ok(addr) => addr,
                    Err(Error::BlocksExhausted) if written > 0 => {
                        warn!("disk full, write to descriptor {id} truncated");
                        break;
                    }
                    Err(err) => return Err(err),
                };
                self.flush(file)?;
                if let Err(err) = self.table.append_block(id, addr) {
                    self.table.free_block(addr)?;
                    return Err(err);
                }
                file.slot = slot;
                file.buffer = Block::default();
                debug!("descriptor {id} grew by block {addr}");
            }

            let offset = file.position as usize % BLOCK_SIZE;
            let take = (BLOCK_SIZE - offset)
                .min(count - written)
                .min((MAX_FILE_SIZE - file.position) as usize);
            file.buffer.data[offset..offset + take].fill(byte);
            file.dirty = true;
            file.position += take as u32;
            written += take;

            let length = self.table.get(id)?.length;
            if file.position > length {
                self.table.set_length(id, file.position)?;
            }
        }

        self.flush(file)?;
        Ok(written)
    }

    /// Moves the current position to `pos`, which must not be past the end of the file.
    pub fn seek(&mut self, handle: Handle, pos: u32) -> Result<()> {
        let mut file = *self.user_file(handle)?;
        let desc = self.table.get(file.descriptor)?;
        let length = desc.length;
        if pos > length {
            return Err(Error::InvalidPosition { pos, length });
        }

        let slot = pos as usize / BLOCK_SIZE;
        if slot > desc.block_count() {
            return Err(Error::BlockNotAllocated { slot });
        }
        // Seeking to the end of a full block leaves the buffer in place,
        // the next write allocates the following block.
        if desc.block(slot).is_some() {
            self.move_to(&mut file, slot)?;
        }

        file.position = pos;
        self.oft.update(handle, file)
    }
}
