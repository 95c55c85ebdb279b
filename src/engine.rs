use std::path::Path;

use log::info;

use crate::{
    block::storage::disk::Disk,
    fs::{Error, FileInfo, Filesystem, Result, oft::Handle},
};

/// Whether `Engine::init` started from a blank disk or an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    Formatted,
    Restored,
}

/// The process-wide engine. Holds a filesystem once initialized.
#[derive(Default)]
pub struct Engine {
    fs: Option<Filesystem<Disk>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats a new disk, or restores one from an image at `path`.
    /// Replaces any prior state, including open handles.
    pub fn init(&mut self, path: Option<&Path>) -> Result<InitKind> {
        let (fs, kind) = match path {
            Some(path) => (Filesystem::restore(path)?, InitKind::Restored),
            None => (Filesystem::format(Disk::new())?, InitKind::Formatted),
        };
        if self.fs.replace(fs).is_some() {
            info!("previous disk discarded");
        }
        Ok(kind)
    }

    pub fn filesystem(&self) -> Result<&Filesystem<Disk>> {
        self.fs.as_ref().ok_or(Error::NotInitialized)
    }

    fn filesystem_mut(&mut self) -> Result<&mut Filesystem<Disk>> {
        self.fs.as_mut().ok_or(Error::NotInitialized)
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        self.filesystem_mut()?.create(name).map(|_| ())
    }

    pub fn destroy(&mut self, name: &str) -> Result<()> {
        self.filesystem_mut()?.destroy(name)
    }

    pub fn open(&mut self, name: &str) -> Result<Handle> {
        self.filesystem_mut()?.open(name)
    }

    pub fn close(&mut self, handle: Handle) -> Result<()> {
        self.filesystem_mut()?.close(handle)
    }

    pub fn read(&mut self, handle: Handle, count: usize) -> Result<Vec<u8>> {
        self.filesystem_mut()?.read(handle, count)
    }

    pub fn write(&mut self, handle: Handle, byte: u8, count: usize) -> Result<usize> {
        self.filesystem_mut()?.write(handle, byte, count)
    }

    pub fn seek(&mut self, handle: Handle, pos: u32) -> Result<()> {
        self.filesystem_mut()?.seek(handle, pos)
    }

    /// Collects the directory listing.
    pub fn list(&self) -> Result<Vec<FileInfo>> {
        self.filesystem()?.list()?.collect()
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.filesystem_mut()?.save(path)
    }
}
