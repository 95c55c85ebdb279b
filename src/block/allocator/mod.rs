pub mod bitmap;

use crate::block::BlockAddr;

/// An implementation of `Allocator` hands out single blocks of a data region.
/// A prefix of reserved blocks is never handed out nor freed.
pub trait Allocator {
    /// Allocates the lowest free block.
    fn allocate(&mut self) -> Result<BlockAddr>;

    /// Returns the block at `addr` to the free pool.
    fn deallocate(&mut self, addr: BlockAddr) -> Result<()>;

    /// Returns the number of free blocks.
    fn available(&self) -> u32;
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    NoSpace,
    AddrOutOfBounds,
    Reserved,
    NotAllocated,
}

impl From<Error> for libc::c_int {
    fn from(err: Error) -> Self {
        match err {
            Error::NoSpace => libc::ENOSPC,
            Error::AddrOutOfBounds | Error::Reserved | Error::NotAllocated => libc::EIO,
        }
    }
}
