use std::fmt;

use crate::block::{BlockAddr, allocator, storage};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    NotInitialized,

    // Names
    InvalidName,
    DuplicateName,
    NotFound,

    // Capacity
    DescriptorsExhausted,
    DirectoryFull,
    BlocksExhausted,
    TooManyOpenFiles,
    CapacityExceeded,

    // Handles
    InvalidHandle,
    InvalidPosition { pos: u32, length: u32 },
    BlockNotAllocated { slot: usize },

    // Storage
    OutOfRange(BlockAddr),
    Io(std::io::Error),
    CorruptImage(&'static str),
}

impl From<storage::Error> for Error {
    fn from(err: storage::Error) -> Self {
        match err {
            storage::Error::OutOfRange(addr) => Self::OutOfRange(addr),
        }
    }
}

impl From<allocator::Error> for Error {
    fn from(err: allocator::Error) -> Self {
        match err {
            allocator::Error::NoSpace => Self::BlocksExhausted,
            allocator::Error::AddrOutOfBounds => Self::CorruptImage("block address out of bounds"),
            allocator::Error::Reserved => Self::CorruptImage("block is reserved"),
            allocator::Error::NotAllocated => Self::CorruptImage("block is not allocated"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<Error> for libc::c_int {
    fn from(err: Error) -> Self {
        match err {
            Error::NotInitialized => libc::ENODEV,
            Error::InvalidName => libc::EINVAL,
            Error::DuplicateName => libc::EEXIST,
            Error::NotFound => libc::ENOENT,
            Error::DescriptorsExhausted => libc::ENFILE,
            Error::DirectoryFull => libc::ENOSPC,
            Error::BlocksExhausted => libc::ENOSPC,
            Error::TooManyOpenFiles => libc::EMFILE,
            Error::CapacityExceeded => libc::EFBIG,
            Error::InvalidHandle => libc::EBADF,
            Error::InvalidPosition { .. } => libc::EINVAL,
            Error::BlockNotAllocated { .. } => libc::ENXIO,
            Error::OutOfRange(_) => libc::EIO,
            Error::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Error::CorruptImage(_) => libc::EIO,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "disk not initialized"),
            Self::InvalidName => write!(f, "file names must be 1 to 3 characters long"),
            Self::DuplicateName => write!(f, "file already exists"),
            Self::NotFound => write!(f, "file not found"),
            Self::DescriptorsExhausted => write!(f, "no free file descriptors"),
            Self::DirectoryFull => write!(f, "directory full"),
            Self::BlocksExhausted => write!(f, "no free blocks"),
            Self::TooManyOpenFiles => write!(f, "too many open files"),
            Self::CapacityExceeded => write!(f, "file has reached its maximum size"),
            Self::InvalidHandle => write!(f, "invalid file handle"),
            Self::InvalidPosition { pos, length } => {
                write!(f, "position {pos} is outside of file of length {length}")
            }
            Self::BlockNotAllocated { slot } => write!(f, "block {slot} of file is not allocated"),
            Self::OutOfRange(addr) => write!(f, "block address {addr} is out of range"),
            Self::Io(err) => write!(f, "disk image I/O error: {err}"),
            Self::CorruptImage(desc) => write!(f, "corrupt disk image: {desc}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}
