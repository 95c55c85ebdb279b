pub mod disk;

use crate::block::{Block, BlockAddr};

/// An implementation of `Storage` allows reading and writing blocks, as well as determining the
/// block capacity.
pub trait Storage {
    /// Reads the block at `addr` into `block`.
    fn read_at(&self, block: &mut Block, addr: BlockAddr) -> Result<()>;

    /// Writes `block` into the block at `addr`.
    fn write_at(&mut self, block: &Block, addr: BlockAddr) -> Result<()>;

    /// Returns the number of blocks the storage can hold.
    fn capacity(&self) -> u32;

    /// Returns a copy of the block at `addr`.
    fn read_block(&self, addr: BlockAddr) -> Result<Block> {
        let mut block = Block::default();
        self.read_at(&mut block, addr)?;
        Ok(block)
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    OutOfRange(BlockAddr),
}

impl From<Error> for libc::c_int {
    fn from(err: Error) -> Self {
        match err {
            Error::OutOfRange(_) => libc::EIO,
        }
    }
}


#[macro_export]
macro_rules! test_storage {
    ($storage:ty) => {
        #[test]
        fn capacity() {
            $crate::block::storage::tests::capacity::<$storage>();
        }

        #[test]
        fn starts_zeroed() {
            $crate::block::storage::tests::starts_zeroed::<$storage>();
        }

        #[test]
        fn write_and_read() {
            $crate::block::storage::tests::write_and_read::<$storage>();
        }

        #[test]
        fn no_interference() {
            $crate::block::storage::tests::no_interference::<$storage>();
        }

        #[test]
        fn out_of_bounds() {
            $crate::block::storage::tests::out_of_bounds::<$storage>();
        }

        #[test]
        fn overwrite() {
            $crate::block::storage::tests::overwrite::<$storage>();
        }
    };
}
