//! On-disk geometry.
//!
//! ```text
//! block 0        free-block bitmap
//! blocks 1..=7   descriptor table, 4 descriptors per block
//! blocks 8..64   data blocks
//! ```

use crate::block::{BLOCK_SIZE, BlockAddr, NUM_BLOCKS};

/// Address of the free-block bitmap.
pub const BITMAP_ADDR: BlockAddr = 0;

/// Address of the first descriptor table block.
pub const DESCRIPTOR_TABLE_START: BlockAddr = 1;

/// Size of a stored descriptor in bytes.
pub const DESCRIPTOR_SIZE: usize = 16;

/// How many descriptors fit in a block.
pub const DESCRIPTORS_PER_BLOCK: usize = BLOCK_SIZE / DESCRIPTOR_SIZE;

/// Number of blocks holding the descriptor table.
pub const DESCRIPTOR_TABLE_BLOCKS: u32 = 7;

/// Number of descriptors, including the directory's.
pub const DESCRIPTOR_COUNT: usize = DESCRIPTOR_TABLE_BLOCKS as usize * DESCRIPTORS_PER_BLOCK;

/// Number of blocks reserved for metadata at the start of the disk.
pub const RESERVED_BLOCKS: u32 = DESCRIPTOR_TABLE_START + DESCRIPTOR_TABLE_BLOCKS;

/// Number of blocks available for file data.
pub const DATA_BLOCKS: u32 = NUM_BLOCKS - RESERVED_BLOCKS;

/// How many blocks a file can own.
pub const MAX_BLOCKS_PER_FILE: usize = 3;

/// Largest file size in bytes.
pub const MAX_FILE_SIZE: u32 = (MAX_BLOCKS_PER_FILE * BLOCK_SIZE) as u32;

/// Size of a stored directory entry in bytes.
pub const DIR_ENTRY_SIZE: usize = 8;

/// How many directory entries fit in a block.
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

/// Largest number of files the directory can list.
pub const MAX_DIR_ENTRIES: usize = MAX_BLOCKS_PER_FILE * ENTRIES_PER_BLOCK;

/// Number of simultaneously open files, including the directory.
pub const OFT_CAPACITY: usize = 4;

const _: () = assert!(DESCRIPTOR_SIZE * DESCRIPTORS_PER_BLOCK == BLOCK_SIZE);
const _: () = assert!(DESCRIPTOR_COUNT > MAX_DIR_ENTRIES);
const _: () = assert!(RESERVED_BLOCKS < NUM_BLOCKS);
