#![forbid(unsafe_code)]
//! On-disk format parsing for ext2 structures.
//!
//! Pure parsing crate: no I/O, no side effects. Parses byte slices into
//! typed Rust structures representing the ext2 superblock, group
//! descriptors, inodes, and directory entry blocks.

pub mod ext2;

pub use ext2::{
    DirBlockIter, Ext2DirEntry, Ext2DirEntryRef, Ext2FileType, Ext2GroupDesc, Ext2Inode,
    Ext2Superblock, iter_dir_block, lookup_in_dir_block, parse_dir_block,
};
