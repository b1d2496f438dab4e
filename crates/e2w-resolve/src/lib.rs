#![forbid(unsafe_code)]
//! Directory-tree and path resolution over raw ext2 images.
//!
//! A [`Volume`] bundles the open backing device with the layout parameters
//! derived from the superblock and group descriptor 0 (block size, inode
//! table start block, inode count) and stays immutable after
//! [`Volume::open`]. Every resolution walks the on-disk structures fresh:
//! there is no directory cache and no write path.
//!
//! Directory content is located the way ext2 lays it out: the inode's 12
//! direct block pointers first, then the single-, double-, and
//! triple-indirect pointer blocks, depth-first and left to right. A zero
//! pointer at any position marks the end of populated entries.

use chrono::DateTime;
use e2w_block::{
    BlockDevice, ByteBlockDevice, ByteDevice, FileByteDevice, MemByteDevice, read_region,
};
use e2w_error::{Result, WalkError};
use e2w_types::{
    BlockNumber, BlockSize, ByteOffset, EXT2_DIND_BLOCK, EXT2_IND_BLOCK, EXT2_NDIR_BLOCKS,
    EXT2_SUPERBLOCK_OFFSET, EXT2_SUPERBLOCK_SIZE, EXT2_TIND_BLOCK, GroupNumber, InodeNumber,
    ParseError,
};
use e2w_ondisk::{
    Ext2DirEntry, Ext2GroupDesc, Ext2Inode, Ext2Superblock, lookup_in_dir_block, parse_dir_block,
};
use std::path::Path;
use tracing::{debug, trace};

/// How many pointer-block layers remain before a block holds directory data.
///
/// `Leaf` tags a data block; `First`/`Second`/`Third` map directly to the
/// ext2 single/double/triple indirect slots. The enum bounds the walk's
/// recursion depth at three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndirectionLevel {
    Leaf,
    First,
    Second,
    Third,
}

impl IndirectionLevel {
    /// The level one step closer to the data, or `None` at `Leaf`.
    #[must_use]
    pub fn descend(self) -> Option<Self> {
        match self {
            Self::Leaf => None,
            Self::First => Some(Self::Leaf),
            Self::Second => Some(Self::First),
            Self::Third => Some(Self::Second),
        }
    }

    /// Number of pointer blocks between here and the data.
    #[must_use]
    pub fn depth(self) -> u8 {
        match self {
            Self::Leaf => 0,
            Self::First => 1,
            Self::Second => 2,
            Self::Third => 3,
        }
    }
}

/// Layout parameters derived from the superblock and group descriptor 0.
///
/// Established once at open and immutable afterwards; every inode and block
/// read depends on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub block_size: BlockSize,
    pub inode_table_block: BlockNumber,
    pub inodes_count: u32,
    pub inode_size: u16,
}

/// One row of a formatted directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListingEntry {
    pub inode: InodeNumber,
    /// Inode change time, formatted `DD-Mon-YYYY HH:MM` (UTC).
    pub ctime: String,
    pub name: String,
}

/// An open, read-only view of an ext2 image.
///
/// Holds the backing block device and the immutable [`Layout`]. Positioned
/// reads carry no shared cursor, so one `Volume` may serve concurrent
/// resolutions.
#[derive(Debug)]
pub struct Volume<D: ByteDevice> {
    device: ByteBlockDevice<D>,
    superblock: Ext2Superblock,
    layout: Layout,
}

impl Volume<FileByteDevice> {
    /// Open an ext2 image file or block device at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(FileByteDevice::open(path)?)
    }
}

impl Volume<MemByteDevice> {
    /// Open an ext2 image already loaded into memory.
    pub fn from_image(image: Vec<u8>) -> Result<Self> {
        Self::open(MemByteDevice::new(image))
    }
}

impl<D: ByteDevice> Volume<D> {
    /// Parse the structural blocks and build the resolution context.
    ///
    /// Failures here are unrecoverable: without a valid superblock and
    /// group descriptor there are no layout parameters to resolve with.
    pub fn open(device: D) -> Result<Self> {
        let region = read_region(
            &device,
            ByteOffset(EXT2_SUPERBLOCK_OFFSET as u64),
            EXT2_SUPERBLOCK_SIZE,
        )?;
        let superblock = Ext2Superblock::parse_superblock_region(&region)
            .map_err(|e| WalkError::Format(e.to_string()))?;

        let block_size = BlockSize::new(superblock.block_size)
            .map_err(|e| WalkError::Format(e.to_string()))?;

        // Only group 0's inode table is modeled; the descriptor table itself
        // starts in the block after the superblock.
        let gd_offset = superblock
            .group_desc_offset(GroupNumber(0))
            .ok_or_else(|| WalkError::Format("group descriptor offset overflow".to_owned()))?;
        let gd_bytes = read_region(
            &device,
            ByteOffset(gd_offset),
            e2w_ondisk::ext2::EXT2_GROUP_DESC_SIZE,
        )?;
        let group_desc = Ext2GroupDesc::parse_from_bytes(&gd_bytes)
            .map_err(|e| WalkError::Format(e.to_string()))?;

        let layout = Layout {
            block_size,
            inode_table_block: BlockNumber(group_desc.inode_table),
            inodes_count: superblock.inodes_count,
            inode_size: superblock.inode_size,
        };

        debug!(
            block_size = block_size.get(),
            inode_table_block = layout.inode_table_block.0,
            inodes_count = layout.inodes_count,
            groups = superblock.groups_count(),
            "opened ext2 volume"
        );

        Ok(Self {
            device: ByteBlockDevice::new(device, block_size),
            superblock,
            layout,
        })
    }

    #[must_use]
    pub fn superblock(&self) -> &Ext2Superblock {
        &self.superblock
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    // ── Inode table ─────────────────────────────────────────────────────

    /// Read an inode record from the group-0 inode table.
    ///
    /// Inode numbers are 1-based. Numbers beyond `s_inodes_count` are
    /// rejected rather than silently reading garbage past the table.
    pub fn read_inode(&self, ino: InodeNumber) -> Result<Ext2Inode> {
        if ino.0 == 0 {
            return Err(WalkError::InvalidInode {
                ino: ino.0,
                reason: "inode 0 is never valid",
            });
        }
        if ino.0 > self.layout.inodes_count {
            return Err(WalkError::InvalidInode {
                ino: ino.0,
                reason: "beyond inode table",
            });
        }

        let table_byte = self
            .layout
            .block_size
            .block_to_byte(self.layout.inode_table_block)
            .ok_or_else(|| WalkError::Format("inode table offset overflow".to_owned()))?;
        let record_offset = u64::from(ino.0 - 1)
            .checked_mul(u64::from(self.layout.inode_size))
            .and_then(|rel| table_byte.checked_add(rel))
            .ok_or_else(|| WalkError::Format("inode offset overflow".to_owned()))?;

        let bytes = read_region(
            self.device.inner(),
            record_offset,
            usize::from(self.layout.inode_size),
        )?;
        Ext2Inode::parse_from_bytes(&bytes)
            .map_err(|e| self.corruption(self.layout.inode_table_block, e))
    }

    // ── Directory block traversal ───────────────────────────────────────

    /// Visit every populated directory data block of `inode` in on-disk
    /// order, stopping early when `visit` yields an entry.
    ///
    /// Order is fixed: direct pointers 0..12 (ending at the first zero
    /// pointer), then the single-, double-, and triple-indirect slots.
    fn scan_dir_blocks<F>(&self, inode: &Ext2Inode, visit: &mut F) -> Result<Option<Ext2DirEntry>>
    where
        F: FnMut(BlockNumber, &[u8]) -> Result<Option<Ext2DirEntry>>,
    {
        for ptr in &inode.block[..EXT2_NDIR_BLOCKS] {
            let block = BlockNumber(*ptr);
            if block.is_unset() {
                break;
            }
            if let Some(entry) = self.visit_data_block(block, visit)? {
                return Ok(Some(entry));
            }
        }

        for (slot, level) in [
            (EXT2_IND_BLOCK, IndirectionLevel::First),
            (EXT2_DIND_BLOCK, IndirectionLevel::Second),
            (EXT2_TIND_BLOCK, IndirectionLevel::Third),
        ] {
            let block = BlockNumber(inode.block[slot]);
            if block.is_unset() {
                continue;
            }
            if let Some(entry) = self.walk_indirect(block, level, visit)? {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }

    /// Recursively resolve a pointer block down to leaf data blocks.
    ///
    /// A zero `block` returns not-found without touching the device.
    /// Pointer entries are consumed left to right; the first zero entry
    /// terminates the block (sparse end-of-data convention). The first
    /// non-empty result in depth-first order wins.
    fn walk_indirect<F>(
        &self,
        block: BlockNumber,
        level: IndirectionLevel,
        visit: &mut F,
    ) -> Result<Option<Ext2DirEntry>>
    where
        F: FnMut(BlockNumber, &[u8]) -> Result<Option<Ext2DirEntry>>,
    {
        if block.is_unset() {
            return Ok(None);
        }

        let Some(next) = level.descend() else {
            // Leaf: the block holds directory entries, not pointers.
            return self.visit_data_block(block, visit);
        };

        trace!(block = block.0, depth = level.depth(), "walk indirect block");
        let buf = self.device.read_block(block)?;
        let bytes = buf.as_slice();

        for i in 0..self.layout.block_size.pointers_per_block() {
            let ptr = u32::from_le_bytes([
                bytes[i * 4],
                bytes[i * 4 + 1],
                bytes[i * 4 + 2],
                bytes[i * 4 + 3],
            ]);
            if ptr == 0 {
                break;
            }
            if let Some(entry) = self.walk_indirect(BlockNumber(ptr), next, visit)? {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }

    fn visit_data_block<F>(&self, block: BlockNumber, visit: &mut F) -> Result<Option<Ext2DirEntry>>
    where
        F: FnMut(BlockNumber, &[u8]) -> Result<Option<Ext2DirEntry>>,
    {
        let buf = self.device.read_block(block)?;
        visit(block, buf.as_slice())
    }

    // ── Directory operations ────────────────────────────────────────────

    /// Find one named entry under a directory inode.
    ///
    /// Absence is `Ok(None)`, never an error. Name comparison is
    /// byte-exact over the full stored name and the full query.
    pub fn lookup(&self, dir: InodeNumber, name: &[u8]) -> Result<Option<Ext2DirEntry>> {
        let inode = self.read_inode(dir)?;
        if !inode.is_dir() {
            return Err(WalkError::NotDirectory(format!("inode {dir}")));
        }
        self.find_in_dir(&inode, name)
    }

    fn find_in_dir(&self, inode: &Ext2Inode, name: &[u8]) -> Result<Option<Ext2DirEntry>> {
        self.scan_dir_blocks(inode, &mut |block, bytes| {
            lookup_in_dir_block(bytes, name).map_err(|e| self.corruption(block, e))
        })
    }

    /// Read all live directory entries under a directory inode, in on-disk
    /// order across the full direct-then-indirect traversal.
    pub fn read_dir(&self, dir: InodeNumber) -> Result<Vec<Ext2DirEntry>> {
        let inode = self.read_inode(dir)?;
        if !inode.is_dir() {
            return Err(WalkError::NotDirectory(format!("inode {dir}")));
        }

        let mut entries = Vec::new();
        self.scan_dir_blocks(&inode, &mut |block, bytes| {
            entries.extend(parse_dir_block(bytes).map_err(|e| self.corruption(block, e))?);
            Ok(None)
        })?;
        Ok(entries)
    }

    /// Enumerate a directory with each entry's inode change time formatted
    /// `DD-Mon-YYYY HH:MM`.
    ///
    /// Deleted slots never reach this point: the block scanner drops them,
    /// so no attempt is made to resolve inode 0.
    pub fn list_dir(&self, dir: InodeNumber) -> Result<Vec<DirListingEntry>> {
        let entries = self.read_dir(dir)?;
        let mut listing = Vec::with_capacity(entries.len());
        for entry in entries {
            let inode = self.read_inode(InodeNumber(entry.inode))?;
            listing.push(DirListingEntry {
                inode: InodeNumber(entry.inode),
                ctime: format_ctime(inode.ctime),
                name: entry.name_str(),
            });
        }
        Ok(listing)
    }

    // ── Path resolution ─────────────────────────────────────────────────

    /// Resolve a slash-separated path starting at the root inode.
    ///
    /// Consecutive separators collapse; a path with no components (`"/"`,
    /// `""`, `"///"`) resolves to the root inode itself. Every intermediate
    /// component must be a directory; the final component's type is not
    /// constrained. Failures name the offending component and distinguish
    /// a missing entry (`NotFound`) from a non-directory one
    /// (`NotDirectory`).
    pub fn resolve_path(&self, path: &str) -> Result<(InodeNumber, Ext2Inode)> {
        let mut current = InodeNumber::ROOT;
        let mut inode = self.read_inode(current)?;
        let mut current_name = "/".to_owned();

        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !inode.is_dir() {
                debug!(component = %current_name, "path component is not a directory");
                return Err(WalkError::NotDirectory(current_name));
            }

            let entry = self
                .find_in_dir(&inode, component.as_bytes())?
                .ok_or_else(|| {
                    debug!(component, "path component not found");
                    WalkError::NotFound(component.to_owned())
                })?;

            current = InodeNumber(entry.inode);
            inode = self.read_inode(current)?;
            current_name = component.to_owned();
            trace!(component, inode = current.0, "resolved path component");
        }

        Ok((current, inode))
    }

    /// Like [`resolve_path`](Self::resolve_path), additionally requiring
    /// the final inode to be a directory.
    pub fn resolve_dir_path(&self, path: &str) -> Result<InodeNumber> {
        let (ino, inode) = self.resolve_path(path)?;
        if !inode.is_dir() {
            let leaf = path
                .rsplit('/')
                .find(|c| !c.is_empty())
                .unwrap_or("/")
                .to_owned();
            return Err(WalkError::NotDirectory(leaf));
        }
        Ok(ino)
    }

    fn corruption(&self, block: BlockNumber, err: ParseError) -> WalkError {
        WalkError::Corruption {
            block: u64::from(block.0),
            detail: err.to_string(),
        }
    }
}

/// Format an inode timestamp as `DD-Mon-YYYY HH:MM` (UTC).
#[must_use]
pub fn format_ctime(secs: u32) -> String {
    match DateTime::from_timestamp(i64::from(secs), 0) {
        Some(ts) => ts.format("%d-%b-%Y %H:%M").to_string(),
        None => "??-???-???? ??:??".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indirection_level_descends_to_leaf() {
        assert_eq!(
            IndirectionLevel::Third.descend(),
            Some(IndirectionLevel::Second)
        );
        assert_eq!(
            IndirectionLevel::Second.descend(),
            Some(IndirectionLevel::First)
        );
        assert_eq!(IndirectionLevel::First.descend(), Some(IndirectionLevel::Leaf));
        assert_eq!(IndirectionLevel::Leaf.descend(), None);
    }

    #[test]
    fn indirection_level_depth() {
        assert_eq!(IndirectionLevel::Leaf.depth(), 0);
        assert_eq!(IndirectionLevel::First.depth(), 1);
        assert_eq!(IndirectionLevel::Second.depth(), 2);
        assert_eq!(IndirectionLevel::Third.depth(), 3);
    }

    #[test]
    fn ctime_formatting() {
        // 2023-11-14T22:13:20Z
        assert_eq!(format_ctime(1_700_000_000), "14-Nov-2023 22:13");
        assert_eq!(format_ctime(0), "01-Jan-1970 00:00");
    }
}
