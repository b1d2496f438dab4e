//! ext2 on-disk structure parsing.
//!
//! Field offsets follow the classic ext2 layout (`struct ext2_super_block`,
//! `struct ext2_group_desc`, `struct ext2_inode`, `struct ext2_dir_entry_2`
//! in the Linux kernel headers). All multi-byte fields are little-endian.

use e2w_types::{
    EXT2_GOOD_OLD_FIRST_INO, EXT2_GOOD_OLD_INODE_SIZE, EXT2_N_BLOCKS, EXT2_SUPER_MAGIC,
    EXT2_SUPERBLOCK_OFFSET, EXT2_SUPERBLOCK_SIZE, GroupNumber, ParseError, ensure_slice,
    ext2_block_size_from_log, read_fixed, read_le_u16, read_le_u32, trim_nul_padded,
};
use serde::{Deserialize, Serialize};

// ── File mode bits (i_mode) ─────────────────────────────────────────────────

pub const S_IFMT: u16 = 0xF000;
pub const S_IFSOCK: u16 = 0xC000;
pub const S_IFLNK: u16 = 0xA000;
pub const S_IFREG: u16 = 0x8000;
pub const S_IFBLK: u16 = 0x6000;
pub const S_IFDIR: u16 = 0x4000;
pub const S_IFCHR: u16 = 0x2000;
pub const S_IFIFO: u16 = 0x1000;

/// Size of one group descriptor record on disk.
pub const EXT2_GROUP_DESC_SIZE: usize = 32;

/// Directory entry header size (`ext2_dir_entry_2` before the name bytes).
pub const DIR_ENTRY_HEADER_LEN: usize = 8;

// ── Superblock ──────────────────────────────────────────────────────────────

/// Parsed ext2 superblock.
///
/// Only rev 0 and rev 1 layouts are handled; the resolver consumes
/// `block_size`, `inodes_count`, and `inode_size`, the rest is carried for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2Superblock {
    // ── Core geometry ────────────────────────────────────────────────────
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub reserved_blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub inode_size: u16,
    pub first_ino: u32,

    // ── Identity ─────────────────────────────────────────────────────────
    pub magic: u16,
    pub uuid: [u8; 16],
    pub volume_name: String,

    // ── Revision & OS ────────────────────────────────────────────────────
    pub rev_level: u32,
    pub minor_rev_level: u16,
    pub creator_os: u32,

    // ── State ────────────────────────────────────────────────────────────
    pub state: u16,
    pub errors: u16,
    pub mnt_count: u16,
    pub max_mnt_count: u16,

    // ── Timestamps ───────────────────────────────────────────────────────
    pub mtime: u32,
    pub wtime: u32,
    pub lastcheck: u32,
}

impl Ext2Superblock {
    /// Parse an ext2 superblock from a 1024-byte superblock region.
    pub fn parse_superblock_region(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < EXT2_SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT2_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u16(region, 0x38)?;
        if magic != EXT2_SUPER_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: EXT2_SUPER_MAGIC,
                actual: magic,
            });
        }

        let log_block_size = read_le_u32(region, 0x18)?;
        let Some(block_size) = ext2_block_size_from_log(log_block_size) else {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "invalid shift",
            });
        };
        if !matches!(block_size, 1024 | 2048 | 4096) {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "unsupported block size",
            });
        }

        let rev_level = read_le_u32(region, 0x4C)?;

        // Rev 0 images have no s_inode_size / s_first_ino fields; the format
        // fixes them at 128 and 11.
        let (inode_size, first_ino) = if rev_level == 0 {
            (EXT2_GOOD_OLD_INODE_SIZE, EXT2_GOOD_OLD_FIRST_INO)
        } else {
            let inode_size = read_le_u16(region, 0x58)?;
            if inode_size < EXT2_GOOD_OLD_INODE_SIZE
                || !inode_size.is_power_of_two()
                || u32::from(inode_size) > block_size
            {
                return Err(ParseError::InvalidField {
                    field: "s_inode_size",
                    reason: "must be a power of two in 128..=block_size",
                });
            }
            (inode_size, read_le_u32(region, 0x54)?)
        };

        let blocks_per_group = read_le_u32(region, 0x20)?;
        if blocks_per_group == 0 {
            return Err(ParseError::InvalidField {
                field: "s_blocks_per_group",
                reason: "must be nonzero",
            });
        }

        Ok(Self {
            // Core geometry
            inodes_count: read_le_u32(region, 0x00)?,
            blocks_count: read_le_u32(region, 0x04)?,
            reserved_blocks_count: read_le_u32(region, 0x08)?,
            free_blocks_count: read_le_u32(region, 0x0C)?,
            free_inodes_count: read_le_u32(region, 0x10)?,
            first_data_block: read_le_u32(region, 0x14)?,
            block_size,
            blocks_per_group,
            inodes_per_group: read_le_u32(region, 0x28)?,
            inode_size,
            first_ino,

            // Identity
            magic,
            uuid: read_fixed::<16>(region, 0x68)?,
            volume_name: trim_nul_padded(&read_fixed::<16>(region, 0x78)?),

            // Revision & OS
            rev_level,
            minor_rev_level: read_le_u16(region, 0x3E)?,
            creator_os: read_le_u32(region, 0x48)?,

            // State
            state: read_le_u16(region, 0x3A)?,
            errors: read_le_u16(region, 0x3C)?,
            mnt_count: read_le_u16(region, 0x34)?,
            max_mnt_count: read_le_u16(region, 0x36)?,

            // Timestamps
            mtime: read_le_u32(region, 0x2C)?,
            wtime: read_le_u32(region, 0x30)?,
            lastcheck: read_le_u32(region, 0x40)?,
        })
    }

    /// Parse an ext2 superblock from a full disk image.
    pub fn parse_from_image(image: &[u8]) -> Result<Self, ParseError> {
        let end = EXT2_SUPERBLOCK_OFFSET
            .checked_add(EXT2_SUPERBLOCK_SIZE)
            .ok_or(ParseError::InvalidField {
                field: "superblock_offset",
                reason: "overflow",
            })?;

        if image.len() < end {
            return Err(ParseError::InsufficientData {
                needed: EXT2_SUPERBLOCK_SIZE,
                offset: EXT2_SUPERBLOCK_OFFSET,
                actual: image.len().saturating_sub(EXT2_SUPERBLOCK_OFFSET),
            });
        }

        Self::parse_superblock_region(&image[EXT2_SUPERBLOCK_OFFSET..end])
    }

    /// Number of block groups (`ceil(blocks / blocks_per_group)`).
    ///
    /// Informational only: resolution consults group descriptor 0.
    #[must_use]
    pub fn groups_count(&self) -> u32 {
        let data_blocks = self.blocks_count.saturating_sub(self.first_data_block);
        data_blocks.div_ceil(self.blocks_per_group)
    }

    /// First block of the group descriptor table.
    ///
    /// The table begins in the block after the superblock: block 2 for 1K
    /// block size (superblock occupies block 1), block 1 otherwise.
    #[must_use]
    pub fn group_desc_table_block(&self) -> u32 {
        self.first_data_block + 1
    }

    /// Byte offset of a group descriptor within the image.
    #[must_use]
    pub fn group_desc_offset(&self, group: GroupNumber) -> Option<u64> {
        let table_byte =
            u64::from(self.group_desc_table_block()).checked_mul(u64::from(self.block_size))?;
        let desc_offset = u64::from(group.0).checked_mul(EXT2_GROUP_DESC_SIZE as u64)?;
        table_byte.checked_add(desc_offset)
    }
}

// ── Group descriptor ────────────────────────────────────────────────────────

/// Parsed ext2 group descriptor (32 bytes on disk).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2GroupDesc {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub used_dirs_count: u16,
}

impl Ext2GroupDesc {
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < EXT2_GROUP_DESC_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT2_GROUP_DESC_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        let desc = Self {
            block_bitmap: read_le_u32(bytes, 0x00)?,
            inode_bitmap: read_le_u32(bytes, 0x04)?,
            inode_table: read_le_u32(bytes, 0x08)?,
            free_blocks_count: read_le_u16(bytes, 0x0C)?,
            free_inodes_count: read_le_u16(bytes, 0x0E)?,
            used_dirs_count: read_le_u16(bytes, 0x10)?,
        };

        if desc.inode_table == 0 {
            return Err(ParseError::InvalidField {
                field: "bg_inode_table",
                reason: "inode table block must be nonzero",
            });
        }

        Ok(desc)
    }
}

// ── Inode ───────────────────────────────────────────────────────────────────

/// Parsed ext2 inode (128-byte base record).
///
/// `block[0..12]` are direct data-block pointers; `block[12]`, `block[13]`,
/// and `block[14]` are the single-, double-, and triple-indirect pointer
/// blocks. A zero pointer marks the end of populated entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2Inode {
    pub mode: u16,
    pub uid: u16,
    pub gid: u16,
    pub size: u32,
    pub links_count: u16,
    pub blocks: u32,
    pub flags: u32,
    pub generation: u32,

    // ── Timestamps (seconds since the epoch) ─────────────────────────────
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,

    // ── Block map ───────────────────────────────────────────────────────
    pub block: [u32; EXT2_N_BLOCKS],
}

impl Ext2Inode {
    /// Parse an ext2 inode from raw bytes. Requires at least 128 bytes.
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < usize::from(EXT2_GOOD_OLD_INODE_SIZE) {
            return Err(ParseError::InsufficientData {
                needed: usize::from(EXT2_GOOD_OLD_INODE_SIZE),
                offset: 0,
                actual: bytes.len(),
            });
        }

        // i_block[0..15]: 60 bytes at offset 0x28
        let mut block = [0_u32; EXT2_N_BLOCKS];
        for (i, slot) in block.iter_mut().enumerate() {
            *slot = read_le_u32(bytes, 0x28 + i * 4)?;
        }

        Ok(Self {
            mode: read_le_u16(bytes, 0x00)?,
            uid: read_le_u16(bytes, 0x02)?,
            gid: read_le_u16(bytes, 0x18)?,
            size: read_le_u32(bytes, 0x04)?,
            links_count: read_le_u16(bytes, 0x1A)?,
            blocks: read_le_u32(bytes, 0x1C)?,
            flags: read_le_u32(bytes, 0x20)?,
            generation: read_le_u32(bytes, 0x64)?,

            atime: read_le_u32(bytes, 0x08)?,
            ctime: read_le_u32(bytes, 0x0C)?,
            mtime: read_le_u32(bytes, 0x10)?,
            dtime: read_le_u32(bytes, 0x14)?,

            block,
        })
    }

    /// Extract the file type bits from the mode field.
    #[must_use]
    pub fn file_type_mode(&self) -> u16 {
        self.mode & S_IFMT
    }

    /// Whether this inode is a directory.
    ///
    /// Must be checked before treating the inode's blocks as directory
    /// entry blocks.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type_mode() == S_IFDIR
    }

    /// Whether this inode is a regular file.
    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.file_type_mode() == S_IFREG
    }

    /// Whether this inode is a symbolic link.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.file_type_mode() == S_IFLNK
    }
}

// ── Directory entries ───────────────────────────────────────────────────────

/// File type as stored in a directory entry (`EXT2_FT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ext2FileType {
    Unknown = 0,
    RegFile = 1,
    Dir = 2,
    Chrdev = 3,
    Blkdev = 4,
    Fifo = 5,
    Sock = 6,
    Symlink = 7,
}

impl Ext2FileType {
    #[must_use]
    pub fn from_raw(val: u8) -> Self {
        match val {
            1 => Self::RegFile,
            2 => Self::Dir,
            3 => Self::Chrdev,
            4 => Self::Blkdev,
            5 => Self::Fifo,
            6 => Self::Sock,
            7 => Self::Symlink,
            _ => Self::Unknown,
        }
    }
}

/// A parsed ext2 directory entry (`ext2_dir_entry_2`).
///
/// The name occupies exactly `name_len` bytes on disk with no terminator;
/// `rec_len` is the authoritative span of the record within its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: Ext2FileType,
    pub name: Vec<u8>,
}

impl Ext2DirEntry {
    /// The minimal on-disk size of this entry (header + name, padded to 4).
    #[must_use]
    pub fn actual_size(&self) -> usize {
        (DIR_ENTRY_HEADER_LEN + usize::from(self.name_len) + 3) & !3
    }

    /// Return the name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Whether this is the `.` entry.
    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == b"."
    }

    /// Whether this is the `..` entry.
    #[must_use]
    pub fn is_dotdot(&self) -> bool {
        self.name == b".."
    }
}

/// A borrowed directory entry (zero-copy reference into the block buffer).
///
/// Unlike [`Ext2DirEntry`] which owns its name bytes, `Ext2DirEntryRef`
/// borrows the name slice from the block buffer, avoiding per-entry heap
/// allocation while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ext2DirEntryRef<'a> {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: Ext2FileType,
    pub name: &'a [u8],
}

impl Ext2DirEntryRef<'_> {
    /// Convert to an owned [`Ext2DirEntry`] (allocates name bytes).
    #[must_use]
    pub fn to_owned(&self) -> Ext2DirEntry {
        Ext2DirEntry {
            inode: self.inode,
            rec_len: self.rec_len,
            name_len: self.name_len,
            file_type: self.file_type,
            name: self.name.to_vec(),
        }
    }

    /// Return the name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }
}

/// A zero-allocation iterator over directory entries in a block buffer.
///
/// Yields `Result<Ext2DirEntryRef<'a>, ParseError>` for each live entry,
/// skipping deleted slots (`inode == 0`) while still advancing by their
/// `rec_len`. Iteration ends when the cumulative offset reaches the end of
/// the block; the sum of `rec_len`s across a well-formed block equals the
/// block size exactly.
pub struct DirBlockIter<'a> {
    block: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> DirBlockIter<'a> {
    /// Create a new iterator over directory entries in `block`.
    #[must_use]
    pub fn new(block: &'a [u8]) -> Self {
        Self {
            block,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for DirBlockIter<'a> {
    type Item = Result<Ext2DirEntryRef<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.offset + DIR_ENTRY_HEADER_LEN > self.block.len() {
                return None;
            }

            let inode = match read_le_u32(self.block, self.offset) {
                Ok(v) => v,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let rec_len = match read_le_u16(self.block, self.offset + 4) {
                Ok(v) => v,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let name_len = match ensure_slice(self.block, self.offset + 6, 1) {
                Ok(s) => s[0],
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let file_type_raw = match ensure_slice(self.block, self.offset + 7, 1) {
                Ok(s) => s[0],
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            // rec_len must cover at least the header, and the record must
            // not extend past the block boundary. A violation means the
            // block does not tile and further scanning would misparse.
            if usize::from(rec_len) < DIR_ENTRY_HEADER_LEN {
                self.done = true;
                return Some(Err(ParseError::InvalidField {
                    field: "rec_len",
                    reason: "directory entry rec_len < 8",
                }));
            }
            let entry_end = self.offset + usize::from(rec_len);
            if entry_end > self.block.len() {
                self.done = true;
                return Some(Err(ParseError::InvalidField {
                    field: "rec_len",
                    reason: "directory entry extends past block boundary",
                }));
            }

            // Deleted/unused slot: skip, but its rec_len still advances the scan.
            if inode == 0 {
                self.offset = entry_end;
                continue;
            }

            let name_end = self.offset + DIR_ENTRY_HEADER_LEN + usize::from(name_len);
            if name_end > entry_end {
                self.done = true;
                return Some(Err(ParseError::InvalidField {
                    field: "name_len",
                    reason: "name extends past rec_len",
                }));
            }

            let name = &self.block[self.offset + DIR_ENTRY_HEADER_LEN..name_end];
            self.offset = entry_end;

            return Some(Ok(Ext2DirEntryRef {
                inode,
                rec_len,
                name_len,
                file_type: Ext2FileType::from_raw(file_type_raw),
                name,
            }));
        }
    }
}

/// Create an iterator over directory entries in a block buffer.
#[must_use]
pub fn iter_dir_block(block: &[u8]) -> DirBlockIter<'_> {
    DirBlockIter::new(block)
}

/// Parse all live directory entries from a single directory data block.
pub fn parse_dir_block(block: &[u8]) -> Result<Vec<Ext2DirEntry>, ParseError> {
    let mut entries = Vec::new();
    for result in iter_dir_block(block) {
        entries.push(result?.to_owned());
    }
    Ok(entries)
}

/// Look up a single name in a directory data block.
///
/// The comparison is byte-exact over the full stored name and the full
/// query: a query that is a strict prefix or superstring of a stored name
/// does not match.
pub fn lookup_in_dir_block(block: &[u8], target: &[u8]) -> Result<Option<Ext2DirEntry>, ParseError> {
    for result in iter_dir_block(block) {
        let entry = result?;
        if entry.name == target {
            return Ok(Some(entry.to_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Fixture builders ────────────────────────────────────────────────

    fn write_dir_entry(buf: &mut [u8], offset: usize, inode: u32, ft: u8, name: &[u8], rec_len: u16) {
        buf[offset..offset + 4].copy_from_slice(&inode.to_le_bytes());
        buf[offset + 4..offset + 6].copy_from_slice(&rec_len.to_le_bytes());
        buf[offset + 6] = u8::try_from(name.len()).unwrap();
        buf[offset + 7] = ft;
        buf[offset + 8..offset + 8 + name.len()].copy_from_slice(name);
    }

    fn minimal_superblock_region(log_block_size: u32, rev_level: u32) -> Vec<u8> {
        let mut region = vec![0_u8; 1024];
        region[0x00..0x04].copy_from_slice(&64_u32.to_le_bytes()); // s_inodes_count
        region[0x04..0x08].copy_from_slice(&2048_u32.to_le_bytes()); // s_blocks_count
        region[0x14..0x18].copy_from_slice(&1_u32.to_le_bytes()); // s_first_data_block
        region[0x18..0x1C].copy_from_slice(&log_block_size.to_le_bytes());
        region[0x20..0x24].copy_from_slice(&8192_u32.to_le_bytes()); // s_blocks_per_group
        region[0x28..0x2C].copy_from_slice(&64_u32.to_le_bytes()); // s_inodes_per_group
        region[0x38..0x3A].copy_from_slice(&EXT2_SUPER_MAGIC.to_le_bytes());
        region[0x4C..0x50].copy_from_slice(&rev_level.to_le_bytes());
        if rev_level >= 1 {
            region[0x54..0x58].copy_from_slice(&11_u32.to_le_bytes()); // s_first_ino
            region[0x58..0x5A].copy_from_slice(&128_u16.to_le_bytes()); // s_inode_size
        }
        region[0x78..0x7C].copy_from_slice(b"test");
        region
    }

    // ── Superblock ──────────────────────────────────────────────────────

    #[test]
    fn parse_superblock_rev1() {
        let region = minimal_superblock_region(0, 1);
        let sb = Ext2Superblock::parse_superblock_region(&region).unwrap();
        assert_eq!(sb.block_size, 1024);
        assert_eq!(sb.inodes_count, 64);
        assert_eq!(sb.inode_size, 128);
        assert_eq!(sb.first_ino, 11);
        assert_eq!(sb.volume_name, "test");
        assert_eq!(sb.groups_count(), 1);
        assert_eq!(sb.group_desc_table_block(), 2);
    }

    #[test]
    fn parse_superblock_rev0_defaults() {
        let region = minimal_superblock_region(0, 0);
        let sb = Ext2Superblock::parse_superblock_region(&region).unwrap();
        assert_eq!(sb.inode_size, 128);
        assert_eq!(sb.first_ino, 11);
    }

    #[test]
    fn parse_superblock_rejects_bad_magic() {
        let mut region = minimal_superblock_region(0, 1);
        region[0x38] = 0x00;
        let err = Ext2Superblock::parse_superblock_region(&region).unwrap_err();
        assert!(matches!(err, ParseError::InvalidMagic { .. }));
    }

    #[test]
    fn parse_superblock_rejects_oversized_block() {
        let region = minimal_superblock_region(4, 1); // 16K
        let err = Ext2Superblock::parse_superblock_region(&region).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField {
                field: "s_log_block_size",
                ..
            }
        ));
    }

    #[test]
    fn parse_from_image_at_fixed_offset() {
        let mut image = vec![0_u8; 4096];
        let region = minimal_superblock_region(0, 1);
        image[1024..2048].copy_from_slice(&region);
        let sb = Ext2Superblock::parse_from_image(&image).unwrap();
        assert_eq!(sb.block_size, 1024);

        // Truncated image: superblock region not fully present.
        assert!(Ext2Superblock::parse_from_image(&image[..1500]).is_err());
    }

    #[test]
    fn group_desc_table_block_follows_superblock() {
        let mut region = minimal_superblock_region(2, 1); // 4K blocks
        region[0x14..0x18].copy_from_slice(&0_u32.to_le_bytes()); // first_data_block = 0
        let sb = Ext2Superblock::parse_superblock_region(&region).unwrap();
        assert_eq!(sb.group_desc_table_block(), 1);
        assert_eq!(sb.group_desc_offset(GroupNumber(0)), Some(4096));
        assert_eq!(sb.group_desc_offset(GroupNumber(3)), Some(4096 + 96));
    }

    // ── Group descriptor ────────────────────────────────────────────────

    #[test]
    fn parse_group_desc() {
        let mut bytes = vec![0_u8; 32];
        bytes[0x00..0x04].copy_from_slice(&3_u32.to_le_bytes());
        bytes[0x04..0x08].copy_from_slice(&4_u32.to_le_bytes());
        bytes[0x08..0x0C].copy_from_slice(&5_u32.to_le_bytes());
        bytes[0x10..0x12].copy_from_slice(&2_u16.to_le_bytes());

        let gd = Ext2GroupDesc::parse_from_bytes(&bytes).unwrap();
        assert_eq!(gd.block_bitmap, 3);
        assert_eq!(gd.inode_bitmap, 4);
        assert_eq!(gd.inode_table, 5);
        assert_eq!(gd.used_dirs_count, 2);
    }

    #[test]
    fn parse_group_desc_rejects_zero_inode_table() {
        let bytes = vec![0_u8; 32];
        let err = Ext2GroupDesc::parse_from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField {
                field: "bg_inode_table",
                ..
            }
        ));
    }

    // ── Inode ───────────────────────────────────────────────────────────

    fn make_inode_bytes(mode: u16, ctime: u32, block: &[u32; EXT2_N_BLOCKS]) -> Vec<u8> {
        let mut bytes = vec![0_u8; 128];
        bytes[0x00..0x02].copy_from_slice(&mode.to_le_bytes());
        bytes[0x0C..0x10].copy_from_slice(&ctime.to_le_bytes());
        bytes[0x1A..0x1C].copy_from_slice(&2_u16.to_le_bytes());
        for (i, b) in block.iter().enumerate() {
            bytes[0x28 + i * 4..0x28 + i * 4 + 4].copy_from_slice(&b.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn parse_inode_block_pointers_round_trip() {
        let mut block = [0_u32; EXT2_N_BLOCKS];
        for (i, slot) in block.iter_mut().enumerate() {
            *slot = 100 + u32::try_from(i).unwrap();
        }
        let bytes = make_inode_bytes(S_IFDIR | 0o755, 1_700_000_000, &block);

        let inode = Ext2Inode::parse_from_bytes(&bytes).unwrap();
        assert_eq!(inode.block, block);
        assert_eq!(inode.ctime, 1_700_000_000);
        assert!(inode.is_dir());
        assert!(!inode.is_regular());
    }

    #[test]
    fn parse_inode_file_types() {
        let block = [0_u32; EXT2_N_BLOCKS];
        let dir = Ext2Inode::parse_from_bytes(&make_inode_bytes(S_IFDIR, 0, &block)).unwrap();
        let reg = Ext2Inode::parse_from_bytes(&make_inode_bytes(S_IFREG | 0o644, 0, &block)).unwrap();
        let lnk = Ext2Inode::parse_from_bytes(&make_inode_bytes(S_IFLNK, 0, &block)).unwrap();

        assert!(dir.is_dir());
        assert!(reg.is_regular());
        assert!(lnk.is_symlink());
    }

    #[test]
    fn parse_inode_rejects_short_buffer() {
        let err = Ext2Inode::parse_from_bytes(&[0_u8; 64]).unwrap_err();
        assert!(matches!(err, ParseError::InsufficientData { .. }));
    }

    // ── Directory blocks ────────────────────────────────────────────────

    #[test]
    fn parse_dir_block_yields_on_disk_order() {
        let block_size = 1024_usize;
        let mut block = vec![0_u8; block_size];

        write_dir_entry(&mut block, 0, 2, 2, b".", 12);
        write_dir_entry(&mut block, 12, 2, 2, b"..", 12);
        write_dir_entry(&mut block, 24, 12, 2, b"usr", 12);
        let remaining = u16::try_from(block_size - 36).unwrap();
        write_dir_entry(&mut block, 36, 13, 1, b"hello.txt", remaining);

        let entries = parse_dir_block(&block).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries[0].is_dot());
        assert!(entries[1].is_dotdot());
        assert_eq!(entries[2].name_str(), "usr");
        assert_eq!(entries[2].file_type, Ext2FileType::Dir);
        assert_eq!(entries[3].name_str(), "hello.txt");
        assert_eq!(entries[3].file_type, Ext2FileType::RegFile);

        // rec_lens tile the block exactly.
        let span: usize = entries.iter().map(|e| usize::from(e.rec_len)).sum();
        assert_eq!(span, block_size);
    }

    #[test]
    fn dir_iter_skips_deleted_but_advances() {
        let block_size = 1024_usize;
        let mut block = vec![0_u8; block_size];

        write_dir_entry(&mut block, 0, 5, 1, b"a", 12);
        write_dir_entry(&mut block, 12, 0, 0, b"", 24); // deleted slot
        let remaining = u16::try_from(block_size - 36).unwrap();
        write_dir_entry(&mut block, 36, 6, 1, b"b", remaining);

        let entries = parse_dir_block(&block).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, b"a");
        assert_eq!(entries[1].name, b"b");
    }

    #[test]
    fn lookup_exact_name_match_only() {
        let block_size = 1024_usize;
        let mut block = vec![0_u8; block_size];

        write_dir_entry(&mut block, 0, 2, 2, b".", 12);
        write_dir_entry(&mut block, 12, 40, 1, b"foobar", 16);
        let remaining = u16::try_from(block_size - 28).unwrap();
        write_dir_entry(&mut block, 28, 41, 1, b"foo", remaining);

        // Exact matches hit the right entries.
        assert_eq!(
            lookup_in_dir_block(&block, b"foobar").unwrap().unwrap().inode,
            40
        );
        assert_eq!(lookup_in_dir_block(&block, b"foo").unwrap().unwrap().inode, 41);

        // A strict prefix of a stored name must not match, nor a superstring.
        assert!(lookup_in_dir_block(&block, b"fo").unwrap().is_none());
        assert!(lookup_in_dir_block(&block, b"foob").unwrap().is_none());
        assert!(lookup_in_dir_block(&block, b"foobarbaz").unwrap().is_none());
    }

    #[test]
    fn lookup_finds_entry_in_deleted_slot_shadow() {
        // A deleted slot in front of the target must not stop the scan.
        let block_size = 1024_usize;
        let mut block = vec![0_u8; block_size];
        write_dir_entry(&mut block, 0, 0, 0, b"", 512); // deleted, spans half the block
        let remaining = u16::try_from(block_size - 512).unwrap();
        write_dir_entry(&mut block, 512, 9, 2, b"tail", remaining);

        let found = lookup_in_dir_block(&block, b"tail").unwrap().unwrap();
        assert_eq!(found.inode, 9);
    }

    #[test]
    fn dir_iter_rejects_bad_rec_len() {
        let mut block = vec![0_u8; 64];
        write_dir_entry(&mut block, 0, 1, 1, b"x", 4); // rec_len < 8

        let result: Result<Vec<_>, _> = iter_dir_block(&block).collect();
        assert!(result.is_err());

        let mut block = vec![0_u8; 64];
        write_dir_entry(&mut block, 0, 1, 1, b"x", 200); // extends past block
        let result: Result<Vec<_>, _> = iter_dir_block(&block).collect();
        assert!(result.is_err());
    }

    #[test]
    fn dir_entry_actual_size_is_padded() {
        let entry = Ext2DirEntry {
            inode: 1,
            rec_len: 1024,
            name_len: 5,
            file_type: Ext2FileType::RegFile,
            name: b"hello".to_vec(),
        };
        assert_eq!(entry.actual_size(), 16); // 8 + 5 rounded up to 4
    }

    #[test]
    fn dir_entry_file_types() {
        assert_eq!(Ext2FileType::from_raw(0), Ext2FileType::Unknown);
        assert_eq!(Ext2FileType::from_raw(1), Ext2FileType::RegFile);
        assert_eq!(Ext2FileType::from_raw(2), Ext2FileType::Dir);
        assert_eq!(Ext2FileType::from_raw(7), Ext2FileType::Symlink);
        assert_eq!(Ext2FileType::from_raw(255), Ext2FileType::Unknown);
    }
}
