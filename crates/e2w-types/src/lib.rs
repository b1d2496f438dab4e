#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const EXT2_SUPERBLOCK_OFFSET: usize = 1024;
pub const EXT2_SUPERBLOCK_SIZE: usize = 1024;
pub const EXT2_SUPER_MAGIC: u16 = 0xEF53;

/// Size of an inode record on rev 0 filesystems (rev 1 stores it in the
/// superblock's `s_inode_size`).
pub const EXT2_GOOD_OLD_INODE_SIZE: u16 = 128;

/// First non-reserved inode on rev 0 filesystems.
pub const EXT2_GOOD_OLD_FIRST_INO: u32 = 11;

/// Number of direct block pointers in an inode's `i_block` array.
pub const EXT2_NDIR_BLOCKS: usize = 12;
/// `i_block` slot holding the single-indirect pointer.
pub const EXT2_IND_BLOCK: usize = 12;
/// `i_block` slot holding the double-indirect pointer.
pub const EXT2_DIND_BLOCK: usize = 13;
/// `i_block` slot holding the triple-indirect pointer.
pub const EXT2_TIND_BLOCK: usize = 14;
/// Total `i_block` slots (12 direct + 3 indirect).
pub const EXT2_N_BLOCKS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u32);

impl BlockNumber {
    /// A zero block pointer marks the end of populated entries; directory
    /// scans rely on this for termination.
    #[must_use]
    pub fn is_unset(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeNumber(pub u32);

impl InodeNumber {
    /// The root directory inode. Fixed by the ext2 format (`EXT2_ROOT_INO`).
    pub const ROOT: Self = Self(2);
}

/// Block group index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupNumber(pub u32);

/// Byte offset on a `ByteDevice` (pread semantics).
///
/// Unit-carrying wrapper to prevent mixing bytes and blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteOffset(pub u64);

impl ByteOffset {
    pub const ZERO: Self = Self(0);

    /// Add a byte count, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }
}

/// Validated block size (power of two; ext2walk supports 1K/2K/4K).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockSize(u32);

impl BlockSize {
    /// Create a `BlockSize` if `value` is one of the supported sizes.
    pub fn new(value: u32) -> Result<Self, ParseError> {
        if !matches!(value, 1024 | 2048 | 4096) {
            return Err(ParseError::InvalidField {
                field: "block_size",
                reason: "must be 1024, 2048, or 4096",
            });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Number of u32 block pointers that fit in one block.
    #[must_use]
    pub fn pointers_per_block(self) -> usize {
        self.as_usize() / 4
    }

    /// Convert a block number to a byte offset, `None` on overflow.
    #[must_use]
    pub fn block_to_byte(self, block: BlockNumber) -> Option<ByteOffset> {
        u64::from(block.0)
            .checked_mul(u64::from(self.0))
            .map(ByteOffset)
    }
}

/// Compute the block size from the superblock's `s_log_block_size`.
#[must_use]
pub fn ext2_block_size_from_log(log_block_size: u32) -> Option<u32> {
    let shift = 10_u32.checked_add(log_block_size)?;
    1_u32.checked_shl(shift)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("invalid magic: expected {expected:#x}, got {actual:#x}")]
    InvalidMagic { expected: u16, actual: u16 },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

#[inline]
pub fn ensure_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let Some(end) = offset.checked_add(len) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };

    if end > data.len() {
        return Err(ParseError::InsufficientData {
            needed: len,
            offset,
            actual: data.len().saturating_sub(offset),
        });
    }

    Ok(&data[offset..end])
}

#[inline]
pub fn read_le_u16(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_le_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_fixed<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], ParseError> {
    let bytes = ensure_slice(data, offset, N)?;
    let mut out = [0_u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

#[must_use]
pub fn trim_nul_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_owned()
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_validation() {
        assert!(BlockSize::new(1024).is_ok());
        assert!(BlockSize::new(2048).is_ok());
        assert!(BlockSize::new(4096).is_ok());
        assert!(BlockSize::new(0).is_err());
        assert!(BlockSize::new(512).is_err());
        assert!(BlockSize::new(8192).is_err());
        assert!(BlockSize::new(3000).is_err());
    }

    #[test]
    fn block_size_from_log() {
        assert_eq!(ext2_block_size_from_log(0), Some(1024));
        assert_eq!(ext2_block_size_from_log(1), Some(2048));
        assert_eq!(ext2_block_size_from_log(2), Some(4096));
        assert_eq!(ext2_block_size_from_log(30), None);
    }

    #[test]
    fn block_to_byte_conversion() {
        let bs = BlockSize::new(1024).unwrap();
        assert_eq!(bs.block_to_byte(BlockNumber(0)), Some(ByteOffset(0)));
        assert_eq!(bs.block_to_byte(BlockNumber(5)), Some(ByteOffset(5120)));
        assert_eq!(bs.pointers_per_block(), 256);
    }

    #[test]
    fn root_inode_is_two() {
        assert_eq!(InodeNumber::ROOT, InodeNumber(2));
    }

    #[test]
    fn unset_block_pointer() {
        assert!(BlockNumber(0).is_unset());
        assert!(!BlockNumber(1).is_unset());
    }

    #[test]
    fn ensure_slice_bounds() {
        let data = [1_u8, 2, 3, 4];
        assert!(ensure_slice(&data, 0, 4).is_ok());
        assert!(matches!(
            ensure_slice(&data, 2, 4),
            Err(ParseError::InsufficientData {
                needed: 4,
                offset: 2,
                actual: 2
            })
        ));
        assert!(ensure_slice(&data, usize::MAX, 2).is_err());
    }

    #[test]
    fn le_readers() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x00, 0x00];
        assert_eq!(read_le_u16(&data, 0).unwrap(), 0x1234);
        assert_eq!(read_le_u32(&data, 0).unwrap(), 0x5678_1234);
        assert!(read_le_u32(&data, 4).is_err());
    }

    #[test]
    fn trim_nul_padded_names() {
        assert_eq!(trim_nul_padded(b"boot\0\0\0\0"), "boot");
        assert_eq!(trim_nul_padded(b"exact"), "exact");
        assert_eq!(trim_nul_padded(b"\0\0"), "");
    }
}
