#![forbid(unsafe_code)]
//! Read-only block I/O layer.
//!
//! Provides the `ByteDevice` trait for positioned byte reads, a file-backed
//! implementation using pread-style I/O, and the `BlockDevice` trait that
//! the resolver consumes. No write path: ext2walk never issues a write to
//! the backing medium.

use e2w_error::{Result, WalkError};
use e2w_types::{BlockNumber, BlockSize, ByteOffset};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Owned block buffer.
///
/// Invariant: length == block size of the originating device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBuf {
    bytes: Vec<u8>,
}

impl BlockBuf {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

/// Byte-addressed device for fixed-offset reads (pread semantics).
pub trait ByteDevice: Send + Sync {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    ///
    /// A short read is an error: the caller always knows the exact size of
    /// the structure it is reading.
    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()>;
}

/// File-backed byte device using `std::os::unix::fs::FileExt`.
///
/// Positioned reads do not share a seek cursor, so a single open handle is
/// safe to read from multiple threads.
#[derive(Debug, Clone)]
pub struct FileByteDevice {
    file: Arc<File>,
    len: u64,
}

impl FileByteDevice {
    /// Open an image file or block device for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            len,
        })
    }
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        let end = offset
            .checked_add(
                u64::try_from(buf.len())
                    .map_err(|_| WalkError::Format("read length overflows u64".to_owned()))?,
            )
            .ok_or_else(|| WalkError::Format("read range overflows u64".to_owned()))?;
        if end.0 > self.len {
            return Err(WalkError::Format(format!(
                "read out of bounds: offset={offset} len={} image_len={}",
                buf.len(),
                self.len
            )));
        }

        self.file.read_exact_at(buf, offset.0)?;
        Ok(())
    }
}

/// In-memory byte device over an owned buffer.
///
/// Used by tests and for resolving images already loaded into memory.
#[derive(Debug, Clone)]
pub struct MemByteDevice {
    bytes: Arc<Vec<u8>>,
}

impl MemByteDevice {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }
}

impl ByteDevice for MemByteDevice {
    fn len_bytes(&self) -> u64 {
        u64::try_from(self.bytes.len()).unwrap_or(u64::MAX)
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset.0)
            .map_err(|_| WalkError::Format("offset exceeds addressable range".to_owned()))?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| WalkError::Format("read range overflows usize".to_owned()))?;
        if end > self.bytes.len() {
            return Err(WalkError::Format(format!(
                "read out of bounds: offset={offset} len={} image_len={}",
                buf.len(),
                self.bytes.len()
            )));
        }
        buf.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }
}

/// Block-addressed read interface.
pub trait BlockDevice: Send + Sync {
    /// Read a block by number. Returns exactly `block_size()` bytes.
    fn read_block(&self, block: BlockNumber) -> Result<BlockBuf>;

    /// Device block size in bytes.
    fn block_size(&self) -> BlockSize;

    /// Total number of blocks.
    fn block_count(&self) -> u64;
}

/// Adapter exposing a `ByteDevice` as fixed-size blocks.
#[derive(Debug, Clone)]
pub struct ByteBlockDevice<D: ByteDevice> {
    inner: D,
    block_size: BlockSize,
    block_count: u64,
}

impl<D: ByteDevice> ByteBlockDevice<D> {
    /// Wrap `inner` with the given block size.
    ///
    /// The device length does not need to be block-aligned (truncated or
    /// padded images exist in the wild); reads past the end still fail.
    #[must_use]
    pub fn new(inner: D, block_size: BlockSize) -> Self {
        let block_count = inner.len_bytes() / u64::from(block_size.get());
        Self {
            inner,
            block_size,
            block_count,
        }
    }

    #[must_use]
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: ByteDevice> BlockDevice for ByteBlockDevice<D> {
    fn read_block(&self, block: BlockNumber) -> Result<BlockBuf> {
        let offset = self
            .block_size
            .block_to_byte(block)
            .ok_or_else(|| WalkError::Format(format!("block {block} offset overflows u64")))?;
        trace!(block = block.0, offset = offset.0, "read_block");
        let mut buf = vec![0_u8; self.block_size.as_usize()];
        self.inner.read_exact_at(offset, &mut buf)?;
        Ok(BlockBuf::new(buf))
    }

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }
}

/// Read a fixed-length byte region, independent of block geometry.
///
/// Used for the superblock, which lives at byte offset 1024 regardless of
/// block size.
pub fn read_region<D: ByteDevice>(device: &D, offset: ByteOffset, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0_u8; len];
    device.read_exact_at(offset, &mut buf)?;
    Ok(buf)
}
