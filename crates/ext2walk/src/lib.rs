#![forbid(unsafe_code)]
//! ext2walk public API facade.
//!
//! Re-exports the resolver and supporting types through a single crate so
//! downstream consumers depend on one stable surface.
//!
//! ```no_run
//! use ext2walk::{Volume, InodeNumber};
//!
//! let volume = Volume::open_path("/dev/sdb1")?;
//! let (ino, inode) = volume.resolve_path("/var/log")?;
//! assert!(inode.is_dir());
//! for row in volume.list_dir(ino)? {
//!     println!("{} {}", row.ctime, row.name);
//! }
//! # Ok::<(), ext2walk::WalkError>(())
//! ```

pub use e2w_block::{
    BlockBuf, BlockDevice, ByteBlockDevice, ByteDevice, FileByteDevice, MemByteDevice,
};
pub use e2w_error::{Result, WalkError};
pub use e2w_ondisk::{
    DirBlockIter, Ext2DirEntry, Ext2FileType, Ext2GroupDesc, Ext2Inode, Ext2Superblock,
};
pub use e2w_resolve::{DirListingEntry, IndirectionLevel, Layout, Volume, format_ctime};
pub use e2w_types::{BlockNumber, BlockSize, ByteOffset, InodeNumber, ParseError};
