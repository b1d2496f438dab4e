#![forbid(unsafe_code)]
//! Error types for ext2walk.
//!
//! Two-layer model: `ParseError` in `e2w-types` covers on-disk format
//! violations detected during byte parsing; `WalkError` (this crate) is the
//! user-facing error returned by the resolver API. The conversion happens at
//! the `e2w-resolve` boundary, which depends on both crates; `e2w-error`
//! stays independent of `e2w-types` to avoid cyclic dependencies.
//!
//! Propagation policy: a parse or I/O failure on a structural block
//! (superblock, group descriptor) surfaces as `Format`/`Parse`/`Io` from
//! `Volume::open` and there is nothing further to resolve. Faults hit while
//! walking data or indirect blocks propagate as ordinary `Err` values so a
//! multi-component path resolution can short-circuit cleanly. Absence of a
//! name is never an error at the lookup layer (`Ok(None)`); `resolve_path`
//! turns it into `NotFound` naming the failing component.

use thiserror::Error;

/// Unified error type for all ext2walk operations.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// On-disk metadata corruption detected at a known block.
    #[error("corrupt metadata at block {block}: {detail}")]
    Corruption { block: u64, detail: String },

    /// Invalid on-disk format (wrong magic, unsupported geometry).
    ///
    /// Used during open-time validation when the image structure is
    /// fundamentally wrong. Unrecoverable: resolution cannot proceed
    /// without valid layout parameters.
    #[error("invalid on-disk format: {0}")]
    Format(String),

    /// Parse-layer error surfaced to the user.
    ///
    /// Carries the string form of a `ParseError` from `e2w-types`. Prefer
    /// `Corruption` when the block number is known.
    #[error("parse error: {0}")]
    Parse(String),

    /// Inode number outside the valid range.
    ///
    /// Inode numbers are 1-based; 0 is never valid, and numbers beyond the
    /// superblock's `s_inodes_count` would read garbage from past the end
    /// of the inode table.
    #[error("invalid inode {ino}: {reason}")]
    InvalidInode { ino: u32, reason: &'static str },

    /// A path component was not found in its parent directory.
    #[error("not found: {0}")]
    NotFound(String),

    /// A path component resolved to something other than a directory.
    #[error("not a directory: {0}")]
    NotDirectory(String),
}

impl WalkError {
    /// Convert this error into a POSIX errno.
    ///
    /// The mapping is exhaustive: every variant has an explicit arm, so
    /// adding a variant without assigning its errno is a compile error.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::Corruption { .. } => libc::EIO,
            Self::Format(_) | Self::Parse(_) | Self::InvalidInode { .. } => libc::EINVAL,
            Self::NotFound(_) => libc::ENOENT,
            Self::NotDirectory(_) => libc::ENOTDIR,
        }
    }
}

/// Result alias using `WalkError`.
pub type Result<T> = std::result::Result<T, WalkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_covers_all_variants() {
        let cases: Vec<(WalkError, libc::c_int)> = vec![
            (WalkError::Io(std::io::Error::other("test")), libc::EIO),
            (
                WalkError::Corruption {
                    block: 7,
                    detail: "test".into(),
                },
                libc::EIO,
            ),
            (WalkError::Format("test".into()), libc::EINVAL),
            (WalkError::Parse("test".into()), libc::EINVAL),
            (
                WalkError::InvalidInode {
                    ino: 0,
                    reason: "inode 0 is never valid",
                },
                libc::EINVAL,
            ),
            (WalkError::NotFound("foo".into()), libc::ENOENT),
            (WalkError::NotDirectory("foo".into()), libc::ENOTDIR),
        ];

        for (error, expected_errno) in &cases {
            assert_eq!(error.to_errno(), *expected_errno, "wrong errno for {error:?}");
        }
    }

    #[test]
    fn io_error_preserves_raw_os_error() {
        let raw = std::io::Error::from_raw_os_error(libc::EPERM);
        let walk = WalkError::Io(raw);
        assert_eq!(walk.to_errno(), libc::EPERM);
    }

    #[test]
    fn display_formatting() {
        let err = WalkError::Corruption {
            block: 42,
            detail: "rec_len tiles past block end".into(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt metadata at block 42: rec_len tiles past block end"
        );

        let nf = WalkError::NotFound("var".into());
        assert_eq!(nf.to_string(), "not found: var");

        let nd = WalkError::NotDirectory("passwd".into());
        assert_eq!(nd.to_string(), "not a directory: passwd");

        let ino = WalkError::InvalidInode {
            ino: 9999,
            reason: "beyond inode table",
        };
        assert_eq!(ino.to_string(), "invalid inode 9999: beyond inode table");
    }

    #[test]
    fn not_found_and_io_are_distinct() {
        // A missing name must never be conflated with an I/O fault.
        let nf = WalkError::NotFound("x".into());
        let io = WalkError::Io(std::io::Error::other("disk gone"));
        assert_ne!(nf.to_errno(), io.to_errno());
    }
}
